use std::borrow::Cow;
use std::io::{self, BufRead, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::document::{Document, ElectronicStep, IonicStep};
use super::values::{parse_number, parse_row};
use crate::{Error, MalformedDocumentError};

const ROOT: &str = "modeling";

/// What an open `<i>`/`<v>` element feeds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Generator,
    Incar,
    Parameters,
    ScstepEnergy,
    StepEnergy,
    Efermi,
    VarrayRow,
}

#[derive(Debug)]
struct PendingItem {
    target: Target,
    name: String,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarrayKind {
    Forces,
    Stress,
    Positions,
    Basis,
}

impl VarrayKind {
    fn name(self) -> &'static str {
        match self {
            VarrayKind::Forces => "forces",
            VarrayKind::Stress => "stress",
            VarrayKind::Positions => "positions",
            VarrayKind::Basis => "basis",
        }
    }
}

/// Pull-parser state for one `vasprun.xml` stream.
///
/// Partially read steps live in accumulators and are moved into the
/// document only when their closing tag is read, so a stream that stops
/// anywhere leaves the document holding exactly the completed steps.
#[derive(Debug, Default)]
pub struct VasprunReader {
    doc: Document,
    stack: Vec<String>,
    root_closed: bool,
    calculation: Option<IonicStep>,
    scstep: Option<ElectronicStep>,
    varray: Option<(VarrayKind, Vec<Vec<Option<f64>>>)>,
    item: Option<PendingItem>,
}

enum Step {
    Continue,
    Done,
}

impl VasprunReader {
    /// Read `source` to its end.
    ///
    /// Returns `Ok` with `truncated = true` when the stream stops early,
    /// anywhere, including in the middle of a tag. An empty stream is an
    /// empty truncated document.
    pub fn read<R: BufRead>(source: R) -> Result<Document, Error> {
        let mut xml = Reader::from_reader(Exhaustion::new(source));
        xml.trim_text(true);
        xml.check_end_names(false);

        let mut state = VasprunReader::default();
        let mut buf = Vec::new();
        loop {
            let event = xml.read_event_into(&mut buf);
            let position = xml.buffer_position();
            let step = match event {
                // quick-xml hands out a tag cut off by the end of input as a
                // regular event; only the missing `>` tells it apart.
                Ok(Event::Start(_) | Event::End(_) | Event::Empty(_)) if xml.get_ref().cut_off() => {
                    trace!("vasprun:eof", "inside=tag position={}", position);
                    state.truncate(position)
                }
                Ok(event) => state.handle(event, position)?,
                Err(quick_xml::Error::UnexpectedEof(what)) => {
                    trace!("vasprun:eof", "inside={} position={}", what, position);
                    state.truncate(position)
                }
                Err(quick_xml::Error::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    state.truncate(position)
                }
                Err(err) if xml.get_ref().exhausted => {
                    trace!("vasprun:eof", "error=\"{}\" position={}", err, position);
                    state.truncate(position)
                }
                Err(quick_xml::Error::Io(err)) => return Err(io::Error::new(err.kind(), err.to_string()).into()),
                Err(err) => {
                    return Err(MalformedDocumentError::Syntax { message: err.to_string(), position }.into());
                }
            };
            if let Step::Done = step {
                break;
            }
            buf.clear();
        }
        Ok(state.doc)
    }

    /// Read a document held in memory.
    pub fn read_str(text: &str) -> Result<Document, Error> {
        Self::read(text.as_bytes())
    }

    fn handle(&mut self, event: Event<'_>, position: usize) -> Result<Step, MalformedDocumentError> {
        match event {
            Event::Start(start) => self.open(&start, position)?,
            Event::Empty(start) => {
                self.open(&start, position)?;
                self.close(&element_name(&start), position)?;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                self.close(&name, position)?;
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                self.text(&unescape_lossy(&raw), position)?;
            }
            Event::CData(data) => self.text(&String::from_utf8_lossy(&data), position)?,
            Event::Eof => {
                if self.root_closed {
                    return Ok(Step::Done);
                }
                return Ok(self.truncate(position));
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        Ok(Step::Continue)
    }

    fn truncate(&mut self, position: usize) -> Step {
        trace!(
            "vasprun:truncated",
            "position={} open={} kept_ionic={} dropped_ionic={} dropped_scstep={}",
            position,
            self.stack.join(">"),
            self.doc.ionic_steps.len(),
            self.calculation.is_some(),
            self.scstep.is_some()
        );
        self.calculation = None;
        self.scstep = None;
        self.varray = None;
        self.item = None;
        self.doc.truncated = true;
        Step::Done
    }

    fn open(&mut self, start: &BytesStart<'_>, position: usize) -> Result<(), MalformedDocumentError> {
        let name = element_name(start);

        let Some(parent) = self.stack.last().map(String::as_str) else {
            if self.root_closed {
                return Err(MalformedDocumentError::TrailingContent { position });
            }
            if name != ROOT {
                return Err(MalformedDocumentError::UnexpectedRoot { expected: ROOT, found: name });
            }
            self.stack.push(name);
            return Ok(());
        };

        let nesting = |expected: &str| {
            if parent == expected {
                Ok(())
            } else {
                Err(MalformedDocumentError::UnexpectedNesting {
                    element: name.clone(),
                    parent: parent.to_string(),
                    position,
                })
            }
        };

        match name.as_str() {
            "calculation" => {
                nesting(ROOT)?;
                self.calculation = Some(IonicStep::default());
            }
            "scstep" => {
                nesting("calculation")?;
                self.scstep = Some(ElectronicStep::default());
            }
            "varray" => {
                self.varray = self.varray_kind(parent, start).map(|kind| (kind, Vec::new()));
            }
            "i" | "v" => {
                self.item = self.item_target(&name, parent).and_then(|target| {
                    let key = match (target, &self.varray) {
                        (Target::VarrayRow, Some((kind, _))) => kind.name().to_string(),
                        _ => attribute(start, b"name")?,
                    };
                    Some(PendingItem { target, name: key, text: String::new() })
                });
            }
            _ => {}
        }

        self.stack.push(name);
        Ok(())
    }

    /// Arrays kept per ionic step; anything outside a `<calculation>` is skipped.
    fn varray_kind(&self, parent: &str, start: &BytesStart<'_>) -> Option<VarrayKind> {
        self.calculation.as_ref()?;
        let grandparent = self.stack.iter().rev().nth(1).map(String::as_str);
        let kind = match (parent, grandparent, attribute(start, b"name")?.as_str()) {
            ("calculation", _, "forces") => VarrayKind::Forces,
            ("calculation", _, "stress") => VarrayKind::Stress,
            ("structure", Some("calculation"), "positions") => VarrayKind::Positions,
            ("crystal", Some("structure"), "basis") => VarrayKind::Basis,
            _ => return None,
        };
        Some(kind)
    }

    /// Decide where an `<i>`/`<v>` element's text goes, from its ancestors.
    fn item_target(&self, element: &str, parent: &str) -> Option<Target> {
        let grandparent = self.stack.iter().rev().nth(1).map(String::as_str);
        let target = match (element, parent, grandparent) {
            ("v", "varray", _) if self.varray.is_some() => Target::VarrayRow,
            ("i", "generator", _) => Target::Generator,
            ("i", "incar", _) => Target::Incar,
            ("i", "energy", Some("scstep")) if self.scstep.is_some() => Target::ScstepEnergy,
            ("i", "energy", Some("calculation")) if self.calculation.is_some() => Target::StepEnergy,
            ("i", "dos", _) => Target::Efermi,
            _ if self.stack.iter().any(|e| e == "parameters") => Target::Parameters,
            _ => return None,
        };
        Some(target)
    }

    fn text(&mut self, text: &str, position: usize) -> Result<(), MalformedDocumentError> {
        if self.stack.is_empty() {
            if self.root_closed {
                return Err(MalformedDocumentError::TrailingContent { position });
            }
            return Err(MalformedDocumentError::Syntax {
                message: format!("text `{}` before the root element", text.trim()),
                position,
            });
        }
        if let Some(item) = &mut self.item {
            item.text.push_str(text);
        }
        Ok(())
    }

    fn close(&mut self, name: &str, position: usize) -> Result<(), MalformedDocumentError> {
        let Some(open) = self.stack.pop() else {
            return Err(MalformedDocumentError::UnopenedTag { found: name.to_string(), position });
        };
        if open != name {
            return Err(MalformedDocumentError::MismatchedTag { expected: open, found: name.to_string(), position });
        }

        match name {
            "i" | "v" => self.commit_item(position)?,
            "varray" => {
                if let (Some((kind, rows)), Some(step)) = (self.varray.take(), self.calculation.as_mut()) {
                    match kind {
                        VarrayKind::Forces => step.forces = rows,
                        VarrayKind::Stress => step.stress = rows,
                        VarrayKind::Positions => step.positions = rows,
                        VarrayKind::Basis => step.basis = rows,
                    }
                }
            }
            "scstep" => {
                if let (Some(scstep), Some(step)) = (self.scstep.take(), self.calculation.as_mut()) {
                    step.electronic_steps.push(scstep);
                }
            }
            "calculation" => {
                if let Some(step) = self.calculation.take() {
                    trace!(
                        "vasprun:commit",
                        "ionic={} electronic={} position={}",
                        self.doc.ionic_steps.len() + 1,
                        step.electronic_steps.len(),
                        position
                    );
                    self.doc.ionic_steps.push(step);
                }
            }
            ROOT if self.stack.is_empty() => self.root_closed = true,
            _ => {}
        }
        Ok(())
    }

    fn commit_item(&mut self, position: usize) -> Result<(), MalformedDocumentError> {
        let Some(item) = self.item.take() else {
            return Ok(());
        };
        let invalid = |token: &str| MalformedDocumentError::InvalidNumber {
            field: item.name.clone(),
            token: token.to_string(),
            position,
        };

        match item.target {
            Target::Generator => self.doc.generator.set(&item.name, item.text.trim().to_string()),
            Target::Incar => {
                self.doc.incar.insert(item.name.clone(), item.text.trim().to_string());
            }
            Target::Parameters => {
                self.doc.parameters.insert(item.name.clone(), item.text.trim().to_string());
            }
            Target::ScstepEnergy | Target::StepEnergy => {
                let value = parse_number(&item.text).map_err(|_| invalid(item.text.trim()))?;
                let quantities = match item.target {
                    Target::ScstepEnergy => self.scstep.as_mut().map(|s| &mut s.quantities),
                    _ => self.calculation.as_mut().map(|s| &mut s.quantities),
                };
                if let Some(quantities) = quantities {
                    quantities.insert(item.name.clone(), value);
                }
            }
            Target::Efermi => {
                if item.name != "efermi" {
                    return Ok(());
                }
                let value = parse_number(&item.text).map_err(|_| invalid(item.text.trim()))?;
                match self.calculation.as_mut() {
                    Some(step) => step.efermi = value,
                    None => self.doc.efermi = value,
                }
            }
            Target::VarrayRow => {
                let row = parse_row(&item.text).map_err(|token| invalid(&token))?;
                if let Some((_, rows)) = self.varray.as_mut() {
                    rows.push(row);
                }
            }
        }
        Ok(())
    }
}

const CHUNK: usize = 8 * 1024;

/// Byte source that remembers whether end of input was reached and which
/// byte was consumed last.
struct Exhaustion<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    exhausted: bool,
    last: Option<u8>,
}

impl<R> Exhaustion<R> {
    fn new(inner: R) -> Self {
        Self { inner, buf: vec![0; CHUNK], pos: 0, filled: 0, exhausted: false, last: None }
    }

    /// Input ended and the last consumed byte does not close a tag.
    fn cut_off(&self) -> bool {
        self.exhausted && self.last != Some(b'>')
    }
}

impl<R: Read> Read for Exhaustion<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for Exhaustion<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            let n = loop {
                match self.inner.read(&mut self.buf) {
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other?,
                }
            };
            if n == 0 {
                self.exhausted = true;
            }
            self.pos = 0;
            self.filled = n;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.filled - self.pos);
        if amt > 0 {
            self.last = Some(self.buf[self.pos + amt - 1]);
        }
        self.pos += amt;
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| unescape_lossy(&String::from_utf8_lossy(&attr.value)).into_owned())
}

fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}
