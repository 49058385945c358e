//! Truncation-tolerant reader for `vasprun.xml`.
//!
//! The file is written incrementally while the simulation runs, so a killed
//! job leaves a prefix of a valid document. The reader walks it with a pull
//! parser and only keeps what was completely written:
//!
//! ```text
//! <modeling>
//!   <generator> <incar> <parameters>    ──▶ Document header maps
//!   <calculation>                       ──▶ IonicStep, committed on </calculation>
//!     <scstep> <energy> <i name=..> ... ──▶ ElectronicStep, committed on </scstep>
//!     <structure> <varray positions>    ──▶ rows of the ionic step, with the
//!       <crystal> <varray basis>             lattice vectors
//!     <varray name="forces|stress">     ──▶ rows of the ionic step
//!     <dos> <i name="efermi">           ──▶ Fermi level of the ionic step
//!     <energy> <i name=..>              ──▶ final quantities of the ionic step
//! </modeling>                           ──▶ truncated = false
//! ```
//!
//! Ending early is data (`Document::truncated`); a structurally wrong
//! document is a [`crate::MalformedDocumentError`].

#[path = "vasprun/document.rs"]
mod document;
#[path = "vasprun/reader.rs"]
mod reader;
#[path = "vasprun/values.rs"]
mod values;


pub use document::{Document, ElectronicStep, Generator, IonicStep, Rows};
pub use reader::VasprunReader;
