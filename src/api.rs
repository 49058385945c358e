use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::{Document, Error, RuleTable, RunStatus, ScanOptions, StreamParser, VasprunReader};

/// Scan captured console text of both channels.
///
/// # Example
/// ```
/// use vaspscan::{RuleTable, ScanOptions, Verdict, scan_text};
///
/// let status = scan_text(
///     " running on    4 total cores\n Elapsed time (sec):      12.5\n",
///     "",
///     RuleTable::vasp_default(),
///     &ScanOptions::without_termination(),
/// );
/// assert_eq!(status.verdict, Verdict::NotStarted);
/// assert_eq!(status.history[0].rule_id, "nostart");
/// ```
pub fn scan_text(stdout: &str, stderr: &str, table: &RuleTable, options: &ScanOptions) -> RunStatus {
    StreamParser::new(table).with_options(options.clone()).scan(stdout.lines(), stderr.lines())
}

/// Scan captured console files. A missing `stderr` path scans an empty channel.
pub fn scan_files(
    stdout: &Path,
    stderr: Option<&Path>,
    table: &RuleTable,
    options: &ScanOptions,
) -> Result<RunStatus, Error> {
    let parser = StreamParser::new(table).with_options(options.clone());
    let out = BufReader::new(File::open(stdout)?);
    match stderr {
        Some(path) => parser.scan_readers(out, BufReader::new(File::open(path)?)),
        None => parser.scan_readers(out, io::empty()),
    }
}

pub fn read_vasprun_str(text: &str) -> Result<Document, Error> {
    VasprunReader::read_str(text)
}

pub fn read_vasprun_file(path: &Path) -> Result<Document, Error> {
    VasprunReader::read(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verdict;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vaspscan-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn scan_text_splits_lines() {
        let status = scan_text(
            " vasp.6.3.0 18Jan22 complex\n NBANDS=    24\n General timing and accounting informations for this job:\n",
            "",
            RuleTable::vasp_default(),
            &ScanOptions::default(),
        );
        assert_eq!(status.verdict, Verdict::Completed);
        assert_eq!(status.bands(), Some(24));
        assert!(!status.has_entries());
    }

    #[test]
    fn scan_files_reads_both_channels() {
        let out = temp_file("out.txt", " vasp.5.4.4.18Apr17-6-g9f103f2a35\n");
        let err = temp_file("err.txt", "forrtl: severe (174): SIGSEGV, segmentation fault occurred\n");
        let status =
            scan_files(&out, Some(&err), RuleTable::vasp_default(), &ScanOptions::without_termination()).unwrap();
        assert_eq!(status.verdict, Verdict::Failed);
        assert_eq!(status.history.len(), 1);
        assert_eq!(status.history[0].rule_id, "segfault");

        let status = scan_files(&out, None, RuleTable::vasp_default(), &ScanOptions::without_termination()).unwrap();
        assert_eq!(status.verdict, Verdict::Completed);

        std::fs::remove_file(out).unwrap();
        std::fs::remove_file(err).unwrap();
    }

    #[test]
    fn missing_files_are_io_errors() {
        let missing = Path::new("/nonexistent/vaspscan/OUTCAR.stdout");
        let err = scan_files(missing, None, RuleTable::vasp_default(), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(matches!(read_vasprun_file(missing), Err(Error::Io(_))));
    }

    #[test]
    fn read_vasprun_file_marks_truncation() {
        let path = temp_file("vasprun.xml", "<modeling>\n <calculation>\n  <scstep>\n");
        let doc = read_vasprun_file(&path).unwrap();
        assert!(doc.truncated);
        assert!(doc.ionic_steps.is_empty());
        std::fs::remove_file(path).unwrap();

        let doc = read_vasprun_str("<modeling>\n</modeling>\n").unwrap();
        assert!(!doc.truncated);
    }
}
