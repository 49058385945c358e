use std::io::Cursor;
use std::time::Duration;

use super::*;
use crate::{Channel, Kind, RuleSpec, RuleTable};

fn nostart() -> RuleSpec {
    RuleSpec::new("nostart", Kind::Error, Channel::Stdout, "starting program")
        .message("The program never started.")
        .inverse(true)
}

fn brmix() -> RuleSpec {
    RuleSpec::new("brmix", Kind::Error, Channel::Stdout, "BRMIX: very serious problems")
        .message("Problems with the charge density mixing.")
}

fn eddrmm() -> RuleSpec {
    RuleSpec::new("eddrmm", Kind::Warning, Channel::Stdout, "WARNING in EDDRMM").recoverable(true)
}

fn zbrent() -> RuleSpec {
    RuleSpec::new("zbrent", Kind::Error, Channel::Stdout, "ZBRENT: fatal error").recoverable(true)
}

fn segfault() -> RuleSpec {
    RuleSpec::new("segfault", Kind::Error, Channel::Stderr, "Segmentation fault")
}

fn mpi_warning() -> RuleSpec {
    RuleSpec::new("mpi_warning", Kind::Warning, Channel::Stderr, "MPI warning").recoverable(true)
}

fn table(specs: Vec<RuleSpec>) -> RuleTable {
    RuleTable::new(specs).unwrap()
}

fn parser(table: &RuleTable) -> StreamParser<'_> {
    StreamParser::new(table).with_options(ScanOptions::without_termination())
}

const NONE: [&str; 0] = [];

// --- Rule engine -------------------------------------------------------------

#[test]
fn evaluate_returns_first_rule_in_table_order() {
    let t = table(vec![
        RuleSpec::new("broad", Kind::Warning, Channel::Stdout, "problems").recoverable(true),
        brmix(),
    ]);
    let found = evaluate("BRMIX: very serious problems", Channel::Stdout, &t).unwrap();
    assert_eq!(found.rule.id, "broad");
    assert_eq!(found.line, "BRMIX: very serious problems");

    let t = table(vec![brmix(), RuleSpec::new("broad", Kind::Warning, Channel::Stdout, "problems")]);
    let found = evaluate("BRMIX: very serious problems", Channel::Stdout, &t).unwrap();
    assert_eq!(found.rule.id, "brmix");
}

#[test]
fn evaluate_respects_channel_and_skips_inverse_rules() {
    let t = table(vec![nostart(), brmix(), segfault()]);

    assert!(evaluate("starting program", Channel::Stdout, &t).is_none());
    assert!(evaluate("BRMIX: very serious problems", Channel::Stderr, &t).is_none());
    assert!(evaluate("Segmentation fault (core dumped)", Channel::Stdout, &t).is_none());
    assert_eq!(evaluate("Segmentation fault (core dumped)", Channel::Stderr, &t).unwrap().rule.id, "segfault");
    assert!(evaluate("a perfectly ordinary line", Channel::Stdout, &t).is_none());
}

// --- Stream parser -----------------------------------------------------------

#[test]
fn fatal_match_with_greeting_present_fails() {
    let t = table(vec![nostart(), brmix()]);
    let status = parser(&t).scan(["starting program", "BRMIX: very serious problems"], NONE);

    assert_eq!(status.verdict, Verdict::Failed);
    assert_eq!(status.history.len(), 1);
    let entry = &status.history[0];
    assert_eq!(entry.rule_id, "brmix");
    assert_eq!(entry.position, Position::Line(2));
    assert_eq!(entry.channel, Channel::Stdout);
    assert_eq!(entry.line, "BRMIX: very serious problems");
}

#[test]
fn missing_greeting_is_not_started_regardless_of_stderr() {
    let t = table(vec![nostart(), brmix(), segfault(), mpi_warning()]);

    for stderr in [vec![], vec!["MPI warning: slow network"], vec!["Segmentation fault"]] {
        let status = parser(&t).scan(["some output", "BRMIX: very serious problems"], stderr);
        assert_eq!(status.verdict, Verdict::NotStarted);
        let last = status.history.last().unwrap();
        assert_eq!(last.rule_id, "nostart");
        assert_eq!(last.position, Position::EndOfStream);
        assert!(last.line.is_empty());
    }

    let status = parser(&t).scan(NONE, NONE);
    assert_eq!(status.verdict, Verdict::NotStarted);
}

#[test]
fn empty_channels_without_inverse_rule_are_not_not_started() {
    let t = table(vec![brmix(), segfault()]);
    let status = parser(&t).scan(NONE, NONE);
    assert_eq!(status.verdict, Verdict::Completed);
    assert!(!status.has_entries());
}

#[test]
fn fatal_match_stops_only_its_channel() {
    let t = table(vec![zbrent(), brmix(), mpi_warning(), segfault()]);
    let stdout = [
        "ZBRENT: fatal error",
        "BRMIX: very serious problems",
        "ZBRENT: fatal error",
        "BRMIX: very serious problems",
    ];
    let stderr = ["MPI warning", "MPI warning", "Segmentation fault", "MPI warning"];
    let status = parser(&t).scan(stdout, stderr);

    assert_eq!(status.verdict, Verdict::Failed);
    let out: Vec<_> = status.entries_on(Channel::Stdout).map(|e| (e.rule_id.as_str(), e.position)).collect();
    assert_eq!(out, vec![("zbrent", Position::Line(1)), ("brmix", Position::Line(2))]);

    let err: Vec<_> = status.entries_on(Channel::Stderr).map(|e| (e.rule_id.as_str(), e.position)).collect();
    assert_eq!(
        err,
        vec![("mpi_warning", Position::Line(1)), ("mpi_warning", Position::Line(2)), ("segfault", Position::Line(3))]
    );
}

#[test]
fn history_lists_stdout_then_stderr_then_inverse() {
    let greeting_on_stderr = RuleSpec::new("banner", Kind::Warning, Channel::Stderr, "launcher ready").inverse(true);
    let t = table(vec![greeting_on_stderr, eddrmm(), mpi_warning()]);
    let status = parser(&t).scan(["x", "WARNING in EDDRMM: call to ZHEGV failed"], ["MPI warning"]);

    let order: Vec<_> = status.history.iter().map(|e| (e.rule_id.as_str(), e.channel)).collect();
    assert_eq!(
        order,
        vec![("eddrmm", Channel::Stdout), ("mpi_warning", Channel::Stderr), ("banner", Channel::Stderr)]
    );
    // An inverse WARNING only downgrades the verdict.
    assert_eq!(status.verdict, Verdict::CompletedWithWarnings);
}

#[test]
fn channel_scan_order_does_not_change_the_result() {
    let t = table(vec![nostart(), brmix(), eddrmm(), segfault(), mpi_warning()]);
    let stdout = ["starting program", "WARNING in EDDRMM", "BRMIX: very serious problems"];
    let stderr = ["MPI warning", "Segmentation fault"];

    let p = parser(&t);
    let forward = p.finish(p.scan_channel(Channel::Stdout, stdout), p.scan_channel(Channel::Stderr, stderr));
    let err_first = p.scan_channel(Channel::Stderr, stderr);
    let out_second = p.scan_channel(Channel::Stdout, stdout);
    let backward = p.finish(out_second, err_first);

    assert_eq!(forward, backward);
}

#[test]
fn recoverable_only_matches_complete_with_warnings() {
    let t = table(vec![nostart(), eddrmm(), zbrent()]);
    let stdout = [
        "starting program",
        "WARNING in EDDRMM: call to ZHEGV failed",
        "ordinary line",
        "ZBRENT: fatal error",
        "WARNING in EDDRMM: call to ZHEGV failed",
    ];
    let status = parser(&t).scan(stdout, NONE);

    assert_eq!(status.verdict, Verdict::CompletedWithWarnings);
    assert_eq!(status.history.len(), 3);
    assert!(status.history.iter().all(|e| e.recoverable));
}

#[test]
fn first_occurrence_mode_records_each_rule_once_per_channel() {
    let t = table(vec![eddrmm(), mpi_warning()]);
    let options = ScanOptions::without_termination().history(HistoryMode::FirstOccurrence);
    let stdout = ["WARNING in EDDRMM", "WARNING in EDDRMM", "WARNING in EDDRMM"];
    let status = StreamParser::new(&t).with_options(options).scan(stdout, ["MPI warning", "MPI warning"]);

    assert_eq!(status.history.len(), 2);
    assert_eq!(status.entries_for("eddrmm").next().unwrap().position, Position::Line(1));
}

#[test]
fn missing_termination_marker_means_incomplete() {
    let t = table(vec![eddrmm(), brmix()]);
    let options = ScanOptions::default();

    let status = StreamParser::new(&t).with_options(options.clone()).scan(["WARNING in EDDRMM", "iteration 3"], NONE);
    assert_eq!(status.verdict, Verdict::RunningOrIncomplete);

    let done = ["WARNING in EDDRMM", " writing wavefunctions"];
    let status = StreamParser::new(&t).with_options(options.clone()).scan(done, NONE);
    assert_eq!(status.verdict, Verdict::CompletedWithWarnings);
    assert!(status.flags.contains(ScanFlags::TERMINATED));

    // A fatal match wins over a missing marker.
    let status = StreamParser::new(&t).with_options(options).scan(["BRMIX: very serious problems"], NONE);
    assert_eq!(status.verdict, Verdict::Failed);
}

#[test]
fn metrics_keep_the_most_recent_value() {
    let t = table(vec![]);
    let stdout = [
        " vasp.6.3.0 18Jan22 (build Mar 02 2022 12:18:02) complex",
        "   NBANDS =   16",
        " WARNING: The highest band is occupied at some k-points!",
        "   NBANDS =   24",
        " Elapsed time (sec):      123.456",
    ];
    let status = parser(&t).scan(stdout, NONE);

    assert_eq!(status.version(), Some("6.3.0"));
    assert_eq!(status.bands(), Some(24));
    assert!(status.highest_band_occupied());
    assert_eq!(status.elapsed(), Some(Duration::from_secs_f64(123.456)));
}

#[test]
fn custom_metrics_and_invalid_metric_patterns() {
    let metrics = MetricSet::empty().with("ionic_steps", r"^\s*(\d+) F=", MetricKind::Integer).unwrap();
    let t = table(vec![]);
    let options = ScanOptions::without_termination().metrics(metrics);
    let status = StreamParser::new(&t).with_options(options).scan(["   1 F= -.10E+02", "   2 F= -.11E+02"], NONE);

    assert_eq!(status.metric("ionic_steps"), Some(&MetricValue::Integer(2)));
    assert!(status.version().is_none());
    assert!(!status.highest_band_occupied());

    assert!(matches!(
        MetricSet::empty().with("broken", "(unclosed", MetricKind::Text),
        Err(crate::ConfigError::InvalidMetric { .. })
    ));
}

#[test]
fn scan_readers_handles_crlf_and_invalid_utf8() {
    let t = table(vec![nostart(), brmix()]);
    let stdout: &[u8] = b"starting program\r\n\xff\xfe garbage\r\nBRMIX: very serious problems\r\nnever read\n";
    let status = parser(&t).scan_readers(Cursor::new(stdout), Cursor::new(Vec::new())).unwrap();

    assert_eq!(status.verdict, Verdict::Failed);
    assert_eq!(status.history.len(), 1);
    assert_eq!(status.history[0].position, Position::Line(3));
    assert_eq!(status.history[0].line, "BRMIX: very serious problems");
}

#[test]
fn default_table_classifies_a_vasp_crash() {
    let t = RuleTable::vasp_default();
    let stdout = [
        " running on    4 total cores",
        " vasp.6.3.0 18Jan22 (build Mar 02 2022 12:18:02) complex",
        " internal error in subroutine IBZKPT:",
    ];
    let stderr = ["forrtl: severe (174): SIGSEGV, segmentation fault occurred"];
    let status = StreamParser::new(t).scan(stdout, stderr);

    assert_eq!(status.verdict, Verdict::Failed);
    let ids: Vec<_> = status.history.iter().map(|e| e.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["ibzkpt", "segfault"]);
    assert_eq!(status.version(), Some("6.3.0"));
}

#[test]
fn verdict_precedence() {
    assert_eq!((ScanFlags::NOT_STARTED | ScanFlags::FATAL).verdict(true), Verdict::NotStarted);
    assert_eq!((ScanFlags::FATAL | ScanFlags::RECOVERABLE).verdict(true), Verdict::Failed);
    assert_eq!(ScanFlags::RECOVERABLE.verdict(true), Verdict::RunningOrIncomplete);
    assert_eq!((ScanFlags::RECOVERABLE | ScanFlags::TERMINATED).verdict(true), Verdict::CompletedWithWarnings);
    assert_eq!(ScanFlags::RECOVERABLE.verdict(false), Verdict::CompletedWithWarnings);
    assert_eq!(ScanFlags::empty().verdict(false), Verdict::Completed);
}
