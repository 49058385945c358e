mod debug_report;

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use vaspscan::{HistoryMode, RuleTable, ScanOptions, Verdict, read_vasprun_file, scan_files};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match run(&config) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    vasprun: Option<PathBuf>,
    rules: Option<PathBuf>,
    first_only: bool,
    color: bool,
}

fn run(config: &CliConfig) -> Result<i32, vaspscan::Error> {
    let loaded;
    let table = match &config.rules {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)?;
            loaded = RuleTable::vasp_default().with_yaml_overrides(&yaml)?;
            &loaded
        }
        None => RuleTable::vasp_default(),
    };

    let mut code = 0;
    if let Some(stdout) = &config.stdout {
        let history = if config.first_only { HistoryMode::FirstOccurrence } else { HistoryMode::Full };
        let options = ScanOptions::default().history(history);
        let status = scan_files(stdout, config.stderr.as_deref(), table, &options)?;
        debug_report::print_status(&stdout.display().to_string(), &status, table, config.color);
        if matches!(status.verdict, Verdict::Failed | Verdict::NotStarted) {
            code = 3;
        }
    }

    if let Some(path) = &config.vasprun {
        let doc = read_vasprun_file(path)?;
        debug_report::print_document(&path.display().to_string(), &doc, config.color);
    }
    Ok(code)
}

fn parse_args() -> Result<CliConfig, String> {
    let mut config = CliConfig {
        stdout: None,
        stderr: None,
        vasprun: None,
        rules: None,
        first_only: false,
        color: io::stdout().is_terminal(),
    };
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let slot = match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("vaspscan {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => {
                config.color = true;
                continue;
            }
            "--no-color" => {
                config.color = false;
                continue;
            }
            "--first-only" => {
                config.first_only = true;
                continue;
            }
            "--stdout" => &mut config.stdout,
            "--stderr" => &mut config.stderr,
            "--vasprun" => &mut config.vasprun,
            "--rules" => &mut config.rules,
            _ => return Err(format!("error: unknown option '{arg}'\n\n{}", help_text())),
        };
        let value = match inline {
            Some(value) => value,
            None => args.next().ok_or_else(|| format!("error: {flag} expects a path"))?,
        };
        if slot.is_some() {
            return Err(format!("error: {flag} provided multiple times"));
        }
        *slot = Some(PathBuf::from(value));
    }

    if config.stdout.is_none() && config.vasprun.is_none() {
        return Err(format!("error: nothing to do, pass --stdout and/or --vasprun\n\n{}", help_text()));
    }
    if config.stderr.is_some() && config.stdout.is_none() {
        return Err("error: --stderr requires --stdout".to_string());
    }
    Ok(config)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "vaspscan {version}

Classify a VASP run from its console output and read its vasprun.xml.

Usage:
  vaspscan --stdout <file> [--stderr <file>] [OPTIONS]
  vaspscan --vasprun <file> [OPTIONS]

Options:
  --stdout <file>            Captured standard output of the run.
  --stderr <file>            Captured standard error of the run.
  --vasprun <file>           vasprun.xml to read (may be truncated).
  --rules <file>             YAML rules merged over the built-in table.
  --first-only               Record each rule at most once per channel.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Run completed, possibly with warnings or still running.
  1  Internal error (unreadable file, bad rules, malformed vasprun.xml).
  2  Invalid arguments.
  3  Run failed or never started.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
