use vaspscan::{Document, EnergyKind, EnergyQuery, HistoryEntry, Kind, Position, RuleTable, RunStatus, Verdict};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.paint(s, BOLD)
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.paint(s, DIM)
        }
    }
}

pub fn print_status(source: &str, status: &RunStatus, table: &RuleTable, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Scanning: {source}"), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Verdict ━━━", ansi::GRAY));
    let verdict_color = match status.verdict {
        Verdict::Completed => ansi::GREEN,
        Verdict::CompletedWithWarnings | Verdict::RunningOrIncomplete => ansi::YELLOW,
        Verdict::Failed | Verdict::NotStarted => ansi::RED,
    };
    println!("  {}", palette.bold(palette.paint(status.verdict.as_str(), verdict_color)));

    println!("\n{}", palette.paint("━━━ History ━━━", ansi::GRAY));
    if status.history.is_empty() {
        println!("{}", palette.dim("  No rule matched"));
        println!("\n{}", palette.dim("  Tip: Set VASPSCAN_DEBUG=1 to trace every scanned channel"));
    } else {
        for entry in &status.history {
            print_entry(entry, table, &palette);
        }
    }

    if !status.metrics.is_empty() {
        println!("\n{}", palette.paint("━━━ Metrics ━━━", ansi::GRAY));
        for (name, value) in &status.metrics {
            println!("  {:<24} {}", palette.dim(name), value);
        }
    }
    println!();
}

fn print_entry(entry: &HistoryEntry, table: &RuleTable, palette: &ansi::Palette) {
    let (marker, color) = match (entry.kind, entry.recoverable) {
        (Kind::Error, false) => ("✗", ansi::RED),
        (Kind::Error, true) => ("!", ansi::YELLOW),
        (Kind::Warning, _) => ("~", ansi::YELLOW),
    };
    let position = match entry.position {
        Position::Line(n) => format!("{}:{n}", entry.channel),
        Position::EndOfStream => format!("{}:end", entry.channel),
    };
    println!(
        "  {} {:<14} {}",
        palette.paint(marker, color),
        palette.bold(&entry.rule_id),
        palette.dim(format!("[{position}]"))
    );
    if let Some(rule) = table.get(&entry.rule_id) {
        println!("      {}", rule.message);
        if !rule.suggestion.is_empty() {
            println!("      {} {}", palette.paint("→", ansi::CYAN), rule.suggestion);
        }
    }
    if !entry.line.is_empty() {
        let preview: String = entry.line.trim().chars().take(80).collect();
        println!("      {}", palette.dim(format!("\"{preview}\"")));
    }
}

pub fn print_document(source: &str, doc: &Document, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Reading: {source}"), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Document ━━━", ansi::GRAY));
    let gen_label = if doc.generator.program.is_empty() {
        palette.dim("unknown generator")
    } else {
        format!("{} {} ({})", doc.generator.program, doc.generator.version, doc.generator.platform)
    };
    println!("  Generator: {gen_label}");
    if let Some(at) = doc.generator.generated_at() {
        println!("  Written:   {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
    let state = if doc.truncated {
        palette.paint("truncated", ansi::YELLOW)
    } else {
        palette.paint("complete", ansi::GREEN)
    };
    println!("  State:     {state}");
    println!(
        "  Steps:     {} ionic, {} electronic",
        doc.ionic_steps.len(),
        doc.electronic_step_count()
    );
    if let Some(efermi) = doc.fermi_level() {
        println!("  Fermi:     {efermi:.6} eV");
    }

    let energies = doc.energies(EnergyKind::Extrapolated, EnergyQuery::default());
    if !energies.final_values.is_empty() {
        println!("\n{}", palette.paint("━━━ Energies (e_0_energy) ━━━", ansi::GRAY));
        for (idx, value) in energies.final_values.iter().enumerate() {
            let scf = energies.scf.group(idx).map_or(0, <[_]>::len);
            let shown = value.map_or_else(|| palette.dim("n/a"), |v| format!("{v:>16.8}"));
            println!("  {:>4}  {}  {}", idx + 1, shown, palette.dim(format!("({scf} scf)")));
        }
    }
    println!();
}
