use std::path::Path;

use console::Style;

use crate::mutants::MutationResult;
use crate::report::Report;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

/// Loud banner for a run that may have left a source file mutated.
pub fn print_restore_failure(msg: &str, backup: &Path) {
    let style = Style::new().white().on_red().bold();
    eprintln!();
    eprintln!("{}", style.apply_to(" ORIGINAL SOURCE NOT RESTORED "));
    eprintln!("{}", msg);
    eprintln!(
        "The pristine copy is at {}. Restore it before running again.",
        backup.display()
    );
}

pub fn print_file_header(header: &str) {
    let style = Style::new().cyan().bold();
    println!("{}", style.apply_to(header.trim_end()));
}

pub fn print_entry(entry: &str) {
    print!("{}", entry);
}

pub fn print_outcome(outcome: &str, result: &MutationResult) {
    let style = if result.survived() {
        Style::new().red().bold()
    } else {
        Style::new().green()
    };
    for line in outcome.lines() {
        if line.starts_with("- ") {
            println!("{}", Style::new().red().apply_to(line));
        } else if line.starts_with("+ ") {
            println!("{}", Style::new().green().apply_to(line));
        } else {
            println!("{}", style.apply_to(line));
        }
    }
}

pub fn print_run_result(report: &Report, log_path: &Path, summary_path: &Path) {
    let pct = report.mutation_coverage();

    if report.total() == 0 {
        print_success("No mutations were generated.");
    } else if report.survived() == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {} mutants, all killed ({:.2}% mutation coverage)",
            style.apply_to("✓"),
            report.total(),
            pct,
        );
    } else {
        let style = Style::new().yellow().bold();
        println!(
            "{} {} survived / {} total ({:.2}% mutation coverage)",
            style.apply_to("!"),
            report.survived(),
            report.total(),
            pct,
        );

        println!();
        let ref_style = Style::new().cyan().bold();
        let op_style = Style::new().magenta();
        for (idx, r) in report.results().iter().enumerate().filter(|(_, r)| r.survived()) {
            println!(
                "  {} {}:{} [{}] {} → {}",
                ref_style.apply_to(format!("M{}", idx + 1)),
                r.file_name,
                r.mutation.line_number,
                r.mutation.mutation_type,
                op_style.apply_to(r.mutation.original_line.trim()),
                op_style.apply_to(r.mutation.mutated_line.trim()),
            );
        }
    }

    let dim = Style::new().dim();
    if report.timed_out() > 0 {
        println!("  {} {} mutants timed out", dim.apply_to("·"), report.timed_out());
    }
    if report.errored() > 0 {
        println!("  {} {} mutants could not be tested", dim.apply_to("·"), report.errored());
    }
    println!();
    println!("{} {}", dim.apply_to("log:"), log_path.display());
    println!("{} {}", dim.apply_to("summary:"), summary_path.display());
}
