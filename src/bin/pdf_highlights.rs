//! CLI tool for exporting PDF highlights to a spreadsheet

use std::path::PathBuf;
use std::process;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_highlights::{
    process_pdf_mem_with_progress, HighlightOptions, HighlightReport, DEFAULT_FRONT_MATTER,
    XLSX_FILE_NAME,
};

#[derive(Parser)]
#[command(name = "pdf-highlights")]
#[command(version)]
#[command(about = "Export highlighted passages of a PDF, with page numbers, to XLSX", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Pages before the real page 1 (cover, preface, contents)
    #[arg(long, default_value_t = DEFAULT_FRONT_MATTER)]
    front_matter: u32,

    /// Output workbook
    #[arg(short, long, value_name = "FILE", default_value = XLSX_FILE_NAME)]
    output: PathBuf,

    /// Print records as JSON instead of writing a workbook
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), pdf_highlights::PdfError> {
    let buffer = std::fs::read(&cli.input)?;
    let options = HighlightOptions {
        front_matter: cli.front_matter,
    };

    let progress = if cli.quiet || cli.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    };

    let report = process_pdf_mem_with_progress(&buffer, &options, |done, total| {
        progress.set_position((done * 100 / total.max(1)) as u64);
        progress.set_message(format!("page {}/{}", done, total));
    })?;
    progress.finish_and_clear();

    if let Some(warning) = empty_warning(&report) {
        eprintln!("{}", warning);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report.records)
            .map_err(|e| pdf_highlights::PdfError::Export(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    if report.is_empty() {
        return Ok(());
    }

    let export = report.to_xlsx()?;
    export.write_to(&cli.output)?;
    println!(
        "Found {} highlights in {} pages ({}ms).",
        report.records.len(),
        report.page_count,
        report.processing_time_ms
    );
    println!("Workbook written to: {}", cli.output.display());

    Ok(())
}

/// Printed to stderr for a run without highlights, in every output mode
fn empty_warning(report: &HighlightReport) -> Option<&'static str> {
    report
        .is_empty()
        .then_some("Warning: no highlighted text found.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_highlights::HighlightRecord;

    fn report(records: Vec<HighlightRecord>) -> HighlightReport {
        HighlightReport {
            records,
            page_count: 3,
            processing_time_ms: 0,
        }
    }

    #[test]
    fn test_empty_report_warns() {
        assert!(empty_warning(&report(Vec::new())).is_some());
        let found = report(vec![HighlightRecord {
            display_page: 18,
            text: "Important Fact".into(),
        }]);
        assert!(empty_warning(&found).is_none());
    }

    #[test]
    fn test_json_flag_parses() {
        let cli = Cli::parse_from(["pdf-highlights", "book.pdf", "--json"]);
        assert!(cli.json);
        assert_eq!(cli.front_matter, DEFAULT_FRONT_MATTER);
        let cli = Cli::parse_from(["pdf-highlights", "book.pdf", "--front-matter", "4294967295"]);
        assert_eq!(cli.front_matter, u32::MAX);
    }
}
