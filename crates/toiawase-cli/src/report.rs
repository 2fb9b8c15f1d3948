//! Outcome reporting: per-target console lines and the JSON report file.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use toiawase_core::{Outcome, RunSummary};

/// The document written to the report file.
#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    generated_at: DateTime<Local>,
    processed: usize,
    succeeded: usize,
    skipped: usize,
    failed: usize,
    outcomes: &'a [Outcome],
}

/// Print one line per outcome, then the aggregate tally.
pub fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        println!("{}", render_line(outcome));
    }
    println!();
    println!(
        "{} processed: {} succeeded, {} skipped, {} failed",
        summary.processed(),
        summary.succeeded().to_string().green().bold(),
        summary.skipped().to_string().yellow().bold(),
        summary.failed().to_string().red().bold(),
    );
}

fn render_line(outcome: &Outcome) -> String {
    let status = if outcome.success {
        "OK  ".green().bold()
    } else if outcome.reason.is_skip() {
        "SKIP".yellow().bold()
    } else {
        "NG  ".red().bold()
    };
    let label = if outcome.company.is_empty() {
        outcome.url.clone()
    } else {
        format!("{} ({})", outcome.url, outcome.company)
    };
    format!(
        "{status} {:<24} {label}: {}",
        outcome.reason.as_str(),
        outcome.detail
    )
}

/// Write the JSON report into `dir` and return its path.
pub fn write_report(summary: &RunSummary, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory: {}", dir.display()))?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("run-{stamp}.json"));

    let document = ReportDocument {
        generated_at: Local::now(),
        processed: summary.processed(),
        succeeded: summary.succeeded(),
        skipped: summary.skipped(),
        failed: summary.failed(),
        outcomes: &summary.outcomes,
    };
    let body =
        serde_json::to_string_pretty(&document).context("failed to serialize the run report")?;
    fs::write(&path, body)
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toiawase_core::{ReasonCode, Target};

    fn summary_of(reasons: &[ReasonCode]) -> RunSummary {
        let mut summary = RunSummary::new();
        for (i, &reason) in reasons.iter().enumerate() {
            let target = Target::new(format!("社{i}"), format!("https://example{i}.co.jp"));
            summary.record(Outcome::new(&target, reason, "detail", "https://final.example"));
        }
        summary
    }

    #[test]
    fn test_render_line_carries_reason_and_url() {
        let target = Target::new("株式会社例", "https://example.co.jp");
        let outcome = Outcome::new(
            &target,
            ReasonCode::OkSuccessKeyword,
            "success wording (ありがとう)",
            "https://example.co.jp/thanks",
        );
        let line = render_line(&outcome);
        assert!(line.contains("OK_SUCCESS_KEYWORD"));
        assert!(line.contains("https://example.co.jp (株式会社例)"));
        assert!(line.contains("ありがとう"));
    }

    #[test]
    fn test_render_line_without_company_label() {
        let target = Target::new("", "https://example.co.jp");
        let outcome = Outcome::new(&target, ReasonCode::ErrNoForm, "detail", "");
        let line = render_line(&outcome);
        assert!(line.contains("https://example.co.jp:"));
        assert!(!line.contains("()"));
    }

    #[test]
    fn test_write_report_creates_json_document() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let summary = summary_of(&[
            ReasonCode::OkSuccessKeyword,
            ReasonCode::SkipRefusal,
            ReasonCode::ErrNoForm,
        ]);

        let path = write_report(&summary, dir.path()).expect("write report");
        assert!(path.file_name().expect("name").to_string_lossy().starts_with("run-"));

        let body = std::fs::read_to_string(&path).expect("read back");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
        assert_eq!(parsed["processed"], 3);
        assert_eq!(parsed["succeeded"], 1);
        assert_eq!(parsed["skipped"], 1);
        assert_eq!(parsed["failed"], 1);
        assert_eq!(parsed["outcomes"].as_array().expect("array").len(), 3);
        assert_eq!(parsed["outcomes"][0]["reason"], "OK_SUCCESS_KEYWORD");
    }
}
