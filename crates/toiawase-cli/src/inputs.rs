//! Target list and profile loading.
//!
//! Targets arrive as CSV (with or without a header row) or a JSON array;
//! the profile is one JSON object. Rows that cannot yield a usable URL
//! are skipped with a warning so a single bad line never sinks a batch.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use toiawase_core::{Profile, Target};
use tracing::warn;

/// Header cells recognized as the entry-URL column.
const URL_HEADERS: &[&str] = &["url", "ホームページ", "リンク"];

/// Header cells recognized as the company-label column.
const COMPANY_HEADERS: &[&str] = &["company", "会社名", "企業名", "社名"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load the target list from a CSV or JSON file.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let format = InputFormat::from_path(path).with_context(|| {
        format!(
            "cannot tell the target format from the extension (expected .csv or .json): {}",
            path.display()
        )
    })?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read target list: {}", path.display()))?;

    let targets = match format {
        InputFormat::Csv => parse_csv_targets(&content)?,
        InputFormat::Json => parse_json_targets(&content)?,
    };
    if targets.is_empty() {
        bail!("no usable targets in {}", path.display());
    }
    Ok(targets)
}

/// Parse targets from CSV content.
///
/// Accepts a header row naming a URL column (and optionally a company
/// column), or headerless rows where the URL is found by its scheme.
fn parse_csv_targets(content: &str) -> Result<Vec<Target>> {
    let first_line = content.lines().next().unwrap_or("").to_lowercase();
    let has_header =
        URL_HEADERS.iter().any(|k| first_line.contains(k)) && !first_line.contains("http");

    let mut targets = Vec::new();
    if has_header {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .context("failed to read CSV headers")?
            .clone();
        let url_idx =
            position_of(&headers, URL_HEADERS).context("CSV header row has no URL column")?;
        let company_idx = position_of(&headers, COMPANY_HEADERS);

        for (row, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    warn!(row = row + 2, error = %err, "Skipping malformed CSV record");
                    continue;
                }
            };
            let Some(url) = record
                .get(url_idx)
                .map(str::trim)
                .filter(|u| u.starts_with("http"))
            else {
                warn!(row = row + 2, "Skipping row without a usable URL");
                continue;
            };
            let company = company_idx
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .unwrap_or("");
            targets.push(Target::new(company, url));
        }
    } else {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(content.as_bytes());
        for (row, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    warn!(row = row + 1, error = %err, "Skipping malformed CSV record");
                    continue;
                }
            };
            let Some(url) = record.iter().map(str::trim).find(|f| f.starts_with("http")) else {
                warn!(row = row + 1, "Skipping row without a usable URL");
                continue;
            };
            let company = record
                .iter()
                .map(str::trim)
                .find(|f| !f.starts_with("http") && !f.is_empty())
                .unwrap_or("");
            targets.push(Target::new(company, url));
        }
    }
    Ok(targets)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetRecord {
    Url(String),
    Entry {
        #[serde(default, alias = "name", alias = "会社名")]
        company: String,
        url: String,
    },
}

/// Parse targets from a JSON array of URL strings or
/// `{"company": ..., "url": ...}` objects.
fn parse_json_targets(content: &str) -> Result<Vec<Target>> {
    let records: Vec<TargetRecord> = serde_json::from_str(content)
        .context("target JSON must be an array of URLs or {company, url} objects")?;

    let mut targets = Vec::new();
    for record in records {
        let (company, url) = match record {
            TargetRecord::Url(url) => (String::new(), url),
            TargetRecord::Entry { company, url } => (company, url),
        };
        let url = url.trim();
        if !url.starts_with("http") {
            warn!(url, "Skipping entry without a usable URL");
            continue;
        }
        targets.push(Target::new(company, url));
    }
    Ok(targets)
}

/// Load the sender profile from a JSON file.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read profile: {}", path.display()))?;
    let profile: Profile = serde_json::from_str(&content)
        .with_context(|| format!("profile JSON is malformed: {}", path.display()))?;
    if profile.message.trim().is_empty() {
        warn!("Profile has no message; the response field will carry the placeholder text");
    }
    Ok(profile)
}

fn position_of(headers: &csv::StringRecord, keys: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let cell = h.trim().to_lowercase();
        keys.iter().any(|k| cell.contains(k))
    })
}
