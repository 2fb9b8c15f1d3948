//! Heuristic keyword tables, loaded as ordered data.
//!
//! Every vocabulary the pipeline matches against a page (field labels,
//! contact link hints, submit button wording, verdict keywords) lives in a
//! TOML table rather than in code branches, so new site vocabularies can be
//! added without touching control flow. A built-in table ships embedded in
//! the binary; operators may replace it with their own file via
//! `[keywords] table_path` in the config.
//!
//! Order is significant throughout: `[[field]]` entries are tried top to
//! bottom and the first match wins, which is how 会社名 is claimed by the
//! company entry before the generic 名 falls through to the given-name one.

use crate::error::{KeywordError, KeywordResult};
use crate::types::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

const DEFAULT_TABLE: &str = include_str!("../keywords/default.toml");

/// The full keyword vocabulary used by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordTable {
    /// Contact link discovery vocabulary
    pub discovery: DiscoveryKeywords,
    /// Sales-refusal wording that skips a target
    pub refusal: RefusalKeywords,
    /// Free-text response control identification
    pub response: ResponseKeywords,
    /// Ordered field classification entries
    #[serde(rename = "field")]
    pub fields: Vec<FieldKeywords>,
    /// Markers for email/tel re-entry twins
    pub confirm_mirror: ConfirmMirrorKeywords,
    /// Agreement checkbox vocabulary
    pub consent: ConsentKeywords,
    /// Submit button vocabulary
    pub submit: SubmitKeywords,
    /// Verdict classification vocabulary
    pub classify: ClassifyKeywords,
}

/// Anchor vocabulary for contact link discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryKeywords {
    /// Substrings matched against href attributes
    pub href: Vec<String>,
    /// Substrings matched against visible link text
    pub text: Vec<String>,
}

/// Refusal wording. Pages carrying any of these are skipped outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefusalKeywords {
    /// Substrings matched against the page body
    pub keywords: Vec<String>,
}

/// Vocabulary identifying the free-text inquiry body control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseKeywords {
    /// Name/id substrings in priority order
    pub name_keywords: Vec<String>,
    /// Message used when the profile has none
    pub placeholder_message: String,
}

/// One ordered classification entry: a field type and its match vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldKeywords {
    /// The semantic field type this entry claims
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Substrings matched against label text and name/id attributes
    pub keywords: Vec<String>,
    /// Control-name substrings that veto the claim
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Markers identifying confirmation twins of email/tel inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmMirrorKeywords {
    /// Name/id substrings marking a re-entry control
    pub markers: Vec<String>,
}

/// Agreement checkbox vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentKeywords {
    /// Label substrings for consent boxes
    pub keywords: Vec<String>,
}

/// Submit button vocabulary, tiered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitKeywords {
    /// Confirmation-step wording, tried before final-send wording
    pub confirm: Vec<String>,
    /// Final-send wording
    pub send: Vec<String>,
    /// Wording that disqualifies a control at every tier
    pub exclude: Vec<String>,
    /// Href substrings for anchor-styled submit buttons
    pub href: Vec<String>,
}

/// Verdict classification vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyKeywords {
    /// Explicit success wording
    pub success: Vec<String>,
    /// Error-banner wording
    pub failure: Vec<String>,
    /// Subset of failure wording indicating a required-field validator
    pub required: Vec<String>,
    /// URL substrings of success pages
    pub success_url: Vec<String>,
    /// URL substrings of site-search result pages
    pub search_url: Vec<String>,
    /// Wording of intermediate confirmation pages
    pub confirm_page: Vec<String>,
    /// Async form-plugin markers
    pub widgets: WidgetMarkers,
}

/// CSS selectors for async form-plugin response containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetMarkers {
    /// Selectors that signal a successful AJAX submission
    pub success_selectors: Vec<String>,
    /// Selectors that signal a rejected AJAX submission
    pub failure_selectors: Vec<String>,
}

impl KeywordTable {
    /// The built-in table embedded in the binary.
    pub fn builtin() -> &'static Self {
        static TABLE: OnceLock<KeywordTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let table: KeywordTable =
                toml::from_str(DEFAULT_TABLE).expect("embedded keyword table parses");
            table
                .validate()
                .expect("embedded keyword table is valid");
            table
        })
    }

    /// Load a replacement table from a TOML file.
    pub fn load(path: &Path) -> KeywordResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table: Self = toml::from_str(&contents).map_err(|source| KeywordError::ParseError {
            path: path.display().to_string(),
            source,
        })?;
        table.validate()?;
        tracing::info!(path = %path.display(), entries = table.fields.len(), "Loaded keyword table override");
        Ok(table)
    }

    /// Load the override table when a path is configured, else the built-in.
    pub fn load_or_builtin(path: Option<&Path>) -> KeywordResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin().clone()),
        }
    }

    /// Validate structural invariants of the table.
    pub fn validate(&self) -> KeywordResult<()> {
        if self.fields.is_empty() {
            return Err(KeywordError::ValidationError {
                reason: "no [[field]] entries".to_string(),
            });
        }

        let mut seen: HashSet<FieldType> = HashSet::new();
        for entry in &self.fields {
            if !seen.insert(entry.field_type) {
                return Err(KeywordError::ValidationError {
                    reason: format!("duplicate [[field]] entry for {}", entry.field_type),
                });
            }
            if entry.keywords.is_empty() {
                return Err(KeywordError::ValidationError {
                    reason: format!("empty keyword list for {}", entry.field_type),
                });
            }
        }

        let required_nonempty: [(&str, &Vec<String>); 7] = [
            ("discovery.href", &self.discovery.href),
            ("discovery.text", &self.discovery.text),
            ("response.name_keywords", &self.response.name_keywords),
            ("submit.send", &self.submit.send),
            ("classify.success", &self.classify.success),
            ("classify.failure", &self.classify.failure),
            ("classify.confirm_page", &self.classify.confirm_page),
        ];
        for (name, list) in required_nonempty {
            if list.is_empty() {
                return Err(KeywordError::ValidationError {
                    reason: format!("empty list: {name}"),
                });
            }
        }

        Ok(())
    }

    /// Classify text (a label or a name/id attribute) against the ordered
    /// field entries. The first entry with a substring match wins.
    #[must_use]
    pub fn classify_text(&self, text: &str) -> Option<FieldType> {
        let lowered = text.to_lowercase();
        self.fields
            .iter()
            .find(|entry| contains_any(&lowered, &entry.keywords))
            .map(|entry| entry.field_type)
    }

    /// Whether routing `field_type`'s value into a control with this
    /// name/id would violate the entry's deny list (the same-field
    /// duplicate guard, e.g. a full address into a `*mail*` control).
    #[must_use]
    pub fn deny_violated(&self, field_type: FieldType, control_name: &str) -> bool {
        let lowered = control_name.to_lowercase();
        self.entry(field_type)
            .is_some_and(|entry| contains_any(&lowered, &entry.deny))
    }

    /// The classification entry for a field type, if the table has one.
    #[must_use]
    pub fn entry(&self, field_type: FieldType) -> Option<&FieldKeywords> {
        self.fields.iter().find(|e| e.field_type == field_type)
    }
}

/// Case-insensitive substring containment against a keyword list.
///
/// The haystack must already be lowercased; needles are lowercased here
/// since tables may carry mixed-case vocabulary.
#[must_use]
pub fn contains_any(haystack_lower: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| haystack_lower.contains(&needle.to_lowercase()))
}

/// Like [`contains_any`], returning the matched needle for evidence detail.
#[must_use]
pub fn find_match<'a>(haystack_lower: &str, needles: &'a [String]) -> Option<&'a str> {
    needles
        .iter()
        .find(|needle| haystack_lower.contains(&needle.to_lowercase()))
        .map(String::as_str)
}
