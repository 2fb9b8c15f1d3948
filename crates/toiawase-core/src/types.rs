//! Shared types used across the toiawase pipeline.
//!
//! This module defines the semantic profile, target records, field type
//! vocabulary, and the outcome model that every other crate builds on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Semantic categories of form inputs, independent of any site-specific
/// attribute naming.
///
/// The enumeration is closed: classification never invents new categories,
/// it only ranks these against a page's labels and name attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Full name (kanji or latin)
    Name,
    /// Surname
    Surname,
    /// Given name
    GivenName,
    /// Surname reading in katakana
    SurnameKana,
    /// Given name reading in katakana
    GivenNameKana,
    /// Surname reading in hiragana
    SurnameHira,
    /// Given name reading in hiragana
    GivenNameHira,
    /// Company or organization name
    Company,
    /// Department within the company
    Department,
    /// Job title
    Position,
    /// Message subject line
    Subject,
    /// Industry sector
    Industry,
    /// Employee headcount bracket
    Headcount,
    /// Email address
    Email,
    /// Telephone number
    Tel,
    /// Fax number
    Fax,
    /// Postal code
    PostalCode,
    /// Prefecture
    Prefecture,
    /// City or ward
    City,
    /// Street address below city level
    Street,
    /// Building, floor, or room
    Building,
    /// Single-field full address
    FullAddress,
    /// Web site URL
    Url,
}

impl FieldType {
    /// Get a human-readable display name for the field type.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Surname => "Surname",
            Self::GivenName => "Given Name",
            Self::SurnameKana => "Surname (Katakana)",
            Self::GivenNameKana => "Given Name (Katakana)",
            Self::SurnameHira => "Surname (Hiragana)",
            Self::GivenNameHira => "Given Name (Hiragana)",
            Self::Company => "Company",
            Self::Department => "Department",
            Self::Position => "Position",
            Self::Subject => "Subject",
            Self::Industry => "Industry",
            Self::Headcount => "Headcount",
            Self::Email => "Email Address",
            Self::Tel => "Telephone",
            Self::Fax => "Fax",
            Self::PostalCode => "Postal Code",
            Self::Prefecture => "Prefecture",
            Self::City => "City",
            Self::Street => "Street",
            Self::Building => "Building",
            Self::FullAddress => "Full Address",
            Self::Url => "URL",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The sender identity and message used to fill forms.
///
/// Immutable for the duration of a run. Attributes beyond the core set
/// (kana readings, address parts, subject, industry, ...) live in `extra`
/// and are captured from any additional keys in the profile JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Full name, surname first
    pub name: String,
    /// Company name
    pub company: String,
    /// Department
    pub department: String,
    /// Job title
    pub position: String,
    /// Email address
    pub email: String,
    /// Telephone number
    pub tel: String,
    /// Full postal address in one line
    #[serde(alias = "fullAddress")]
    pub full_address: String,
    /// Inquiry body; may contain `{{tag}}` placeholders
    pub message: String,
    /// Open-ended additional attributes (sei, mei, sei_kana, zip,
    /// prefecture, city, street, building, url, subject, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Profile {
    /// Look up the profile value for a semantic field type.
    ///
    /// Returns `None` when the profile has no non-empty value for the
    /// type. Surname and given name fall back to splitting `name` on
    /// whitespace (surname first) when no explicit `sei`/`mei` keys exist.
    #[must_use]
    pub fn attribute(&self, field: FieldType) -> Option<&str> {
        match field {
            FieldType::Name => non_empty(&self.name),
            FieldType::Surname => self.extra_value("sei").or_else(|| self.name_part(0)),
            FieldType::GivenName => self.extra_value("mei").or_else(|| self.name_part(1)),
            FieldType::SurnameKana => self.extra_value("sei_kana"),
            FieldType::GivenNameKana => self.extra_value("mei_kana"),
            FieldType::SurnameHira => self.extra_value("sei_hira"),
            FieldType::GivenNameHira => self.extra_value("mei_hira"),
            FieldType::Company => non_empty(&self.company),
            FieldType::Department => non_empty(&self.department),
            FieldType::Position => non_empty(&self.position),
            FieldType::Subject => self.extra_value("subject"),
            FieldType::Industry => self.extra_value("industry"),
            FieldType::Headcount => self.extra_value("headcount"),
            FieldType::Email => non_empty(&self.email),
            FieldType::Tel => non_empty(&self.tel),
            FieldType::Fax => self.extra_value("fax").or_else(|| non_empty(&self.tel)),
            FieldType::PostalCode => self.extra_value("zip").or_else(|| self.extra_value("postal_code")),
            FieldType::Prefecture => self.extra_value("prefecture"),
            FieldType::City => self.extra_value("city"),
            FieldType::Street => self.extra_value("street"),
            FieldType::Building => self.extra_value("building"),
            FieldType::FullAddress => non_empty(&self.full_address),
            FieldType::Url => self.extra_value("url"),
        }
    }

    /// Resolve `{{tag}}` placeholders in the message from the profile's
    /// own attributes, returning the profile with the message rewritten.
    ///
    /// Recognized tags are the core attribute names (`{{name}}`,
    /// `{{company}}`, `{{department}}`, `{{position}}`, `{{email}}`,
    /// `{{tel}}`, `{{full_address}}`) plus every `extra` key. Resolution
    /// happens once, before any target is processed.
    #[must_use]
    pub fn with_resolved_message(mut self) -> Self {
        let mut message = self.message.clone();
        let core: [(&str, &str); 8] = [
            ("name", &self.name),
            ("company", &self.company),
            ("department", &self.department),
            ("position", &self.position),
            ("email", &self.email),
            ("tel", &self.tel),
            ("full_address", &self.full_address),
            // legacy camel-case spelling still appears in older templates
            ("fullAddress", &self.full_address),
        ];
        for (tag, value) in core {
            message = message.replace(&format!("{{{{{tag}}}}}"), value);
        }
        for (tag, value) in &self.extra {
            message = message.replace(&format!("{{{{{tag}}}}}"), value);
        }
        self.message = message;
        self
    }

    fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str).and_then(non_empty)
    }

    fn name_part(&self, index: usize) -> Option<&str> {
        self.name.split_whitespace().nth(index).and_then(non_empty)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// One entry from the target list: a company label and an entry URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Company or site label from the input list
    pub company: String,
    /// Entry URL to start discovery from
    pub url: String,
}

impl Target {
    /// Create a target from a label and URL.
    pub fn new(company: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.company)
    }
}

/// Closed set of verdict reasons recorded on every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// The page carries explicit sales-refusal wording; deliberate no-op
    SkipRefusal,
    /// No form and no contact link candidates anywhere
    ErrNoForm,
    /// Contact links existed but no candidate page carried a form
    ErrContactPageNoForm,
    /// No activatable submit control was found
    ErrNoSubmit,
    /// Post-submission evidence indicates a required-field validator fired
    ErrRequiredUnfilled,
    /// Unexpected driver or navigation error at the target boundary
    ErrException,
    /// Submission produced no success evidence; conservative default
    ErrUnknown,
    /// Explicit success wording or success-shaped URL observed
    OkSuccessKeyword,
    /// Form UI disappeared after a success signal in the same check round
    OkNoFormUi,
    /// A confirmation page was traversed and the final state shows no failure
    OkConfirmClicked,
}

impl ReasonCode {
    /// The stable wire name of this reason, as recorded in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipRefusal => "SKIP_REFUSAL",
            Self::ErrNoForm => "ERR_NO_FORM",
            Self::ErrContactPageNoForm => "ERR_CONTACT_PAGE_NO_FORM",
            Self::ErrNoSubmit => "ERR_NO_SUBMIT",
            Self::ErrRequiredUnfilled => "ERR_REQUIRED_UNFILLED",
            Self::ErrException => "ERR_EXCEPTION",
            Self::ErrUnknown => "ERR_UNKNOWN",
            Self::OkSuccessKeyword => "OK_SUCCESS_KEYWORD",
            Self::OkNoFormUi => "OK_NO_FORM_UI",
            Self::OkConfirmClicked => "OK_CONFIRM_CLICKED",
        }
    }

    /// Whether this reason counts as a successful submission.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::OkSuccessKeyword | Self::OkNoFormUi | Self::OkConfirmClicked
        )
    }

    /// Whether this reason is a deliberate policy skip rather than a failure.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkipRefusal)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The final verdict recorded for one target.
///
/// Created exactly once at the end of that target's processing and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Company label from the target record
    pub company: String,
    /// Entry URL from the target record
    pub url: String,
    /// Whether the submission is considered successful
    pub success: bool,
    /// Classification reason
    pub reason: ReasonCode,
    /// Free-text supporting evidence
    pub detail: String,
    /// URL the browser ended on
    pub final_url: String,
    /// When the verdict was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Outcome {
    /// Record a verdict for a target. `success` is derived from the reason.
    #[must_use]
    pub fn new(target: &Target, reason: ReasonCode, detail: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            company: target.company.clone(),
            url: target.url.clone(),
            success: reason.is_success(),
            reason,
            detail: detail.into(),
            final_url: final_url.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Ordered collection of outcomes for a run, with aggregate tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// One outcome per target, in input order
    pub outcomes: Vec<Outcome>,
}

impl RunSummary {
    /// Create an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target's outcome. Call exactly once per target.
    pub fn record(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Number of targets processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of successful submissions.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of policy skips (refusal wording detected).
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.reason.is_skip()).count()
    }

    /// Number of failed submissions (neither success nor skip).
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.success && !o.reason.is_skip())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> Profile {
        let mut extra = BTreeMap::new();
        extra.insert("sei_kana".to_string(), "ヤマダ".to_string());
        extra.insert("mei_kana".to_string(), "タロウ".to_string());
        extra.insert("zip".to_string(), "1000001".to_string());
        extra.insert("prefecture".to_string(), "東京都".to_string());
        Profile {
            name: "山田 太郎".to_string(),
            company: "株式会社テスト".to_string(),
            department: "営業部".to_string(),
            position: "部長".to_string(),
            email: "taro@example.co.jp".to_string(),
            tel: "0312345678".to_string(),
            full_address: "東京都千代田区1-1-1".to_string(),
            message: "{{company}}の{{name}}です。".to_string(),
            extra,
        }
    }

    #[test]
    fn test_attribute_core_fields() {
        let profile = sample_profile();
        assert_eq!(profile.attribute(FieldType::Name), Some("山田 太郎"));
        assert_eq!(profile.attribute(FieldType::Company), Some("株式会社テスト"));
        assert_eq!(profile.attribute(FieldType::Email), Some("taro@example.co.jp"));
        assert_eq!(profile.attribute(FieldType::Url), None);
    }

    #[test]
    fn test_attribute_name_split() {
        let profile = sample_profile();
        assert_eq!(profile.attribute(FieldType::Surname), Some("山田"));
        assert_eq!(profile.attribute(FieldType::GivenName), Some("太郎"));
    }

    #[test]
    fn test_attribute_name_split_ideographic_space() {
        let profile = Profile {
            name: "山田\u{3000}太郎".to_string(),
            ..Profile::default()
        };
        assert_eq!(profile.attribute(FieldType::Surname), Some("山田"));
        assert_eq!(profile.attribute(FieldType::GivenName), Some("太郎"));
    }

    #[test]
    fn test_attribute_explicit_sei_overrides_split() {
        let mut profile = sample_profile();
        profile
            .extra
            .insert("sei".to_string(), "佐藤".to_string());
        assert_eq!(profile.attribute(FieldType::Surname), Some("佐藤"));
    }

    #[test]
    fn test_attribute_fax_falls_back_to_tel() {
        let profile = sample_profile();
        assert_eq!(profile.attribute(FieldType::Fax), Some("0312345678"));
    }

    #[test]
    fn test_attribute_kana_from_extras() {
        let profile = sample_profile();
        assert_eq!(profile.attribute(FieldType::SurnameKana), Some("ヤマダ"));
        assert_eq!(profile.attribute(FieldType::GivenNameHira), None);
    }

    #[test]
    fn test_message_tag_resolution() {
        let profile = sample_profile().with_resolved_message();
        assert_eq!(profile.message, "株式会社テストの山田 太郎です。");
    }

    #[test]
    fn test_message_tag_resolution_extras_and_legacy() {
        let mut profile = sample_profile();
        profile.message = "〒{{zip}} {{fullAddress}}".to_string();
        let resolved = profile.with_resolved_message();
        assert_eq!(resolved.message, "〒1000001 東京都千代田区1-1-1");
    }

    #[test]
    fn test_profile_json_flattens_extras() {
        let json = r#"{
            "name": "山田 太郎",
            "email": "taro@example.co.jp",
            "message": "test",
            "fullAddress": "東京都千代田区1-1-1",
            "sei_kana": "ヤマダ"
        }"#;
        let profile: Profile = serde_json::from_str(json).expect("parse profile JSON");
        assert_eq!(profile.full_address, "東京都千代田区1-1-1");
        assert_eq!(profile.extra.get("sei_kana").map(String::as_str), Some("ヤマダ"));
    }

    #[test]
    fn test_reason_code_wire_names() {
        let json = serde_json::to_string(&ReasonCode::OkSuccessKeyword).expect("serialize reason");
        assert_eq!(json, "\"OK_SUCCESS_KEYWORD\"");
        let parsed: ReasonCode =
            serde_json::from_str("\"ERR_CONTACT_PAGE_NO_FORM\"").expect("deserialize reason");
        assert_eq!(parsed, ReasonCode::ErrContactPageNoForm);
        assert_eq!(parsed.as_str(), "ERR_CONTACT_PAGE_NO_FORM");
    }

    #[test]
    fn test_reason_code_classes() {
        assert!(ReasonCode::OkNoFormUi.is_success());
        assert!(ReasonCode::OkConfirmClicked.is_success());
        assert!(!ReasonCode::ErrUnknown.is_success());
        assert!(ReasonCode::SkipRefusal.is_skip());
        assert!(!ReasonCode::SkipRefusal.is_success());
    }

    #[test]
    fn test_outcome_success_derived_from_reason() {
        let target = Target::new("テスト社", "https://example.co.jp");
        let ok = Outcome::new(&target, ReasonCode::OkSuccessKeyword, "thanks page", "https://example.co.jp/thanks");
        assert!(ok.success);
        let err = Outcome::new(&target, ReasonCode::ErrNoForm, "", "https://example.co.jp");
        assert!(!err.success);
        assert_eq!(err.company, "テスト社");
    }

    #[test]
    fn test_run_summary_tallies() {
        let target = Target::new("a", "https://a.example");
        let mut summary = RunSummary::new();
        summary.record(Outcome::new(&target, ReasonCode::OkConfirmClicked, "", ""));
        summary.record(Outcome::new(&target, ReasonCode::SkipRefusal, "", ""));
        summary.record(Outcome::new(&target, ReasonCode::ErrUnknown, "", ""));
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
    }
}
