//! Outcome classification: turning post-submission page state into a
//! verdict.
//!
//! Evidence is gathered into a [`PageEvidence`] snapshot through the
//! browser; the verdict functions over it are pure. [`classify`] renders
//! the decisive transient signals (explicit wording, URL shape, plugin
//! markers, confirmation pages); [`finalize`] adds the end-state judgments
//! that only make sense once polling is over, with failure as the
//! conservative default for anything ambiguous. [`decide`] is the bounded
//! poll loop tying the two together.

use crate::error::Result;
use crate::fill::ControlIdentity;
use std::time::Duration;
use toiawase_browser::{ScopeRef, Session};
use toiawase_core::keywords::{contains_any, find_match, ClassifyKeywords, KeywordTable};
use toiawase_core::ReasonCode;
use tracing::debug;

/// Bytes of rendered body text gathered per observation.
const BODY_TEXT_LIMIT: usize = 20_000;

/// Which check round is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// After the first submission
    First,
    /// After pressing through a confirmation page
    AfterConfirm,
}

/// Async form-plugin response marker found in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetMarker {
    Success,
    Failure,
}

/// Snapshot of the page state a verdict is computed from.
#[derive(Debug, Clone)]
pub struct PageEvidence {
    pub url: String,
    pub body_text: String,
    pub form_ui_present: bool,
    /// Current value of the original response control; `None` when the
    /// control no longer exists
    pub response_control_value: Option<String>,
    pub widget_marker: Option<WidgetMarker>,
}

/// The classification result for one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success { reason: ReasonCode, detail: String },
    Failure { reason: ReasonCode, detail: String },
    /// An intermediate confirmation page: press submit once more
    NeedsConfirm,
    /// No decisive evidence yet
    Pending,
}

/// Classify the decisive transient signals, in strict precedence:
/// explicit failure wording or a search-results URL, then explicit
/// success wording or a success-shaped URL, then form-plugin markers,
/// then confirmation-page detection (first round only). Anything else is
/// [`Verdict::Pending`].
#[must_use]
pub fn classify(evidence: &PageEvidence, round: Round, table: &KeywordTable) -> Verdict {
    let rules = &table.classify;
    let body = evidence.body_text.to_lowercase();
    let url = evidence.url.to_lowercase();

    if let Some(matched) = find_match(&body, &rules.failure) {
        return failure_verdict(rules, &body, format!("failure wording ({matched})"));
    }
    if let Some(matched) = find_match(&url, &rules.search_url) {
        return Verdict::Failure {
            reason: ReasonCode::ErrUnknown,
            detail: format!("search-results URL ({matched})"),
        };
    }

    if let Some(matched) = find_match(&body, &rules.success) {
        return Verdict::Success {
            reason: ReasonCode::OkSuccessKeyword,
            detail: format!("success wording ({matched})"),
        };
    }
    if let Some(matched) = find_match(&url, &rules.success_url) {
        return Verdict::Success {
            reason: ReasonCode::OkSuccessKeyword,
            detail: format!("success URL ({matched})"),
        };
    }

    match evidence.widget_marker {
        Some(WidgetMarker::Success) => {
            return Verdict::Success {
                reason: ReasonCode::OkSuccessKeyword,
                detail: "form plugin reported sent".to_string(),
            };
        }
        Some(WidgetMarker::Failure) => {
            return failure_verdict(rules, &body, "form plugin reported failure".to_string());
        }
        None => {}
    }

    if round == Round::First && contains_any(&body, &rules.confirm_page) {
        return Verdict::NeedsConfirm;
    }

    Verdict::Pending
}

/// The end-state judgment once polling is over. Runs the transient
/// precedence first, then: a response control still holding text means
/// the form never advanced; a vanished form counts as success only when
/// the page actually navigated (or in the confirm round, where the press
/// itself is the advancement); everything else fails conservatively.
#[must_use]
pub fn finalize(
    evidence: &PageEvidence,
    round: Round,
    saw_url_change: bool,
    table: &KeywordTable,
) -> Verdict {
    match classify(evidence, round, table) {
        Verdict::Pending => {}
        decisive => return decisive,
    }

    if let Some(value) = &evidence.response_control_value {
        if !value.trim().is_empty() {
            return Verdict::Failure {
                reason: ReasonCode::ErrUnknown,
                detail: "form did not advance; response text still present".to_string(),
            };
        }
    }

    if !evidence.form_ui_present {
        return match round {
            Round::AfterConfirm => Verdict::Success {
                reason: ReasonCode::OkConfirmClicked,
                detail: "confirmation accepted; form closed".to_string(),
            },
            Round::First if saw_url_change => Verdict::Success {
                reason: ReasonCode::OkNoFormUi,
                detail: "form gone after navigation".to_string(),
            },
            Round::First => Verdict::Failure {
                reason: ReasonCode::ErrUnknown,
                detail: "form gone without success evidence".to_string(),
            },
        };
    }

    Verdict::Failure {
        reason: ReasonCode::ErrUnknown,
        detail: "no decisive evidence".to_string(),
    }
}

fn failure_verdict(rules: &ClassifyKeywords, body_lower: &str, detail: String) -> Verdict {
    let reason = if contains_any(body_lower, &rules.required) {
        ReasonCode::ErrRequiredUnfilled
    } else {
        ReasonCode::ErrUnknown
    };
    Verdict::Failure { reason, detail }
}

/// Gather one evidence snapshot for a scope.
///
/// Frame-scoped forms contribute their own body text on top of the main
/// document's, since plugin messages render inside the frame. A scope
/// that no longer exists (the page navigated away from the framed form)
/// observes as formless with no response control, which is exactly what
/// the verdict functions expect.
pub async fn observe(
    session: &Session,
    scope: ScopeRef,
    response: Option<&ControlIdentity>,
    table: &KeywordTable,
) -> Result<PageEvidence> {
    let url = session.current_url().await?;
    let mut body_text = session.body_text(BODY_TEXT_LIMIT).await?;
    let dom = session.scope(scope);
    if scope != ScopeRef::Main {
        let frame_text = dom.body_text(BODY_TEXT_LIMIT).await?;
        if !frame_text.is_empty() {
            body_text.push('\n');
            body_text.push_str(&frame_text);
        }
    }

    let form_ui_present = dom.probe_form_ui().await?;
    let response_control_value = match response {
        Some(identity) => {
            let controls = dom.collect_controls().await?;
            controls
                .iter()
                .find(|c| identity.matches(c))
                .map(|c| c.value.clone())
        }
        None => None,
    };

    let widgets = &table.classify.widgets;
    let widget_marker = if dom.query_any(&widgets.success_selectors).await? {
        Some(WidgetMarker::Success)
    } else if dom.query_any(&widgets.failure_selectors).await? {
        Some(WidgetMarker::Failure)
    } else {
        None
    };

    Ok(PageEvidence {
        url,
        body_text,
        form_ui_present,
        response_control_value,
        widget_marker,
    })
}

/// Polling settings for [`decide`].
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Observe and classify until a decisive verdict or the poll deadline.
///
/// Transient signals (wording, markers, URLs) decide immediately; the
/// end-state judgments run once at the deadline so a slow AJAX response
/// is not mistaken for a stuck form.
pub async fn decide(
    session: &Session,
    scope: ScopeRef,
    response: Option<&ControlIdentity>,
    table: &KeywordTable,
    round: Round,
    settings: &PollSettings,
    pre_submit_url: &str,
) -> Result<Verdict> {
    let deadline = tokio::time::Instant::now() + settings.timeout;
    let mut saw_url_change = false;
    loop {
        let evidence = observe(session, scope, response, table).await?;
        if !evidence.url.is_empty() && evidence.url != pre_submit_url {
            saw_url_change = true;
        }
        let verdict = classify(&evidence, round, table);
        debug!(url = %evidence.url, form_ui = evidence.form_ui_present, ?verdict, "evidence checked");
        if verdict != Verdict::Pending {
            return Ok(verdict);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(finalize(&evidence, round, saw_url_change, table));
        }
        tokio::time::sleep(settings.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(body: &str, url: &str) -> PageEvidence {
        PageEvidence {
            url: url.to_string(),
            body_text: body.to_string(),
            form_ui_present: true,
            response_control_value: None,
            widget_marker: None,
        }
    }

    fn table() -> &'static KeywordTable {
        KeywordTable::builtin()
    }

    #[test]
    fn test_failure_wording_beats_everything() {
        let mut ev = evidence(
            "必須項目が入力されていません。ありがとうございました",
            "https://example.co.jp/contact",
        );
        ev.form_ui_present = false;
        let verdict = classify(&ev, Round::First, table());
        assert_eq!(
            verdict,
            Verdict::Failure {
                reason: ReasonCode::ErrRequiredUnfilled,
                detail: "failure wording (必須項目が)".to_string(),
            }
        );
    }

    #[test]
    fn test_generic_failure_wording() {
        let ev = evidence("送信できませんでした", "https://example.co.jp/contact");
        match classify(&ev, Round::First, table()) {
            Verdict::Failure { reason, .. } => assert_eq!(reason, ReasonCode::ErrUnknown),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_success_wording() {
        let ev = evidence(
            "お問い合わせありがとうございました。",
            "https://example.co.jp/contact",
        );
        match classify(&ev, Round::First, table()) {
            Verdict::Success { reason, .. } => assert_eq!(reason, ReasonCode::OkSuccessKeyword),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_success_url_shape() {
        let ev = evidence("", "https://example.co.jp/contact/thanks.html");
        match classify(&ev, Round::First, table()) {
            Verdict::Success { reason, detail } => {
                assert_eq!(reason, ReasonCode::OkSuccessKeyword);
                assert!(detail.contains("thanks"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_search_url_is_failure() {
        let ev = evidence("", "https://example.co.jp/?s=%E3%81%8A%E5%95%8F");
        match classify(&ev, Round::First, table()) {
            Verdict::Failure { reason, .. } => assert_eq!(reason, ReasonCode::ErrUnknown),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_widget_markers() {
        let mut ev = evidence("", "https://example.co.jp/contact");
        ev.widget_marker = Some(WidgetMarker::Success);
        assert!(matches!(
            classify(&ev, Round::First, table()),
            Verdict::Success { .. }
        ));

        ev.widget_marker = Some(WidgetMarker::Failure);
        assert_eq!(
            classify(&ev, Round::First, table()),
            Verdict::Failure {
                reason: ReasonCode::ErrUnknown,
                detail: "form plugin reported failure".to_string(),
            }
        );

        // A validator plugin paired with on-page required wording upgrades
        // the reason even though the wording itself already decides
        ev.body_text = "入力してください".to_string();
        match classify(&ev, Round::First, table()) {
            Verdict::Failure { reason, .. } => assert_eq!(reason, ReasonCode::ErrRequiredUnfilled),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_confirmation_page_first_round_only() {
        let ev = evidence(
            "入力内容をご確認のうえ、送信してください",
            "https://example.co.jp/contact/confirm",
        );
        assert_eq!(classify(&ev, Round::First, table()), Verdict::NeedsConfirm);
        assert_eq!(
            classify(&ev, Round::AfterConfirm, table()),
            Verdict::Pending
        );
    }

    #[test]
    fn test_pending_without_evidence() {
        let ev = evidence("本文です", "https://example.co.jp/contact");
        assert_eq!(classify(&ev, Round::First, table()), Verdict::Pending);
    }

    #[test]
    fn test_finalize_response_still_filled_is_failure() {
        let mut ev = evidence("特に表示なし", "https://example.co.jp/contact");
        ev.response_control_value = Some("お問い合わせ内容です。".to_string());
        match finalize(&ev, Round::First, false, table()) {
            Verdict::Failure { reason, detail } => {
                assert_eq!(reason, ReasonCode::ErrUnknown);
                assert!(detail.contains("did not advance"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_finalize_form_gone_after_navigation() {
        let mut ev = evidence("受付番号 1234", "https://example.co.jp/contact/sent");
        ev.form_ui_present = false;
        match finalize(&ev, Round::First, true, table()) {
            Verdict::Success { reason, .. } => assert_eq!(reason, ReasonCode::OkNoFormUi),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_finalize_form_gone_without_navigation_is_failure() {
        let mut ev = evidence("", "https://example.co.jp/contact");
        ev.form_ui_present = false;
        assert!(matches!(
            finalize(&ev, Round::First, false, table()),
            Verdict::Failure { .. }
        ));
    }

    #[test]
    fn test_finalize_confirm_round_form_closed() {
        let mut ev = evidence("", "https://example.co.jp/contact/confirm");
        ev.form_ui_present = false;
        match finalize(&ev, Round::AfterConfirm, false, table()) {
            Verdict::Success { reason, .. } => assert_eq!(reason, ReasonCode::OkConfirmClicked),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_finalize_conservative_default() {
        let ev = evidence("読み込み中", "https://example.co.jp/contact");
        match finalize(&ev, Round::First, false, table()) {
            Verdict::Failure { reason, detail } => {
                assert_eq!(reason, ReasonCode::ErrUnknown);
                assert!(detail.contains("no decisive evidence"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_finalize_transient_signal_wins_over_end_state() {
        // Success wording decides even with the response control filled
        let mut ev = evidence("送信完了しました", "https://example.co.jp/contact");
        ev.response_control_value = Some("残存テキスト".to_string());
        assert!(matches!(
            finalize(&ev, Round::First, false, table()),
            Verdict::Success { .. }
        ));
    }

    #[test]
    fn test_empty_response_control_not_failure() {
        // A cleared textarea after an AJAX send must not read as stuck
        let mut ev = evidence("", "https://example.co.jp/contact");
        ev.response_control_value = Some(String::new());
        ev.form_ui_present = true;
        match finalize(&ev, Round::First, false, table()) {
            Verdict::Failure { detail, .. } => assert!(detail.contains("no decisive evidence")),
            other => panic!("expected conservative failure, got {other:?}"),
        }
    }
}
