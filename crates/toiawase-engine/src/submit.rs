//! Submission trigger: choosing and activating the submit control.
//!
//! The chooser is pure over a clickable snapshot. It restricts itself to
//! the most input-dense form when one is identifiable, walks keyword tiers
//! from strongest to weakest evidence, and applies the exclusion list at
//! every tier so a "検索" button never wins just because it is the only
//! `type=submit` on the page.

use crate::error::Result;
use toiawase_browser::{ClickableMeta, ClickableScan, ScopeRef, Session, PICK_MARKER_SELECTOR};
use toiawase_core::keywords::{contains_any, KeywordTable};
use tracing::{debug, warn};

/// Which submission round the chooser is serving.
///
/// The initial round prefers confirmation-step wording and picks the first
/// match in document order. The confirm round prefers final-send wording
/// and picks the last match, where send buttons sit on Japanese
/// confirmation pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initial,
    Confirm,
}

/// The evidence tier that produced a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTier {
    /// Visible text keyword
    Text,
    /// value/alt attribute keyword
    Attribute,
    /// Anchor href hint
    Href,
    /// Generic submit-typed control
    TypeSubmit,
}

/// A chosen submit control, addressed into the clickable registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitChoice {
    pub index: usize,
    pub tier: SubmitTier,
    /// Wording of the chosen control, for logs and outcome detail
    pub description: String,
}

/// Choose the submit control for a stage, or `None` when nothing on the
/// page qualifies.
#[must_use]
pub fn choose_submit(
    scan: &ClickableScan,
    table: &KeywordTable,
    stage: Stage,
) -> Option<SubmitChoice> {
    if let Some(form_index) = densest_form(&scan.form_counts) {
        let pool: Vec<&ClickableMeta> = scan
            .items
            .iter()
            .filter(|c| c.form_index == form_index as i64)
            .collect();
        if let Some(choice) = choose_from(&pool, table, stage) {
            return Some(choice);
        }
    }
    let pool: Vec<&ClickableMeta> = scan.items.iter().collect();
    choose_from(&pool, table, stage)
}

/// The form with the most non-hidden controls; ties go to the earlier
/// form. `None` when no form has any.
#[must_use]
pub fn densest_form(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        if best.map_or(true, |(_, so_far)| count > so_far) {
            best = Some((index, count));
        }
    }
    best.map(|(index, _)| index)
}

fn choose_from(
    pool: &[&ClickableMeta],
    table: &KeywordTable,
    stage: Stage,
) -> Option<SubmitChoice> {
    let submit = &table.submit;
    let lists: [&Vec<String>; 2] = match stage {
        Stage::Initial => [&submit.confirm, &submit.send],
        Stage::Confirm => [&submit.send, &submit.confirm],
    };
    let eligible: Vec<&ClickableMeta> = pool
        .iter()
        .copied()
        .filter(|c| c.visible && c.enabled && !excluded(c, &submit.exclude))
        .collect();

    for keywords in lists {
        if let Some(meta) = pick(&eligible, stage, |c| {
            contains_any(&c.text.to_lowercase(), keywords)
        }) {
            return Some(choice(meta, SubmitTier::Text));
        }
    }
    for keywords in lists {
        if let Some(meta) = pick(&eligible, stage, |c| {
            contains_any(&format!("{} {}", c.value, c.alt).to_lowercase(), keywords)
        }) {
            return Some(choice(meta, SubmitTier::Attribute));
        }
    }
    if let Some(meta) = pick(&eligible, stage, |c| {
        !c.href.is_empty() && contains_any(&c.href.to_lowercase(), &submit.href)
    }) {
        return Some(choice(meta, SubmitTier::Href));
    }
    if let Some(meta) = pick(&eligible, stage, is_generic_submit) {
        return Some(choice(meta, SubmitTier::TypeSubmit));
    }
    None
}

fn excluded(meta: &ClickableMeta, exclude: &[String]) -> bool {
    let key = format!("{} {} {} {}", meta.text, meta.value, meta.alt, meta.href).to_lowercase();
    contains_any(&key, exclude)
}

fn is_generic_submit(meta: &ClickableMeta) -> bool {
    (meta.tag == "input" && matches!(meta.input_type.as_str(), "submit" | "image"))
        || (meta.tag == "button" && matches!(meta.input_type.as_str(), "" | "submit"))
}

fn pick<'a>(
    pool: &[&'a ClickableMeta],
    stage: Stage,
    predicate: impl Fn(&ClickableMeta) -> bool,
) -> Option<&'a ClickableMeta> {
    match stage {
        Stage::Initial => pool.iter().copied().find(|c| predicate(c)),
        Stage::Confirm => pool.iter().copied().filter(|c| predicate(c)).last(),
    }
}

fn choice(meta: &ClickableMeta, tier: SubmitTier) -> SubmitChoice {
    let description = [&meta.text, &meta.value, &meta.alt, &meta.href]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_default();
    SubmitChoice {
        index: meta.index,
        tier,
        description,
    }
}

/// Activate a chosen control. In the main document a trusted input click
/// runs first; a script-dispatched click is the one retry. Frame scopes
/// only get the script click, since selector lookups do not descend into
/// frames.
pub async fn press(session: &Session, scope: ScopeRef, choice: &SubmitChoice) -> Result<bool> {
    debug!(index = choice.index, tier = ?choice.tier, text = %choice.description, "pressing submit");
    let dom = session.scope(scope);
    if scope == ScopeRef::Main && dom.mark_clickable(choice.index).await? {
        match session.click_selector(PICK_MARKER_SELECTOR).await {
            Ok(()) => return Ok(true),
            Err(err) => {
                warn!(error = %err, "trusted click failed, retrying with script dispatch");
            }
        }
    }
    Ok(dom.click_clickable(choice.index).await?)
}

/// Native submission for forms without a recognizable button:
/// `requestSubmit()` when the browser provides it, `submit()` otherwise.
pub async fn submit_natively(session: &Session, scope: ScopeRef, form_index: i64) -> Result<bool> {
    if form_index < 0 {
        return Ok(false);
    }
    let dom = session.scope(scope);
    #[allow(clippy::cast_sign_loss)]
    Ok(dom.submit_form(form_index as usize).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clickable(index: usize, tag: &str, input_type: &str, text: &str) -> ClickableMeta {
        ClickableMeta {
            index,
            tag: tag.to_string(),
            input_type: input_type.to_string(),
            text: text.to_string(),
            value: String::new(),
            alt: String::new(),
            href: String::new(),
            visible: true,
            enabled: true,
            form_index: 0,
        }
    }

    fn scan_of(items: Vec<ClickableMeta>) -> ClickableScan {
        ClickableScan {
            form_counts: vec![3],
            items,
        }
    }

    #[test]
    fn test_text_keyword_match() {
        let scan = scan_of(vec![
            clickable(0, "a", "", "トップへ戻る"),
            clickable(1, "button", "submit", "送信する"),
        ]);
        let choice = choose_submit(&scan, KeywordTable::builtin(), Stage::Initial)
            .expect("send button chosen");
        assert_eq!(choice.index, 1);
        assert_eq!(choice.tier, SubmitTier::Text);
        assert_eq!(choice.description, "送信する");
    }

    #[test]
    fn test_exclusion_beats_keyword_at_every_tier() {
        // 検索 excludes even though the control is submit-typed
        let scan = scan_of(vec![clickable(0, "input", "submit", "検索")]);
        assert!(choose_submit(&scan, KeywordTable::builtin(), Stage::Initial).is_none());

        let mut reset = clickable(0, "input", "submit", "");
        reset.value = "リセット".to_string();
        assert!(
            choose_submit(&scan_of(vec![reset]), KeywordTable::builtin(), Stage::Initial)
                .is_none()
        );
    }

    #[test]
    fn test_initial_stage_prefers_confirm_wording() {
        let scan = scan_of(vec![
            clickable(0, "button", "submit", "送信"),
            clickable(1, "button", "submit", "確認画面へ進む"),
        ]);
        let choice = choose_submit(&scan, KeywordTable::builtin(), Stage::Initial)
            .expect("confirm button chosen");
        assert_eq!(choice.index, 1);
    }

    #[test]
    fn test_confirm_stage_prefers_send_and_last_match() {
        let scan = scan_of(vec![
            clickable(0, "button", "", "修正する"),
            clickable(1, "button", "submit", "送信"),
            clickable(2, "button", "submit", "上記の内容で送信する"),
        ]);
        let choice = choose_submit(&scan, KeywordTable::builtin(), Stage::Confirm)
            .expect("send button chosen");
        // Last matching candidate in document order
        assert_eq!(choice.index, 2);
    }

    #[test]
    fn test_value_attribute_tier() {
        let mut image = clickable(0, "input", "image", "");
        image.alt = "送信ボタン".to_string();
        let choice = choose_submit(&scan_of(vec![image]), KeywordTable::builtin(), Stage::Initial)
            .expect("image input chosen");
        assert_eq!(choice.tier, SubmitTier::Attribute);
    }

    #[test]
    fn test_href_tier() {
        let mut anchor = clickable(0, "a", "", "こちらから");
        anchor.href = "/inquiry/kakunin.php".to_string();
        let choice = choose_submit(&scan_of(vec![anchor]), KeywordTable::builtin(), Stage::Initial)
            .expect("anchor chosen");
        assert_eq!(choice.tier, SubmitTier::Href);
    }

    #[test]
    fn test_generic_submit_fallback() {
        let scan = scan_of(vec![
            clickable(0, "a", "", "会社概要"),
            clickable(1, "button", "submit", "➤"),
        ]);
        let choice = choose_submit(&scan, KeywordTable::builtin(), Stage::Initial)
            .expect("typed control chosen");
        assert_eq!(choice.index, 1);
        assert_eq!(choice.tier, SubmitTier::TypeSubmit);
    }

    #[test]
    fn test_densest_form_restriction() {
        let mut search_submit = clickable(0, "button", "submit", "送信");
        search_submit.form_index = 0;
        let mut inquiry_submit = clickable(1, "button", "submit", "送信");
        inquiry_submit.form_index = 1;
        let scan = ClickableScan {
            form_counts: vec![1, 8],
            items: vec![search_submit, inquiry_submit],
        };
        let choice = choose_submit(&scan, KeywordTable::builtin(), Stage::Initial)
            .expect("dense-form button chosen");
        assert_eq!(choice.index, 1);
    }

    #[test]
    fn test_formless_candidate_used_when_dense_form_has_none() {
        let mut formless = clickable(0, "button", "submit", "送信");
        formless.form_index = -1;
        let scan = ClickableScan {
            form_counts: vec![5],
            items: vec![formless],
        };
        let choice = choose_submit(&scan, KeywordTable::builtin(), Stage::Initial)
            .expect("fallback to whole scope");
        assert_eq!(choice.index, 0);
    }

    #[test]
    fn test_invisible_and_disabled_skipped() {
        let mut hidden = clickable(0, "button", "submit", "送信");
        hidden.visible = false;
        let mut disabled = clickable(1, "button", "submit", "送信");
        disabled.enabled = false;
        assert!(choose_submit(
            &scan_of(vec![hidden, disabled]),
            KeywordTable::builtin(),
            Stage::Initial
        )
        .is_none());
    }

    #[test]
    fn test_densest_form_ties_go_to_earlier() {
        assert_eq!(densest_form(&[2, 2, 1]), Some(0));
        assert_eq!(densest_form(&[0, 0]), None);
        assert_eq!(densest_form(&[]), None);
    }
}
