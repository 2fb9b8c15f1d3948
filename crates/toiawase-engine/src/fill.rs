//! Field mapping: routing profile values into unlabeled form controls.
//!
//! Split into a pure planner and a thin executor. [`plan_fill`] inspects a
//! collected control snapshot and produces a [`FillPlan`] of index-addressed
//! actions; [`apply_fill`] replays the plan through the JS bridge. Keeping
//! the routing pure makes every heuristic testable without a browser.
//!
//! The planner walks a fixed step sequence. Each step only touches controls
//! no earlier step claimed, steps that write profile data skip controls
//! that already hold a value, and each semantic field type is routed into
//! at most one control.

use crate::error::Result;
use std::collections::HashSet;
use toiawase_browser::{ControlMeta, DomScope};
use toiawase_core::keywords::{contains_any, KeywordTable};
use toiawase_core::{FieldType, Profile};
use tracing::{debug, info, warn};

/// Identity of a control that survives registry rebuilds: tag plus the
/// name/id attributes. Used to re-find the response control after
/// submission, when the original index arena is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlIdentity {
    pub tag: String,
    pub name: String,
    pub id: String,
}

impl ControlIdentity {
    fn of(meta: &ControlMeta) -> Self {
        Self {
            tag: meta.tag.clone(),
            name: meta.name.clone(),
            id: meta.id.clone(),
        }
    }

    /// Whether a freshly collected control is the same element.
    #[must_use]
    pub fn matches(&self, meta: &ControlMeta) -> bool {
        self.tag == meta.tag && self.name == meta.name && self.id == meta.id
    }
}

/// What a planned action is for. Carried for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTarget {
    /// The free-text inquiry body
    Response,
    /// A classified profile field
    Field(FieldType),
    /// Re-entry twin mirroring an email/tel value
    ConfirmMirror(FieldType),
    /// One segment of a split tel/postal group
    SplitSegment(FieldType),
    /// Select driven to an option
    SelectOption,
    /// First option of an untouched radio group
    RadioDefault,
    /// Agreement checkbox
    Consent,
    /// Neutral placeholder for a leftover required-looking control
    Placeholder,
}

/// One mutation against a collected control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOp {
    Write(String),
    Select(usize),
    Check(bool),
}

/// An index-addressed action in a fill plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub index: usize,
    pub op: FillOp,
    pub target: FillTarget,
}

/// The full set of mutations for one form, plus the response control
/// identity the classifier needs later.
#[derive(Debug, Clone, Default)]
pub struct FillPlan {
    pub actions: Vec<PlannedAction>,
    pub response_control: Option<ControlIdentity>,
    pub response_form_index: i64,
}

impl FillPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome of replaying a plan.
#[derive(Debug, Clone)]
pub struct FillReport {
    pub applied: usize,
    pub failed: usize,
    pub response_control: Option<ControlIdentity>,
}

/// Plan the mutations that route `profile` into `controls`.
///
/// Steps, in order: response control, label classification, name-attribute
/// classification, confirmation mirroring, selects, radios, consent
/// checkboxes, split tel/postal groups, neutral placeholders. Controls
/// that are invisible, disabled, or already hold a value are never
/// overwritten.
#[must_use]
pub fn plan_fill(
    controls: &[ControlMeta],
    profile: &Profile,
    table: &KeywordTable,
    fallback_placeholder: &str,
) -> FillPlan {
    let mut plan = FillPlan {
        response_form_index: -1,
        ..FillPlan::default()
    };
    let mut assigned: HashSet<usize> = HashSet::new();
    let mut used: HashSet<FieldType> = HashSet::new();

    // Split groups are detected up front so the single-field steps leave
    // their members alone.
    let split_groups = detect_split_groups(controls, table);
    let reserved: HashSet<usize> = split_groups
        .iter()
        .flat_map(|group| group.members.iter().copied())
        .collect();

    plan_response(&mut plan, &mut assigned, controls, profile, table);

    // Label pass, then name/id pass over what the labels missed
    for by_label in [true, false] {
        for meta in controls {
            if assigned.contains(&meta.index) || reserved.contains(&meta.index) {
                continue;
            }
            if !meta.fillable() || !meta.is_text_entry() || !meta.value.trim().is_empty() {
                continue;
            }
            let key = match_key(meta);
            if contains_any(&key, &table.confirm_mirror.markers) {
                // Deferred to the mirroring step
                continue;
            }
            let text = if by_label {
                meta.label.to_lowercase()
            } else {
                meta.name_id()
            };
            if text.trim().is_empty() {
                continue;
            }
            let Some(field) = table.classify_text(&text) else {
                continue;
            };
            if used.contains(&field) || table.deny_violated(field, &key) {
                continue;
            }
            let Some(value) = profile.attribute(field) else {
                continue;
            };
            assigned.insert(meta.index);
            used.insert(field);
            plan.actions.push(PlannedAction {
                index: meta.index,
                op: FillOp::Write(value.to_string()),
                target: FillTarget::Field(field),
            });
        }
    }

    plan_confirm_mirrors(&mut plan, &mut assigned, controls, profile, table);
    plan_selects(&mut plan, &mut assigned, controls, profile);
    plan_radios(&mut plan, &mut assigned, controls);
    plan_consent(&mut plan, &mut assigned, controls, table);
    plan_splits(&mut plan, &mut assigned, &mut used, &split_groups, controls, profile);
    plan_placeholders(&mut plan, &assigned, controls, fallback_placeholder);

    plan
}

/// Lowercased name/id/label key every vocabulary match runs against.
fn match_key(meta: &ControlMeta) -> String {
    format!("{} {}", meta.name_id(), meta.label.to_lowercase())
}

fn plan_response(
    plan: &mut FillPlan,
    assigned: &mut HashSet<usize>,
    controls: &[ControlMeta],
    profile: &Profile,
    table: &KeywordTable,
) {
    let by_keyword = |meta: &&ControlMeta| {
        meta.fillable()
            && contains_any(&meta.name_id(), &table.response.name_keywords)
    };

    // Keyword-named textarea, then any visible textarea, then a
    // keyword-named text input for forms without one
    let response = controls
        .iter()
        .filter(|c| c.is_textarea())
        .find(by_keyword)
        .or_else(|| controls.iter().find(|c| c.is_textarea() && c.fillable()))
        .or_else(|| controls.iter().filter(|c| c.is_text_input()).find(by_keyword));

    let Some(meta) = response else {
        return;
    };

    plan.response_control = Some(ControlIdentity::of(meta));
    plan.response_form_index = meta.form_index;

    if meta.value.trim().is_empty() {
        let message = if profile.message.trim().is_empty() {
            table.response.placeholder_message.as_str()
        } else {
            profile.message.as_str()
        };
        assigned.insert(meta.index);
        plan.actions.push(PlannedAction {
            index: meta.index,
            op: FillOp::Write(message.to_string()),
            target: FillTarget::Response,
        });
    }
}

fn plan_confirm_mirrors(
    plan: &mut FillPlan,
    assigned: &mut HashSet<usize>,
    controls: &[ControlMeta],
    profile: &Profile,
    table: &KeywordTable,
) {
    for meta in controls {
        if assigned.contains(&meta.index) {
            continue;
        }
        if !meta.fillable() || !meta.is_text_entry() || !meta.value.trim().is_empty() {
            continue;
        }
        let key = match_key(meta);
        if !contains_any(&key, &table.confirm_mirror.markers) {
            continue;
        }
        let mirrored = [FieldType::Email, FieldType::Tel].into_iter().find(|field| {
            table
                .entry(*field)
                .is_some_and(|entry| contains_any(&key, &entry.keywords))
        });
        let Some(field) = mirrored else {
            continue;
        };
        let Some(value) = profile.attribute(field) else {
            continue;
        };
        assigned.insert(meta.index);
        plan.actions.push(PlannedAction {
            index: meta.index,
            op: FillOp::Write(value.to_string()),
            target: FillTarget::ConfirmMirror(field),
        });
    }
}

fn plan_selects(
    plan: &mut FillPlan,
    assigned: &mut HashSet<usize>,
    controls: &[ControlMeta],
    profile: &Profile,
) {
    let prefecture = profile.attribute(FieldType::Prefecture);
    for meta in controls {
        if assigned.contains(&meta.index) || !meta.fillable() || !meta.is_select() {
            continue;
        }
        if meta.options.len() < 2 {
            continue;
        }
        let exact = prefecture.and_then(|wanted| {
            meta.options
                .iter()
                .position(|option| option.trim() == wanted)
        });
        // Last option as the fallback: leading options are usually
        // "選択してください" placeholders
        let option = exact.unwrap_or(meta.options.len() - 1);
        assigned.insert(meta.index);
        plan.actions.push(PlannedAction {
            index: meta.index,
            op: FillOp::Select(option),
            target: FillTarget::SelectOption,
        });
    }
}

fn plan_radios(plan: &mut FillPlan, assigned: &mut HashSet<usize>, controls: &[ControlMeta]) {
    let mut settled: HashSet<(i64, String)> = controls
        .iter()
        .filter(|c| c.is_radio() && c.checked)
        .map(|c| (c.form_index, c.name.clone()))
        .collect();

    for meta in controls {
        if !meta.is_radio() || !meta.fillable() {
            continue;
        }
        let group = (meta.form_index, meta.name.clone());
        if settled.contains(&group) {
            continue;
        }
        settled.insert(group);
        assigned.insert(meta.index);
        plan.actions.push(PlannedAction {
            index: meta.index,
            op: FillOp::Check(true),
            target: FillTarget::RadioDefault,
        });
    }
}

fn plan_consent(
    plan: &mut FillPlan,
    assigned: &mut HashSet<usize>,
    controls: &[ControlMeta],
    table: &KeywordTable,
) {
    for meta in controls {
        if assigned.contains(&meta.index) {
            continue;
        }
        if !meta.is_checkbox() || !meta.fillable() || meta.checked {
            continue;
        }
        if !contains_any(&match_key(meta), &table.consent.keywords) {
            continue;
        }
        assigned.insert(meta.index);
        plan.actions.push(PlannedAction {
            index: meta.index,
            op: FillOp::Check(true),
            target: FillTarget::Consent,
        });
    }
}

struct SplitGroup {
    field: FieldType,
    members: Vec<usize>,
}

/// Detect runs of 2-4 sibling inputs sharing a tel or postal vocabulary
/// (tel1/tel2/tel3, zip1/zip2). Their members are reserved so the
/// single-field steps pass over them.
fn detect_split_groups(controls: &[ControlMeta], table: &KeywordTable) -> Vec<SplitGroup> {
    let mut groups = Vec::new();
    for field in [FieldType::Tel, FieldType::PostalCode] {
        let Some(entry) = table.entry(field) else {
            continue;
        };
        let members: Vec<usize> = controls
            .iter()
            .filter(|c| {
                c.fillable()
                    && c.is_text_input()
                    && c.value.trim().is_empty()
                    && contains_any(&match_key(c), &entry.keywords)
                    && !table.deny_violated(field, &match_key(c))
            })
            .map(|c| c.index)
            .collect();

        // Sibling inputs sit next to each other in the control snapshot;
        // allow one interleaved control for hidden companions
        let mut run: Vec<usize> = Vec::new();
        for index in members {
            match run.last() {
                Some(&last) if index - last <= 2 => run.push(index),
                Some(_) => {
                    if run.len() >= 2 {
                        break;
                    }
                    run = vec![index];
                }
                None => run.push(index),
            }
        }
        if (2..=4).contains(&run.len()) {
            groups.push(SplitGroup {
                field,
                members: run,
            });
        }
    }
    groups
}

fn plan_splits(
    plan: &mut FillPlan,
    assigned: &mut HashSet<usize>,
    used: &mut HashSet<FieldType>,
    groups: &[SplitGroup],
    controls: &[ControlMeta],
    profile: &Profile,
) {
    for group in groups {
        if used.contains(&group.field) {
            continue;
        }
        let Some(value) = profile.attribute(group.field) else {
            continue;
        };
        let Some(segments) = split_digit_value(value, group.members.len()) else {
            continue;
        };
        // maxlength of the first member, when declared, sanity-checks the
        // segmentation against the form's own expectation
        if let Some(first) = controls.iter().find(|c| c.index == group.members[0]) {
            if first.max_length > 0 && segments[0].len() > first.max_length as usize {
                continue;
            }
        }
        used.insert(group.field);
        for (index, segment) in group.members.iter().zip(segments) {
            assigned.insert(*index);
            plan.actions.push(PlannedAction {
                index: *index,
                op: FillOp::Write(segment),
                target: FillTarget::SplitSegment(group.field),
            });
        }
    }
}

/// Split a tel/postal value into `parts` digit segments, left to right.
///
/// When the value's own digit runs (split on hyphens and the like) already
/// match the part count they are used as-is; otherwise the digits are
/// re-segmented along Japanese conventions (3+4 postal, trailing 4+4 tel
/// blocks).
#[must_use]
pub fn split_digit_value(value: &str, parts: usize) -> Option<Vec<String>> {
    let runs: Vec<String> = value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(str::to_string)
        .collect();
    if runs.len() == parts {
        return Some(runs);
    }

    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let len = digits.len();
    let cuts: Vec<usize> = match parts {
        2 if len == 7 => vec![3],
        2 if len > 4 => vec![len - 4],
        3 if len > 8 => vec![len - 8, len - 4],
        _ => {
            if parts == 0 || len < parts {
                return None;
            }
            even_cuts(len, parts)
        }
    };

    let mut segments = Vec::with_capacity(parts);
    let mut start = 0;
    for cut in cuts.iter().chain(std::iter::once(&len)) {
        segments.push(digits[start..*cut].to_string());
        start = *cut;
    }
    Some(segments)
}

fn even_cuts(len: usize, parts: usize) -> Vec<usize> {
    let base = len / parts;
    let remainder = len % parts;
    let mut cuts = Vec::with_capacity(parts - 1);
    let mut position = 0;
    for part in 0..parts - 1 {
        position += base + usize::from(part < remainder);
        cuts.push(position);
    }
    cuts
}

fn plan_placeholders(
    plan: &mut FillPlan,
    assigned: &HashSet<usize>,
    controls: &[ControlMeta],
    fallback_placeholder: &str,
) {
    if fallback_placeholder.is_empty() {
        return;
    }
    let mut extra = Vec::new();
    for meta in controls {
        if assigned.contains(&meta.index) {
            continue;
        }
        if !meta.fillable() || !meta.is_text_entry() || !meta.value.trim().is_empty() {
            continue;
        }
        // Stay inside the form being submitted; a bare placeholder in a
        // site-search box would fire an unrelated request
        let in_scope = if plan.response_control.is_some() {
            meta.form_index == plan.response_form_index
        } else {
            meta.form_index >= 0
        };
        if !in_scope {
            continue;
        }
        if match_key(meta).contains("captcha") {
            continue;
        }
        extra.push(PlannedAction {
            index: meta.index,
            op: FillOp::Write(fallback_placeholder.to_string()),
            target: FillTarget::Placeholder,
        });
    }
    plan.actions.extend(extra);
}

/// Replay a plan through the JS bridge. Individual misses (a control gone
/// from the registry, a rejected option index) are counted, never fatal.
pub async fn apply_fill(scope: &DomScope<'_>, plan: &FillPlan) -> Result<FillReport> {
    let mut applied = 0;
    let mut failed = 0;
    for action in &plan.actions {
        let ok = match &action.op {
            FillOp::Write(value) => scope.write_value(action.index, value).await?,
            FillOp::Select(option) => scope.select_index(action.index, *option).await?,
            FillOp::Check(want) => scope.set_checked(action.index, *want).await?,
        };
        if ok {
            applied += 1;
            debug!(index = action.index, target = ?action.target, "filled control");
        } else {
            failed += 1;
            warn!(index = action.index, target = ?action.target, "control rejected fill");
        }
    }
    info!(applied, failed, "fill pass complete");
    Ok(FillReport {
        applied,
        failed,
        response_control: plan.response_control.clone(),
    })
}
