//! Per-target pipeline orchestration.
//!
//! [`Runner`] drives one target end to end: navigate, scan for refusal
//! wording, locate the inquiry form (hopping through contact links when
//! the landing page has none), fill, clear challenges, press submit, and
//! classify the result. Heuristic misses become outcome reason codes;
//! only driver-level escapes surface as errors, which the batch loop
//! converts to `ERR_EXCEPTION` outcomes so one broken target never stops
//! the run.

use crate::captcha::{self, AutoGate, ChallengeGate, StdinGate};
use crate::classify::{self, PollSettings, Round, Verdict};
use crate::discovery::{self, TraversalState};
use crate::error::Result;
use crate::fill;
use crate::ocr::OcrClient;
use crate::resolver;
use crate::submit::{self, Stage};
use std::time::Duration;
use toiawase_browser::{BrowserEngine, ScopeRef, Session};
use toiawase_core::config::RunConfig;
use toiawase_core::keywords::{find_match, KeywordTable};
use toiawase_core::{Outcome, Profile, ReasonCode, RunSummary, Target};
use tracing::{debug, info, warn};

/// Bytes of landing-page text scanned for refusal wording.
const REFUSAL_SCAN_LIMIT: usize = 20_000;

/// Grace period for a full-page navigation after a submit press.
const POST_PRESS_NAV_WAIT: Duration = Duration::from_secs(5);

/// Pipeline tuning, lifted out of [`RunConfig`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Settle delay applied after a post-press navigation lands
    pub settle_delay_ms: u64,
    /// Evidence polling window and cadence
    pub evidence_poll: PollSettings,
    /// Contact link candidates tried per traversal
    pub candidate_cap: usize,
    /// Neutral text for the fallback fill pass
    pub fallback_placeholder: String,
    /// Pause on interactive challenges for manual resolution
    pub attended: bool,
}

impl From<&RunConfig> for RunnerConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            settle_delay_ms: run.settle_delay_ms,
            evidence_poll: PollSettings {
                timeout: Duration::from_secs(run.evidence_poll_timeout_secs),
                interval: Duration::from_millis(run.evidence_poll_interval_ms),
            },
            candidate_cap: run.candidate_cap,
            fallback_placeholder: run.fallback_placeholder.clone(),
            attended: run.attended,
        }
    }
}

enum Located {
    Scope(ScopeRef),
    NoCandidates,
    Exhausted,
}

/// Drives targets through the full inquiry pipeline.
pub struct Runner {
    table: KeywordTable,
    config: RunnerConfig,
    ocr: Box<dyn OcrClient>,
    gate: Box<dyn ChallengeGate>,
}

impl Runner {
    /// Build a runner. Attended runs gate interactive challenges on the
    /// operator; unattended runs log them and push on.
    #[must_use]
    pub fn new(table: KeywordTable, config: RunnerConfig, ocr: Box<dyn OcrClient>) -> Self {
        let gate: Box<dyn ChallengeGate> = if config.attended {
            Box::new(StdinGate)
        } else {
            Box::new(AutoGate)
        };
        Self {
            table,
            config,
            ocr,
            gate,
        }
    }

    /// Process every target in order, one page at a time.
    ///
    /// Each target records exactly one [`Outcome`]. A target whose
    /// processing escapes with a driver error records `ERR_EXCEPTION`,
    /// and the batch continues on a fresh page.
    pub async fn run_batch(
        &self,
        engine: &BrowserEngine,
        targets: &[Target],
        profile: &Profile,
    ) -> Result<RunSummary> {
        let profile = profile.clone().with_resolved_message();
        let mut summary = RunSummary::new();
        let mut session = engine.new_session().await?;

        for (position, target) in targets.iter().enumerate() {
            info!(
                target = %target,
                position = position + 1,
                total = targets.len(),
                "Processing target"
            );
            let outcome = match self.process_target(&session, target, &profile).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(target = %target, error = %err, "Target escaped with an error");
                    // A wedged page would poison later targets; retire it
                    // and continue on a fresh one.
                    match engine.new_session().await {
                        Ok(fresh) => {
                            let stale = std::mem::replace(&mut session, fresh);
                            if let Err(close_err) = stale.close().await {
                                debug!(error = %close_err, "Stale page close failed");
                            }
                        }
                        Err(open_err) => {
                            warn!(error = %open_err, "Could not open a fresh page")
                        }
                    }
                    Outcome::new(target, ReasonCode::ErrException, err.to_string(), "")
                }
            };
            info!(
                company = %outcome.company,
                reason = %outcome.reason,
                detail = %outcome.detail,
                "Target finished"
            );
            summary.record(outcome);
        }

        info!(
            processed = summary.processed(),
            succeeded = summary.succeeded(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Batch finished"
        );
        Ok(summary)
    }

    async fn process_target(
        &self,
        session: &Session,
        target: &Target,
        profile: &Profile,
    ) -> Result<Outcome> {
        session.navigate(&target.url).await?;

        let body = session.body_text(REFUSAL_SCAN_LIMIT).await?.to_lowercase();
        if let Some(matched) = find_match(&body, &self.table.refusal.keywords) {
            let url = session.current_url().await?;
            return Ok(Outcome::new(
                target,
                ReasonCode::SkipRefusal,
                format!("refusal wording ({matched})"),
                url,
            ));
        }

        let scope = match self.locate_form(session).await? {
            Located::Scope(scope) => scope,
            Located::NoCandidates => {
                let url = session.current_url().await?;
                return Ok(Outcome::new(
                    target,
                    ReasonCode::ErrNoForm,
                    "no form and no contact links on the landing page",
                    url,
                ));
            }
            Located::Exhausted => {
                let url = session.current_url().await?;
                return Ok(Outcome::new(
                    target,
                    ReasonCode::ErrContactPageNoForm,
                    "contact pages reached but none carried a form",
                    url,
                ));
            }
        };
        info!(scope = %scope, "Inquiry form located");

        // confirm() guards wired to submit handlers stall the pipeline
        // unless answered up front.
        session.suppress_dialogs_now().await?;

        let dom = session.scope(scope);
        let controls = dom.collect_controls().await?;
        let plan = fill::plan_fill(
            &controls,
            profile,
            &self.table,
            &self.config.fallback_placeholder,
        );
        let report = fill::apply_fill(&dom, &plan).await?;

        let challenges = captcha::resolve_challenges(
            session,
            scope,
            self.ocr.as_ref(),
            self.gate.as_ref(),
        )
        .await;
        debug!(
            image_answered = challenges.image_answered,
            interactive = challenges.interactive_detected,
            "challenge pass finished"
        );

        let pre_submit_url = session.current_url().await?;
        let scan = dom.collect_clickables().await?;
        let pressed = match submit::choose_submit(&scan, &self.table, Stage::Initial) {
            Some(choice) => submit::press(session, scope, &choice).await?,
            None => {
                let form_index = if plan.response_form_index >= 0 {
                    plan.response_form_index
                } else {
                    submit::densest_form(&scan.form_counts).map_or(-1, |index| index as i64)
                };
                submit::submit_natively(session, scope, form_index).await?
            }
        };
        if !pressed {
            return Ok(Outcome::new(
                target,
                ReasonCode::ErrNoSubmit,
                "no activatable submit control",
                pre_submit_url,
            ));
        }

        self.await_transition(session, &pre_submit_url).await;

        let response = report.response_control.as_ref();
        let mut verdict = classify::decide(
            session,
            scope,
            response,
            &self.table,
            Round::First,
            &self.config.evidence_poll,
            &pre_submit_url,
        )
        .await?;

        if verdict == Verdict::NeedsConfirm {
            info!("Confirmation page detected; pressing through");
            let confirm_url = session.current_url().await?;
            let scan = dom.collect_clickables().await?;
            let Some(choice) = submit::choose_submit(&scan, &self.table, Stage::Confirm) else {
                return Ok(Outcome::new(
                    target,
                    ReasonCode::ErrNoSubmit,
                    "no submit control on the confirmation page",
                    confirm_url,
                ));
            };
            if !submit::press(session, scope, &choice).await? {
                return Ok(Outcome::new(
                    target,
                    ReasonCode::ErrNoSubmit,
                    "confirmation press did not activate",
                    confirm_url,
                ));
            }
            self.await_transition(session, &confirm_url).await;
            verdict = classify::decide(
                session,
                scope,
                response,
                &self.table,
                Round::AfterConfirm,
                &self.config.evidence_poll,
                &confirm_url,
            )
            .await?;
        }

        let final_url = match session.current_url().await {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "Could not read the final URL");
                String::new()
            }
        };
        let (reason, detail) = match verdict {
            Verdict::Success { reason, detail } | Verdict::Failure { reason, detail } => {
                (reason, detail)
            }
            // The confirm round cannot ask for another confirmation, and
            // the poll loop never surfaces Pending.
            Verdict::NeedsConfirm | Verdict::Pending => (
                ReasonCode::ErrUnknown,
                "classification did not settle".to_string(),
            ),
        };
        Ok(Outcome::new(target, reason, detail, final_url))
    }

    /// Find the inquiry form, following contact link candidates when the
    /// landing page carries none.
    async fn locate_form(&self, session: &Session) -> Result<Located> {
        if let Some(scope) = resolver::resolve(session).await? {
            return Ok(Located::Scope(scope));
        }

        let origin_url = session.current_url().await?;
        let anchors = session.scope(ScopeRef::Main).collect_anchors().await?;
        let candidates = discovery::find_contact_links(&anchors, &origin_url, &self.table);
        let mut traversal = TraversalState::new(&origin_url, candidates, self.config.candidate_cap);
        if !traversal.had_candidates() {
            return Ok(Located::NoCandidates);
        }

        while let Some(hop) = traversal.next_hop() {
            if hop.via_origin {
                // Retried candidates run from the origin page so SPA
                // navigation state from earlier hops cannot leak in.
                if let Err(err) = session.navigate(traversal.origin_url()).await {
                    warn!(error = %err, "Return to the origin page failed");
                }
            }
            debug!(url = %hop.url, via_origin = hop.via_origin, "Following contact link");
            if let Err(err) = session.navigate(&hop.url).await {
                warn!(url = %hop.url, error = %err, "Contact link navigation failed");
                continue;
            }
            traversal.record_visit(&session.current_url().await?);

            if let Some(scope) = resolver::resolve(session).await? {
                return Ok(Located::Scope(scope));
            }
            let here = session.current_url().await?;
            let anchors = session.scope(ScopeRef::Main).collect_anchors().await?;
            traversal.offer_page_links(discovery::find_contact_links(&anchors, &here, &self.table));
        }

        Ok(Located::Exhausted)
    }

    /// Give a full-page navigation a chance to land before evidence
    /// polling starts; AJAX submissions fall through unchanged.
    async fn await_transition(&self, session: &Session, previous_url: &str) {
        match session
            .wait_for_url_change(previous_url, POST_PRESS_NAV_WAIT)
            .await
        {
            Ok(true) => session.wait_millis(self.config.settle_delay_ms).await,
            Ok(false) => {}
            Err(err) => warn!(error = %err, "URL-change wait failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_config_from_run_config() {
        let run = RunConfig::default();
        let config = RunnerConfig::from(&run);
        assert_eq!(config.settle_delay_ms, 1000);
        assert_eq!(config.evidence_poll.timeout, Duration::from_secs(25));
        assert_eq!(config.evidence_poll.interval, Duration::from_millis(1000));
        assert_eq!(config.candidate_cap, 10);
        assert_eq!(config.fallback_placeholder, "-");
        assert!(!config.attended);
    }
}
