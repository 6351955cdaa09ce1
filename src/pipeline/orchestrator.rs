//! Per-message pipeline: load state, run one dialogue step, persist, reply,
//! and on completion hand the conversation off for classification, report
//! creation, linking and notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messaging::{GatewayRegistry, OutboundMessage};
use crate::models::enums::{ConversationMode, Platform, UrgencyLevel};
use crate::models::{Classification, ConversationState, Report};
use crate::pipeline::classification::ClassificationEngine;
use crate::pipeline::dialogue::ConversationMachine;
use crate::pipeline::error::PipelineError;
use crate::pipeline::identity::hash_reporter_id;
use crate::pipeline::linking::{CaseLinker, RelatedCase};
use crate::pipeline::notify::Notifier;
use crate::pipeline::oracle::Oracle;
use crate::pipeline::traits::{ConversationStore, NotificationSink, ReportStore};
use crate::pipeline_config::SurveillanceConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub platform: Platform,
    /// Raw platform id. Hashed on entry; only used again to address the reply.
    pub reporter_id: String,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Which way the message went after the dialogue step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Conversation continues.
    Continue,
    /// Conversation completed and was handed off.
    Handoff,
    /// Conversation moved to error.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub conversation_id: Uuid,
    pub route: Route,
    pub mode: ConversationMode,
    pub response: String,
    /// Reply reached the gateway.
    pub delivered: bool,
    pub report_id: Option<Uuid>,
    pub urgency: Option<UrgencyLevel>,
    /// Report written for an earlier, interrupted conversation before this
    /// message was handled.
    pub resumed_report_id: Option<Uuid>,
}

/// Collaborators the pipeline runs against.
pub struct PipelineDeps {
    pub dialogue_oracle: Arc<dyn Oracle>,
    pub classification_oracle: Arc<dyn Oracle>,
    pub conversations: Arc<dyn ConversationStore>,
    pub reports: Arc<dyn ReportStore>,
    pub gateways: Arc<GatewayRegistry>,
    pub sink: Arc<dyn NotificationSink>,
}

pub struct Pipeline {
    deps: PipelineDeps,
    config: SurveillanceConfig,
    reporter_salt: String,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, config: SurveillanceConfig, reporter_salt: &str) -> Self {
        Self {
            deps,
            config,
            reporter_salt: reporter_salt.to_string(),
        }
    }

    pub fn config(&self) -> &SurveillanceConfig {
        &self.config
    }

    /// Handle one inbound message end to end.
    pub fn process(&self, message: &InboundMessage) -> Result<ProcessOutcome, PipelineError> {
        let now = message.timestamp;
        let reporter_hash = hash_reporter_id(&self.reporter_salt, &message.reporter_id);
        let _span = tracing::info_span!(
            "pipeline_step",
            platform = message.platform.as_str(),
            reporter = %reporter_hash,
            conversation_id = tracing::field::Empty,
        )
        .entered();

        let mut resumed_report_id = None;
        let mut state = match self
            .deps
            .conversations
            .load_active(message.platform, &reporter_hash, now)?
        {
            Some(mut interrupted) if interrupted.awaiting_handoff() => {
                tracing::info!(
                    conversation_id = %interrupted.id,
                    "Finishing interrupted handoff before new conversation"
                );
                // A failure stays pending for the sweep; the new message is
                // still answered.
                match self.handoff(&mut interrupted, now) {
                    Ok(report) => resumed_report_id = Some(report.id),
                    Err(e) => tracing::warn!(
                        conversation_id = %interrupted.id,
                        error = %e,
                        "Interrupted handoff failed again, left pending"
                    ),
                }
                ConversationState::new(&reporter_hash, message.platform, now)
            }
            Some(finished) if finished.is_finished() => {
                tracing::debug!(
                    conversation_id = %finished.id,
                    mode = finished.mode.as_str(),
                    "Previous conversation finished, starting fresh"
                );
                ConversationState::new(&reporter_hash, message.platform, now)
            }
            Some(active) => active,
            None => ConversationState::new(&reporter_hash, message.platform, now),
        };
        tracing::Span::current().record("conversation_id", tracing::field::display(state.id));

        state.push_user(&message.text, now);
        let step = ConversationMachine::new(
            self.deps.dialogue_oracle.as_ref(),
            &self.config.dialogue,
            &self.config.field_weights,
        )
        .step(&mut state, now);

        let route = match state.mode {
            ConversationMode::Complete => Route::Handoff,
            ConversationMode::Error => Route::Error,
            _ => Route::Continue,
        };

        self.save(&state, now)?;
        let delivered = self.reply(message, &step.response);

        let mut outcome = ProcessOutcome {
            conversation_id: state.id,
            route,
            mode: state.mode,
            response: step.response,
            delivered,
            report_id: None,
            urgency: None,
            resumed_report_id,
        };

        match route {
            Route::Handoff => {
                let report = self.handoff(&mut state, now)?;
                outcome.report_id = Some(report.id);
                outcome.urgency = Some(report.urgency());
            }
            Route::Error => {
                tracing::warn!(
                    conversation_id = %state.id,
                    error = state.error.as_deref().unwrap_or(""),
                    "Conversation ended in error"
                );
            }
            Route::Continue => {}
        }

        Ok(outcome)
    }

    /// Classify a completed conversation, write its report, mark it consumed,
    /// then link and notify. Safe to repeat: an existing report for the
    /// conversation is reused.
    pub fn handoff(
        &self,
        state: &mut ConversationState,
        now: DateTime<Utc>,
    ) -> Result<Report, PipelineError> {
        let _span = tracing::info_span!("handoff", conversation_id = %state.id).entered();
        let linker = CaseLinker::new(self.deps.reports.as_ref(), &self.config.linking);

        let report = match self.deps.reports.get_report_by_conversation(&state.id)? {
            Some(existing) => {
                tracing::info!(report_id = %existing.id, "Report already exists, reusing");
                existing
            }
            None => self.create_report(state, &linker, now)?,
        };

        state.report_id = Some(report.id);
        state.handoff = None;
        state.classification = Some(report.classification.clone());
        self.save(state, now)?;

        let related = self.related(&linker, &report, self.config.linking.window_days);
        linker.link_report(&report.id, &related, now);
        Notifier::new(
            self.deps.reports.as_ref(),
            self.deps.sink.as_ref(),
            self.config.notification_floor,
        )
        .notify(&report, now);

        Ok(report)
    }

    fn create_report(
        &self,
        state: &ConversationState,
        linker: &CaseLinker<'_>,
        now: DateTime<Utc>,
    ) -> Result<Report, PipelineError> {
        let draft = Report::from_classification(state, Classification::safe_default(), now);
        // Area counts use each disease's own window, which may reach past
        // the linking window. The engine narrows per disease.
        let window_days = self
            .config
            .linking
            .window_days
            .max(self.config.classification.thresholds.longest_window_days());
        let related: Vec<Report> = self
            .related(linker, &draft, window_days)
            .into_iter()
            .map(|r| r.report)
            .collect();

        let outcome = ClassificationEngine::new(
            self.deps.classification_oracle.as_ref(),
            &self.config.classification,
            &self.config.field_weights,
        )
        .classify(&state.extracted, &related, now);

        let report = Report {
            classification: outcome.classification,
            ..draft
        };
        self.deps
            .reports
            .create_report(&report)
            .map_err(|e| {
                tracing::error!(error = %e, "Report creation failed");
                PipelineError::ReportCreation {
                    conversation_id: state.id,
                    reason: e.to_string(),
                }
            })?;

        tracing::info!(
            report_id = %report.id,
            urgency = report.urgency().as_str(),
            alert_type = report.alert_type().as_str(),
            manual_review = report.classification.manual_review,
            "Report created"
        );
        Ok(report)
    }

    /// Related-case lookup. A store failure reads as no related cases.
    fn related(
        &self,
        linker: &CaseLinker<'_>,
        report: &Report,
        window_days: u32,
    ) -> Vec<RelatedCase> {
        let radius_km = self.config.linking.radius_km;
        linker.find_related_within(report, window_days, radius_km).unwrap_or_else(|e| {
            tracing::warn!(report_id = %report.id, error = %e, "Related-case lookup failed");
            Vec::new()
        })
    }

    fn save(&self, state: &ConversationState, now: DateTime<Utc>) -> Result<(), PipelineError> {
        let expires_at = now + self.config.conversation_ttl();
        self.deps.conversations.save(state, expires_at)?;
        Ok(())
    }

    /// Send failures are logged, never fatal.
    fn reply(&self, message: &InboundMessage, text: &str) -> bool {
        let outbound = OutboundMessage {
            platform: message.platform,
            reporter_id: message.reporter_id.clone(),
            text: text.to_string(),
        };
        match self.deps.gateways.send(&outbound) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Reply not delivered");
                false
            }
        }
    }

    /// Finish handoffs left behind by failed report creation, whether or
    /// not the reporter writes again. Returns the number completed; failures
    /// stay pending for the next sweep.
    pub fn retry_pending_handoffs(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let mut completed = 0;
        for mut state in self.deps.conversations.pending_handoffs()? {
            match self.handoff(&mut state, now) {
                Ok(report) => {
                    tracing::info!(
                        conversation_id = %state.id,
                        report_id = %report.id,
                        "Pending handoff completed"
                    );
                    completed += 1;
                }
                Err(e) => tracing::warn!(
                    conversation_id = %state.id,
                    error = %e,
                    "Pending handoff still failing"
                ),
            }
        }
        Ok(completed)
    }

    /// Retry pending handoffs, then drop conversation states past their
    /// expiry. Conversations still awaiting a report are never dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        self.retry_pending_handoffs(now)?;
        let purged = self.deps.conversations.purge_expired(now)?;
        if purged > 0 {
            tracing::info!(purged, "Expired conversations purged");
        }
        Ok(purged)
    }
}
