use chrono::{DateTime, Utc};

use super::prompt::{apology, build_dialogue_prompt};
use super::reply::DialogueReply;
use crate::models::enums::{ConversationMode, HandoffTarget, Language};
use crate::models::ConversationState;
use crate::pipeline::extraction::{completeness_score, detect_language, merge, missing_fields};
use crate::pipeline::oracle::{
    parse_oracle_response, Fields, Oracle, OracleMessage, OracleRequest, ParsedPayload,
};
use crate::pipeline_config::{DialogueConfig, FieldWeights};

/// What one dialogue step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// Structured reply applied.
    Replied,
    /// Oracle answered with prose only; used as the reply, state untouched.
    Degraded,
    /// Oracle failed; apology sent, mode kept.
    OracleFailed { kind: String },
    /// Too many consecutive failures; conversation moved to error.
    Errored { kind: String },
    /// Step invoked on a terminal conversation; nothing changed.
    IllegalState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub response: String,
    pub from: ConversationMode,
    pub to: ConversationMode,
    /// Oracle-proposed target the legality rules refused.
    pub rejected: Option<ConversationMode>,
    pub completeness: f64,
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn transitioned(&self) -> bool {
        self.from != self.to
    }
}

/// Result of checking a proposed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDecision {
    pub target: ConversationMode,
    pub rejected: Option<ConversationMode>,
}

/// Drives one conversation step per inbound message.
pub struct ConversationMachine<'a> {
    oracle: &'a dyn Oracle,
    config: &'a DialogueConfig,
    weights: &'a FieldWeights,
}

impl<'a> ConversationMachine<'a> {
    pub fn new(oracle: &'a dyn Oracle, config: &'a DialogueConfig, weights: &'a FieldWeights) -> Self {
        Self {
            oracle,
            config,
            weights,
        }
    }

    /// Process the latest user message already appended to `state`.
    pub fn step(&self, state: &mut ConversationState, now: DateTime<Utc>) -> StepOutcome {
        let _span = tracing::info_span!(
            "dialogue_step",
            conversation_id = %state.id,
            mode = state.mode.as_str(),
            turn = state.turn_count + 1,
        )
        .entered();

        let from = state.mode;
        state.turn_count += 1;
        state.updated_at = now;

        if from.is_terminal() {
            tracing::warn!(mode = from.as_str(), "Dialogue step on terminal conversation ignored");
            return StepOutcome {
                response: apology(self.reply_language(state)).to_string(),
                from,
                to: from,
                rejected: None,
                completeness: completeness_score(&state.extracted, self.weights),
                status: StepStatus::IllegalState,
            };
        }

        if state.language == Language::Unknown {
            if let Some(text) = state.last_user_text() {
                state.language = detect_language(text);
            }
        }

        let request = self.build_request(state);
        let raw = match self.oracle.complete(&request) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "Dialogue oracle call failed");
                return self.fail(state, from, e.kind(), now);
            }
        };

        let reply = match parse_oracle_response(&raw) {
            ParsedPayload::Parsed { object, source } => {
                tracing::debug!(source = ?source, "Dialogue reply parsed");
                DialogueReply::from_fields(Fields(&object))
            }
            ParsedPayload::Degraded { raw_text } => {
                if raw_text.is_empty() {
                    tracing::warn!(degraded = true, "Dialogue oracle returned empty text");
                    return self.fail(state, from, "empty_response", now);
                }
                tracing::warn!(degraded = true, "Dialogue reply unparsed, using prose as response");
                return self.respond(state, from, from, None, raw_text, StepStatus::Degraded, now);
            }
        };

        let Some(response) = reply.response.clone() else {
            tracing::warn!("Dialogue reply has no response text");
            return self.fail(state, from, "missing_response", now);
        };

        if state.language == Language::Unknown {
            if let Some(language) = reply.detected_language {
                state.language = language;
            }
        }

        state.extracted = merge(&state.extracted, &reply.extraction);
        let completeness = completeness_score(&state.extracted, self.weights);
        let decision = self.decide_transition(from, &reply, completeness);

        if let Some(rejected) = decision.rejected {
            tracing::warn!(
                from = from.as_str(),
                proposed = rejected.as_str(),
                completeness,
                "Oracle-proposed transition refused"
            );
        }

        state.mode = decision.target;
        if decision.target == ConversationMode::Complete {
            state.handoff = Some(HandoffTarget::Classification);
        }
        if decision.target != from {
            tracing::info!(
                from = from.as_str(),
                to = decision.target.as_str(),
                completeness,
                "Conversation mode changed"
            );
        }

        self.respond(
            state,
            from,
            decision.target,
            decision.rejected,
            response,
            StepStatus::Replied,
            now,
        )
    }

    /// Apply the legality rules to an oracle reply.
    pub fn decide_transition(
        &self,
        current: ConversationMode,
        reply: &DialogueReply,
        completeness: f64,
    ) -> TransitionDecision {
        let proposed = reply.proposed_mode.filter(|m| *m != current);
        let ready = completeness >= self.config.completeness_threshold;

        let target = match current {
            ConversationMode::Listening
                if reply.health_signal || proposed == Some(ConversationMode::Investigating) =>
            {
                ConversationMode::Investigating
            }
            ConversationMode::Investigating if ready => ConversationMode::Confirming,
            ConversationMode::Confirming => match proposed {
                Some(to @ (ConversationMode::Complete | ConversationMode::Investigating)) => to,
                _ => current,
            },
            _ => current,
        };
        debug_assert!(current.can_transition_to(target), "{current} -> {target}");

        // Any proposal not adopted is refused. Error is never adopted from the
        // oracle; the machine enters it only through repeated failures.
        let rejected = proposed.filter(|p| *p != target);

        TransitionDecision { target, rejected }
    }

    fn build_request(&self, state: &ConversationState) -> OracleRequest {
        let missing = missing_fields(&state.extracted, self.weights);
        let system = build_dialogue_prompt(state.mode, state.language, &state.extracted, &missing);
        let skip = state
            .messages
            .len()
            .saturating_sub(self.config.max_history_messages);
        let history = state.messages[skip..].iter().map(OracleMessage::from).collect();
        OracleRequest::new(system, history, &self.config.call)
    }

    fn reply_language(&self, state: &ConversationState) -> Language {
        match state.language {
            Language::Unknown => state
                .last_user_text()
                .map(detect_language)
                .unwrap_or(Language::Unknown),
            known => known,
        }
    }

    fn fail(
        &self,
        state: &mut ConversationState,
        from: ConversationMode,
        kind: &str,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        state.consecutive_failures += 1;
        let text = apology(self.reply_language(state)).to_string();

        if state.consecutive_failures >= self.config.max_consecutive_failures {
            tracing::error!(
                failures = state.consecutive_failures,
                kind,
                "Repeated oracle failures; conversation moved to error"
            );
            state.mode = ConversationMode::Error;
            state.error = Some(format!("oracle failure: {kind}"));
            state.pending_response = Some(text.clone());
            return StepOutcome {
                response: text,
                from,
                to: ConversationMode::Error,
                rejected: None,
                completeness: completeness_score(&state.extracted, self.weights),
                status: StepStatus::Errored {
                    kind: kind.to_string(),
                },
            };
        }

        self.respond(
            state,
            from,
            from,
            None,
            text,
            StepStatus::OracleFailed {
                kind: kind.to_string(),
            },
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        state: &mut ConversationState,
        from: ConversationMode,
        to: ConversationMode,
        rejected: Option<ConversationMode>,
        text: String,
        status: StepStatus,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        if !matches!(status, StepStatus::OracleFailed { .. }) {
            state.consecutive_failures = 0;
        }
        state.error = None;
        state.pending_response = Some(text.clone());
        state.push_assistant(&text, now);
        StepOutcome {
            response: text,
            from,
            to,
            rejected,
            completeness: completeness_score(&state.extracted, self.weights),
            status,
        }
    }
}
