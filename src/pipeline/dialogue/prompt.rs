use crate::models::enums::{ConversationMode, Language};
use crate::models::ExtractedData;

pub const APOLOGY_EN: &str =
    "I'm sorry, I'm having trouble processing your message. Please try again in a moment.";
pub const APOLOGY_AR: &str =
    "عذراً، أواجه مشكلة في معالجة رسالتك. يرجى المحاولة مرة أخرى بعد قليل.";

/// Fixed apology for the conversation language. English when unknown.
pub fn apology(language: Language) -> &'static str {
    match language {
        Language::Ar => APOLOGY_AR,
        Language::En | Language::Unknown => APOLOGY_EN,
    }
}

const DIALOGUE_SYSTEM_PROMPT: &str = r#"
You are a community health volunteer assistant. People message you about
illness in their family or community. You talk with them naturally and collect
what a health officer needs to act: symptoms, where, since when, how many
people are sick or have died, who is affected, and how the reporter knows.

RULES:
1. Reply in the reporter's language (Arabic or English). Keep replies short.
2. Ask at most one question per reply.
3. Never diagnose, prescribe or promise treatment.
4. A health signal is a CURRENT, LOCAL event: symptoms now, a disease with
   personal or local context, deaths, several people sick. General or
   historical questions are not a signal.
5. Extract only what the reporter said. Use null for anything not stated.

OUTPUT: a single JSON object, no other text:
{
  "response": "your reply to the reporter",
  "detected_language": "ar | en",
  "health_signal_detected": true | false,
  "extracted_data": {
    "symptoms": ["..."],
    "suspected_disease": "cholera | dengue | malaria | measles | meningitis | unknown | null",
    "location_text": "place as the reporter said it, or null",
    "location_normalized": "town or district name, or null",
    "onset_text": "when it started, or null",
    "onset_date": "YYYY-MM-DD or null",
    "cases_count": number or null,
    "deaths_count": number or null,
    "affected_description": "who is affected, or null",
    "reporter_relationship": "self | family | neighbor | health_worker | community_leader | other | null"
  },
  "transition_to": "listening | investigating | confirming | complete | null",
  "reasoning": "one sentence"
}
"#;

fn mode_instructions(mode: ConversationMode) -> &'static str {
    match mode {
        ConversationMode::Listening => {
            "MODE: listening. Answer the message. If it describes a health signal, \
             set health_signal_detected true and transition_to \"investigating\"."
        }
        ConversationMode::Investigating => {
            "MODE: investigating. Ask for the most important missing detail listed below. \
             Be patient with vague answers; approximate is fine."
        }
        ConversationMode::Confirming => {
            "MODE: confirming. Summarize what you collected and ask the reporter to confirm. \
             If they confirm, thank them and set transition_to \"complete\". \
             If they correct something, record the correction and set transition_to \"investigating\"."
        }
        ConversationMode::Complete | ConversationMode::Error => {
            "MODE: closed. Thank the reporter."
        }
    }
}

/// System prompt for one dialogue step.
pub fn build_dialogue_prompt(
    mode: ConversationMode,
    language: Language,
    extracted: &ExtractedData,
    missing: &[&str],
) -> String {
    let collected = serde_json::to_string(extracted).unwrap_or_else(|_| "{}".to_string());
    let language_note = match language {
        Language::Ar => "The reporter writes Arabic. Reply in Arabic.",
        Language::En => "The reporter writes English. Reply in English.",
        Language::Unknown => "Reply in the language of the last message.",
    };
    let missing_note = if missing.is_empty() {
        "none".to_string()
    } else {
        missing.join(", ")
    };

    format!(
        "{DIALOGUE_SYSTEM_PROMPT}\n{}\n{language_note}\n\nCOLLECTED SO FAR: {collected}\nSTILL MISSING: {missing_note}\n",
        mode_instructions(mode)
    )
}
