//! Oracle response parser.
//!
//! Turns whatever text the model produced into a tagged payload. Total:
//! every input yields either a decoded JSON object or a degraded payload
//! carrying the raw text. Callers branch on the tag.

use serde_json::{Map, Value};

/// Upper bound on brace-delimited candidates tried per response.
const MAX_BRACE_CANDIDATES: usize = 64;

/// Which fallback level produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    FencedBlock,
    WholeText,
    BraceScan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    Parsed {
        object: Map<String, Value>,
        source: ParseSource,
    },
    /// Nothing decodable. `raw_text` is the trimmed response, usable as a
    /// human-facing reply.
    Degraded { raw_text: String },
}

impl ParsedPayload {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// How much the structure can be trusted, by fallback level.
    pub fn parse_confidence(&self) -> f64 {
        match self {
            Self::Parsed { source: ParseSource::FencedBlock, .. } => 1.0,
            Self::Parsed { source: ParseSource::WholeText, .. } => 0.9,
            Self::Parsed { source: ParseSource::BraceScan, .. } => 0.6,
            Self::Degraded { .. } => 0.0,
        }
    }

    pub fn fields(&self) -> Option<Fields<'_>> {
        match self {
            Self::Parsed { object, .. } => Some(Fields(object)),
            Self::Degraded { .. } => None,
        }
    }
}

/// Parse a raw oracle response. Order: fenced code blocks, the whole text,
/// balanced brace substrings left to right, then degraded.
pub fn parse_oracle_response(raw: &str) -> ParsedPayload {
    for block in fenced_blocks(raw) {
        if let Some(object) = decode_object(block) {
            return ParsedPayload::Parsed {
                object,
                source: ParseSource::FencedBlock,
            };
        }
    }

    if let Some(object) = decode_object(raw.trim()) {
        return ParsedPayload::Parsed {
            object,
            source: ParseSource::WholeText,
        };
    }

    for candidate in balanced_brace_candidates(raw).take(MAX_BRACE_CANDIDATES) {
        if let Some(object) = decode_object(candidate) {
            return ParsedPayload::Parsed {
                object,
                source: ParseSource::BraceScan,
            };
        }
    }

    ParsedPayload::Degraded {
        raw_text: raw.trim().to_string(),
    }
}

fn decode_object(text: &str) -> Option<Map<String, Value>> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Contents of every closed ``` fence, with an optional language tag removed.
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        let mut body = after[..close].trim();
        if body
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            body = body[4..].trim_start();
        }
        blocks.push(body);
        rest = &after[close + 3..];
    }

    blocks
}

/// Every balanced `{...}` substring, in order of its opening brace.
/// Braces inside JSON string literals are ignored.
fn balanced_brace_candidates(raw: &str) -> impl Iterator<Item = &str> {
    let bytes = raw.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'{')
        .filter_map(move |(start, _)| {
            balanced_end(&bytes[start..]).map(|len| &raw[start..start + len])
        })
}

/// Length of the balanced object starting at `bytes[0] == b'{'`.
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in bytes.iter().enumerate() {
        if in_string {
            match (escaped, *b) {
                (true, _) => escaped = false,
                (false, b'\\') => escaped = true,
                (false, b'"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match *b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

// ═══════════════════════════════════════════
// Lenient field access
// ═══════════════════════════════════════════

/// Read-only view over a decoded object that tolerates wrong types.
/// A field of the wrong shape reads as absent.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a>(pub &'a Map<String, Value>);

impl<'a> Fields<'a> {
    /// Non-blank string. "null"/"none"/"n/a" spellings read as absent.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                let lowered = trimmed.to_lowercase();
                if trimmed.is_empty() || matches!(lowered.as_str(), "null" | "none" | "n/a") {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Non-negative count from a number or numeric string.
    pub fn count(&self, key: &str) -> Option<u32> {
        let value = match self.0.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) {
            Some(value.round() as u32)
        } else {
            None
        }
    }

    /// Number clamped to [0, 1].
    pub fn unit(&self, key: &str) -> Option<f64> {
        let value = match self.0.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then(|| value.clamp(0.0, 1.0))
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Array of non-blank strings; a single string is a one-element list.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    pub fn object(&self, key: &str) -> Option<Fields<'a>> {
        match self.0.get(key)? {
            Value::Object(map) => Some(Fields(map)),
            _ => None,
        }
    }
}
