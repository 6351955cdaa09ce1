use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{Oracle, OracleRequest};
use super::OracleError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama `/api/chat` client. Each call carries its own timeout from the
/// request's call profile.
pub struct OllamaOracle {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaOracle {
    pub fn new(base_url: &str, model: &str) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| OracleError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl Oracle for OllamaOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: &request.system,
        });
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(request.timeout.as_secs())
                } else if e.is_connect() {
                    OracleError::Connection(self.base_url.clone())
                } else {
                    OracleError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(request.timeout.as_secs())
            } else {
                OracleError::ResponseParsing(e.to_string())
            }
        })?;

        Ok(parsed.message.content)
    }
}

/// Scripted oracle for tests and offline runs. Replies are consumed in
/// order; once the script runs out the fallback reply is returned.
pub struct MockOracle {
    script: Mutex<VecDeque<Result<String, OracleError>>>,
    fallback: Result<String, OracleError>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl MockOracle {
    pub fn new(response: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(response.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that always fails with `error`.
    pub fn failing(error: OracleError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then_reply(self, response: &str) -> Self {
        self.push(Ok(response.to_string()));
        self
    }

    pub fn then_fail(self, error: OracleError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, item: Result<String, OracleError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Oracle for MockOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
