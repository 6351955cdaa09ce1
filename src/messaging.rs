//! Outbound messaging: one gateway per platform, built on first use.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::Platform;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("No gateway configured for {0}")]
    NotConfigured(Platform),

    #[error("Gateway for {platform} could not be created: {reason}")]
    Factory { platform: Platform, reason: String },

    #[error("Send via {platform} failed: {reason}")]
    Send { platform: Platform, reason: String },

    #[error("Gateway registry lock poisoned")]
    LockPoisoned,
}

/// Reply addressed to a reporter on a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub platform: Platform,
    pub reporter_id: String,
    pub text: String,
}

pub trait MessagingGateway: Send + Sync {
    fn platform(&self) -> Platform;
    fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError>;
}

pub type GatewayFactory =
    Box<dyn Fn(Platform) -> Result<Arc<dyn MessagingGateway>, GatewayError> + Send + Sync>;

/// Keyed gateway registry. Each factory runs at most once per successful
/// build; the gateway is cached afterwards.
pub struct GatewayRegistry {
    factories: HashMap<Platform, GatewayFactory>,
    built: Mutex<HashMap<Platform, Arc<dyn MessagingGateway>>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            built: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(
        &mut self,
        platform: Platform,
        factory: impl Fn(Platform) -> Result<Arc<dyn MessagingGateway>, GatewayError>
            + Send
            + Sync
            + 'static,
    ) {
        self.factories.insert(platform, Box::new(factory));
    }

    /// Registry with a console gateway for every platform.
    pub fn console() -> Self {
        let mut registry = Self::new();
        for platform in Platform::all() {
            registry.register(*platform, |p| Ok(Arc::new(ConsoleGateway::new(p))));
        }
        registry
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn MessagingGateway>, GatewayError> {
        let mut built = self.built.lock().map_err(|_| GatewayError::LockPoisoned)?;
        if let Some(gateway) = built.get(&platform) {
            return Ok(Arc::clone(gateway));
        }

        let factory = self
            .factories
            .get(&platform)
            .ok_or(GatewayError::NotConfigured(platform))?;
        let gateway = factory(platform)?;
        tracing::debug!(platform = platform.as_str(), "Gateway created");
        built.insert(platform, Arc::clone(&gateway));
        Ok(gateway)
    }

    pub fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        self.get(message.platform)?.send(message)
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes each outbound message to stdout as one JSON line.
pub struct ConsoleGateway {
    platform: Platform,
}

impl ConsoleGateway {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl MessagingGateway for ConsoleGateway {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        let line = serde_json::to_string(message).map_err(|e| GatewayError::Send {
            platform: self.platform,
            reason: e.to_string(),
        })?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| GatewayError::Send {
            platform: self.platform,
            reason: e.to_string(),
        })
    }
}

/// Keeps sent messages in memory. Optionally fails every send.
pub struct RecordingGateway {
    platform: Platform,
    fail: bool,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingGateway {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(platform: Platform) -> Self {
        Self {
            fail: true,
            ..Self::new(platform)
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl MessagingGateway for RecordingGateway {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        if self.fail {
            return Err(GatewayError::Send {
                platform: self.platform,
                reason: "recording gateway set to fail".into(),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(platform: Platform) -> OutboundMessage {
        OutboundMessage {
            platform,
            reporter_id: "42".into(),
            text: "hello".into(),
        }
    }

    #[test]
    fn factory_runs_once_per_platform() {
        let builds = Arc::new(AtomicUsize::new(0));
        let gateway = Arc::new(RecordingGateway::new(Platform::Telegram));

        let mut registry = GatewayRegistry::new();
        let (counter, shared) = (Arc::clone(&builds), Arc::clone(&gateway));
        registry.register(Platform::Telegram, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(shared.clone() as Arc<dyn MessagingGateway>)
        });

        registry.send(&message(Platform::Telegram)).unwrap();
        registry.send(&message(Platform::Telegram)).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.sent().len(), 2);
    }

    #[test]
    fn unregistered_platform_is_not_configured() {
        let registry = GatewayRegistry::new();
        let err = registry.get(Platform::Whatsapp).err().unwrap();
        assert_eq!(err, GatewayError::NotConfigured(Platform::Whatsapp));
    }

    #[test]
    fn failed_factory_is_retried_next_time() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut registry = GatewayRegistry::new();
        registry.register(Platform::Whatsapp, move |p| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GatewayError::Factory { platform: p, reason: "token missing".into() })
            } else {
                Ok(Arc::new(RecordingGateway::new(p)))
            }
        });

        assert!(registry.get(Platform::Whatsapp).is_err());
        assert!(registry.get(Platform::Whatsapp).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn console_registry_covers_all_platforms() {
        let registry = GatewayRegistry::console();
        for platform in Platform::all() {
            assert_eq!(registry.get(*platform).unwrap().platform(), *platform);
        }
    }

    #[test]
    fn failing_gateway_reports_send_error() {
        let gateway = RecordingGateway::failing(Platform::Telegram);
        assert!(matches!(
            gateway.send(&message(Platform::Telegram)),
            Err(GatewayError::Send { .. })
        ));
        assert!(gateway.sent().is_empty());
    }
}
