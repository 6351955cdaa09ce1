use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Every variant in declaration order.
            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        // Serialized through as_str so the wire form always matches the stored form.
        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Platform {
    Telegram => "telegram",
    Whatsapp => "whatsapp",
});

str_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
});

str_enum!(ConversationMode {
    Listening => "listening",
    Investigating => "investigating",
    Confirming => "confirming",
    Complete => "complete",
    Error => "error",
});

impl ConversationMode {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether a single dialogue step may move a conversation from `self` to `to`.
    /// Self-loops are legal for every non-terminal mode.
    pub fn can_transition_to(&self, to: ConversationMode) -> bool {
        use ConversationMode::*;
        match (self, to) {
            (Complete | Error, _) => false,
            (_, Error) => true,
            (from, to) if *from == to => true,
            (Listening, Investigating) => true,
            (Investigating, Confirming) => true,
            (Confirming, Complete | Investigating) => true,
            _ => false,
        }
    }
}

str_enum!(Language {
    Unknown => "unknown",
    Ar => "ar",
    En => "en",
});

str_enum!(HandoffTarget {
    Classification => "classification",
});

str_enum!(DiseaseType {
    Cholera => "cholera",
    Dengue => "dengue",
    Malaria => "malaria",
    Measles => "measles",
    Meningitis => "meningitis",
    Unknown => "unknown",
});

impl DiseaseType {
    /// Lenient mapping for free text coming back from the oracle.
    /// Anything outside the vocabulary is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        label
            .trim()
            .to_lowercase()
            .parse()
            .unwrap_or(DiseaseType::Unknown)
    }

    pub fn is_known(&self) -> bool {
        *self != DiseaseType::Unknown
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cholera => "Cholera",
            Self::Dengue => "Dengue",
            Self::Malaria => "Malaria",
            Self::Measles => "Measles",
            Self::Meningitis => "Meningitis",
            Self::Unknown => "Unknown disease",
        }
    }
}

str_enum!(ReporterRelation {
    OwnSelf => "self",
    Family => "family",
    Neighbor => "neighbor",
    HealthWorker => "health_worker",
    CommunityLeader => "community_leader",
    Other => "other",
});

// Declaration order is severity order; derived Ord relies on it.
str_enum!(UrgencyLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(AlertType {
    SingleCase => "single_case",
    Cluster => "cluster",
    SuspectedOutbreak => "suspected_outbreak",
    Rumor => "rumor",
});

impl AlertType {
    /// Escalation rank used when thresholds override the oracle's choice.
    /// A rumor is outranked by any confirmed signal.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Rumor => 0,
            Self::SingleCase => 1,
            Self::Cluster => 2,
            Self::SuspectedOutbreak => 3,
        }
    }
}

str_enum!(ReportStatus {
    Open => "open",
    Investigating => "investigating",
    Resolved => "resolved",
    FalseAlarm => "false_alarm",
});

impl ReportStatus {
    /// Statuses eligible for case linking.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::Investigating)
    }
}

str_enum!(LinkType {
    Geographic => "geographic",
    Temporal => "temporal",
    Symptom => "symptom",
    Manual => "manual",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trip_through_str() {
        for mode in ConversationMode::all() {
            assert_eq!(ConversationMode::from_str(mode.as_str()).unwrap(), *mode);
        }
        for urgency in UrgencyLevel::all() {
            assert_eq!(UrgencyLevel::from_str(urgency.as_str()).unwrap(), *urgency);
        }
        assert_eq!(ReporterRelation::from_str("self").unwrap(), ReporterRelation::OwnSelf);
    }

    #[test]
    fn invalid_value_is_invalid_enum_error() {
        let err = UrgencyLevel::from_str("severe").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn urgency_is_ordered() {
        assert!(UrgencyLevel::Low < UrgencyLevel::Medium);
        assert!(UrgencyLevel::Medium < UrgencyLevel::High);
        assert!(UrgencyLevel::High < UrgencyLevel::Critical);
        assert_eq!(
            UrgencyLevel::Low.max(UrgencyLevel::Critical),
            UrgencyLevel::Critical
        );
    }

    #[test]
    fn serde_uses_stored_form() {
        let json = serde_json::to_string(&AlertType::SuspectedOutbreak).unwrap();
        assert_eq!(json, "\"suspected_outbreak\"");
        let rel: ReporterRelation = serde_json::from_str("\"health_worker\"").unwrap();
        assert_eq!(rel, ReporterRelation::HealthWorker);
        let own = serde_json::to_string(&ReporterRelation::OwnSelf).unwrap();
        assert_eq!(own, "\"self\"");
    }

    #[test]
    fn listening_only_reaches_investigating_or_itself() {
        for to in ConversationMode::all() {
            let legal = ConversationMode::Listening.can_transition_to(*to);
            let expected = matches!(
                to,
                ConversationMode::Listening
                    | ConversationMode::Investigating
                    | ConversationMode::Error
            );
            assert_eq!(legal, expected, "listening -> {to}");
        }
    }

    #[test]
    fn terminal_modes_have_no_outbound_edges() {
        for from in [ConversationMode::Complete, ConversationMode::Error] {
            assert!(from.is_terminal());
            for to in ConversationMode::all() {
                assert!(!from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn confirming_can_fall_back_to_investigating() {
        assert!(ConversationMode::Confirming.can_transition_to(ConversationMode::Investigating));
        assert!(!ConversationMode::Investigating.can_transition_to(ConversationMode::Complete));
    }

    #[test]
    fn disease_label_is_lenient() {
        assert_eq!(DiseaseType::from_label(" Cholera "), DiseaseType::Cholera);
        assert_eq!(DiseaseType::from_label("ebola"), DiseaseType::Unknown);
        assert_eq!(DiseaseType::from_label(""), DiseaseType::Unknown);
    }

    #[test]
    fn alert_rank_escalates() {
        assert!(AlertType::SuspectedOutbreak.rank() > AlertType::Cluster.rank());
        assert!(AlertType::Cluster.rank() > AlertType::SingleCase.rank());
        assert!(AlertType::SingleCase.rank() > AlertType::Rumor.rank());
    }
}
