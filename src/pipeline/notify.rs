use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::enums::{DiseaseType, Language, UrgencyLevel};
use crate::models::{Notification, NotificationEvent, Officer, Report};
use crate::pipeline::traits::{NotificationSink, ReportStore};

const BROADCAST_KEY: &[u8] = b"broadcast";

fn disease_name(disease: DiseaseType, language: Language) -> &'static str {
    match language {
        Language::Ar => match disease {
            DiseaseType::Cholera => "الكوليرا",
            DiseaseType::Dengue => "حمى الضنك",
            DiseaseType::Malaria => "الملاريا",
            DiseaseType::Measles => "الحصبة",
            DiseaseType::Meningitis => "التهاب السحايا",
            DiseaseType::Unknown => "مرض غير محدد",
        },
        Language::En | Language::Unknown => disease.display_name(),
    }
}

fn urgency_label(urgency: UrgencyLevel, language: Language) -> &'static str {
    match language {
        Language::Ar => match urgency {
            UrgencyLevel::Critical => "حرج",
            UrgencyLevel::High => "مرتفع",
            UrgencyLevel::Medium => "متوسط",
            UrgencyLevel::Low => "منخفض",
        },
        Language::En | Language::Unknown => match urgency {
            UrgencyLevel::Critical => "CRITICAL",
            UrgencyLevel::High => "HIGH",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::Low => "LOW",
        },
    }
}

/// Actions suggested when the classification carries none.
pub fn default_actions(urgency: UrgencyLevel) -> &'static [&'static str] {
    match urgency {
        UrgencyLevel::Critical => &[
            "Immediate field investigation required",
            "Alert regional health coordinator",
            "Prepare rapid response team",
        ],
        UrgencyLevel::High => &["Investigate within 24 hours", "Notify district health officer"],
        UrgencyLevel::Medium => &["Review and assess within 48 hours"],
        UrgencyLevel::Low => &["Monitor and follow up as needed"],
    }
}

pub fn notification_title(report: &Report, language: Language) -> String {
    let disease = disease_name(report.classification.suspected_disease, language);
    let urgency = urgency_label(report.urgency(), language);
    match language {
        Language::Ar => format!("⚠️ تنبيه صحي [{urgency}]: {disease}"),
        Language::En | Language::Unknown => format!("⚠️ Health Alert [{urgency}]: {disease}"),
    }
}

pub fn notification_body(report: &Report, language: Language) -> String {
    let c = &report.classification;
    let data = &report.data;
    let ar = language == Language::Ar;
    let label = |en: &'static str, ar_label: &'static str| if ar { ar_label } else { en };

    let mut lines = vec![
        format!(
            "{}: {}",
            label("Suspected Disease", "المرض المشتبه"),
            disease_name(c.suspected_disease, language)
        ),
        format!(
            "{}: {:.0}%",
            label("Confidence", "درجة الثقة"),
            c.confidence * 100.0
        ),
        format!(
            "{}: {}",
            label("Urgency", "مستوى الطوارئ"),
            urgency_label(c.urgency, language)
        ),
    ];

    if let Some(location) = data.location_label() {
        lines.push(format!("{}: {location}", label("Location", "الموقع")));
    }
    if !data.symptoms.is_empty() {
        lines.push(format!(
            "{}: {}",
            label("Symptoms", "الأعراض"),
            data.symptoms.join(", ")
        ));
    }
    lines.push(format!(
        "{}: {}",
        label("Cases", "عدد الحالات"),
        data.cases_count.unwrap_or(1)
    ));
    if data.deaths() > 0 {
        lines.push(format!("{}: {}", label("Deaths", "عدد الوفيات"), data.deaths()));
    }
    if c.manual_review {
        lines.push(label("MANUAL REVIEW REQUIRED", "مطلوب مراجعة يدوية").to_string());
    }

    let actions: Vec<&str> = if c.recommended_actions.is_empty() {
        default_actions(c.urgency).to_vec()
    } else {
        c.recommended_actions.iter().map(String::as_str).collect()
    };
    lines.push(String::new());
    lines.push(label("Recommended Actions:", "الإجراءات الموصى بها:").to_string());
    for (i, action) in actions.iter().enumerate() {
        lines.push(format!("  {}. {action}", i + 1));
    }

    lines.join("\n")
}

/// Stable id per report and recipient so re-notifying is a no-op.
fn notification_id(report_id: &Uuid, officer_id: Option<&Uuid>) -> Uuid {
    match officer_id {
        Some(officer) => Uuid::new_v5(report_id, officer.as_bytes()),
        None => Uuid::new_v5(report_id, BROADCAST_KEY),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifySummary {
    pub below_floor: bool,
    pub recorded: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Writes officer notifications and emits the broadcast event for a report.
pub struct Notifier<'a> {
    store: &'a dyn ReportStore,
    sink: &'a dyn NotificationSink,
    floor: UrgencyLevel,
}

impl<'a> Notifier<'a> {
    pub fn new(store: &'a dyn ReportStore, sink: &'a dyn NotificationSink, floor: UrgencyLevel) -> Self {
        Self { store, sink, floor }
    }

    /// Best-effort: store failures are logged and counted.
    pub fn notify(&self, report: &Report, now: DateTime<Utc>) -> NotifySummary {
        let mut summary = NotifySummary::default();
        if report.urgency() < self.floor {
            tracing::debug!(
                report_id = %report.id,
                urgency = report.urgency().as_str(),
                floor = self.floor.as_str(),
                "Report below notification floor"
            );
            summary.below_floor = true;
            return summary;
        }

        let officers = match self.store.active_officers() {
            Ok(officers) => officers,
            Err(e) => {
                tracing::warn!(report_id = %report.id, error = %e, "Failed to list officers");
                Vec::new()
            }
        };

        let broadcast = self.build(report, None, Language::En, now);
        for notification in officers
            .iter()
            .map(|o: &Officer| self.build(report, Some(o.id), o.language, now))
            .chain(std::iter::once(broadcast.clone()))
        {
            match self.store.create_notification(&notification) {
                Ok(true) => summary.recorded += 1,
                Ok(false) => summary.duplicates += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        report_id = %report.id,
                        officer_id = ?notification.officer_id,
                        error = %e,
                        "Failed to record notification"
                    );
                }
            }
        }

        self.sink.emit(&NotificationEvent {
            report_id: report.id,
            urgency: report.urgency(),
            title: broadcast.title,
            body: broadcast.body,
            timestamp: now,
        });

        tracing::info!(
            report_id = %report.id,
            urgency = report.urgency().as_str(),
            officers = officers.len(),
            recorded = summary.recorded,
            "Notifications sent"
        );
        summary
    }

    fn build(
        &self,
        report: &Report,
        officer_id: Option<Uuid>,
        language: Language,
        now: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: notification_id(&report.id, officer_id.as_ref()),
            report_id: report.id,
            officer_id,
            urgency: report.urgency(),
            title: notification_title(report, language),
            body: notification_body(report, language),
            created_at: now,
        }
    }
}

/// Sink that writes events to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn emit(&self, event: &NotificationEvent) {
        tracing::info!(
            report_id = %event.report_id,
            urgency = event.urgency.as_str(),
            title = %event.title,
            "Notification event"
        );
    }
}

/// Sink that keeps every event, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, event: &NotificationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
