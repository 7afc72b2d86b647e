use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::models::{serialize_iso_millis, Learner};
use crate::db::{LearningStore, StoreError, StoreResult};
use crate::services::notifier::{Channel, GuardianNotifier};

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const MAX_WINDOW_DAYS: i64 = 3650;
pub const NOTIFICATION_SUBJECT: &str = "Student Inactivity Notification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub channel: Channel,
    pub address: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerOutcome {
    pub learner_id: String,
    pub full_name: String,
    pub deliveries: Vec<DeliveryOutcome>,
}

impl LearnerOutcome {
    pub fn any_sent(&self) -> bool {
        self.deliveries.iter().any(|d| d.status == DeliveryStatus::Sent)
    }

    pub fn any_failed(&self) -> bool {
        self.deliveries.iter().any(|d| d.status == DeliveryStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InactivityReport {
    pub message: String,
    pub window_days: i64,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub cutoff: DateTime<Utc>,
    pub scanned_learners: usize,
    pub active_learners: usize,
    pub inactive_learners: usize,
    pub notified: usize,
    pub unreachable: usize,
    pub failed: usize,
    pub outcomes: Vec<LearnerOutcome>,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("inactivity window of {days} days reaches outside the supported date range")]
    WindowOutOfRange { days: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn guardian_message(full_name: &str) -> String {
    format!(
        "Dear Parent, this is a notification that your child, {full_name}, has not completed \
         their weekly video watching goals. Please encourage them to log in and continue their \
         learning journey."
    )
}

/// Learners with no watch activity at or after `cutoff`, in registration order.
pub async fn find_inactive_learners(
    store: &dyn LearningStore,
    cutoff: DateTime<Utc>,
) -> StoreResult<(usize, Vec<Learner>)> {
    let active = store.learners_active_since(cutoff).await?;
    let learners = store.list_learners().await?;
    let scanned = learners.len();

    let inactive = learners
        .into_iter()
        .filter(|learner| !active.contains(&learner.id))
        .collect();

    Ok((scanned, inactive))
}

/// Notifies the guardians of every learner without recent watch activity.
///
/// Store failures abort the scan, as does a window reaching past the
/// representable date range. Dispatch failures do not: each attempt is
/// recorded in the learner's outcome and the scan moves on. Nothing is
/// persisted about the run, so a second invocation notifies the same learners
/// again.
pub async fn run_inactivity_scan(
    store: &dyn LearningStore,
    notifier: &dyn GuardianNotifier,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<InactivityReport, ScanError> {
    let cutoff = now
        .checked_sub_signed(window)
        .ok_or(ScanError::WindowOutOfRange {
            days: window.num_days(),
        })?;
    let (scanned, inactive) = find_inactive_learners(store, cutoff).await?;

    tracing::info!(
        scanned = scanned,
        inactive = inactive.len(),
        cutoff = %cutoff,
        "starting inactivity notification run"
    );

    let mut outcomes = Vec::with_capacity(inactive.len());
    for learner in &inactive {
        outcomes.push(notify_guardians(notifier, learner).await);
    }

    let notified = outcomes.iter().filter(|o| o.any_sent()).count();
    let failed = outcomes.iter().filter(|o| o.any_failed()).count();
    let unreachable = outcomes.iter().filter(|o| o.deliveries.is_empty()).count();

    let report = InactivityReport {
        message: format!(
            "Inactivity check complete. Notified {notified} of {} inactive learners' guardians.",
            inactive.len()
        ),
        window_days: window.num_days(),
        cutoff,
        scanned_learners: scanned,
        active_learners: scanned - inactive.len(),
        inactive_learners: inactive.len(),
        notified,
        unreachable,
        failed,
        outcomes,
    };

    tracing::info!(
        notified = report.notified,
        failed = report.failed,
        unreachable = report.unreachable,
        "inactivity notification run finished"
    );

    Ok(report)
}

async fn notify_guardians(notifier: &dyn GuardianNotifier, learner: &Learner) -> LearnerOutcome {
    let body = guardian_message(&learner.full_name);
    let channels = [
        (Channel::Email, learner.guardian_email.as_deref()),
        (Channel::Sms, learner.guardian_phone.as_deref()),
    ];

    let mut deliveries = Vec::new();
    for (channel, address) in channels {
        let Some(address) = address else {
            continue;
        };

        let outcome = match notifier
            .send(channel, address, NOTIFICATION_SUBJECT, &body)
            .await
        {
            Ok(()) => DeliveryOutcome {
                channel,
                address: address.to_string(),
                status: DeliveryStatus::Sent,
                error: None,
            },
            Err(e) => {
                tracing::warn!(
                    learner_id = %learner.id,
                    channel = channel.as_str(),
                    error = %e,
                    "guardian notification failed"
                );
                DeliveryOutcome {
                    channel,
                    address: address.to_string(),
                    status: DeliveryStatus::Failed,
                    error: Some(e.to_string()),
                }
            }
        };
        deliveries.push(outcome);
    }

    LearnerOutcome {
        learner_id: learner.id.clone(),
        full_name: learner.full_name.clone(),
        deliveries,
    }
}
