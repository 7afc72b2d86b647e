use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::db::LearningStore;
use crate::services::inactivity::run_inactivity_scan;
use crate::services::notifier::GuardianNotifier;

pub async fn run_scheduled_scan(
    store: Arc<dyn LearningStore>,
    notifier: Arc<dyn GuardianNotifier>,
    window: Duration,
) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    info!("Starting scheduled inactivity scan");

    let report = run_inactivity_scan(store.as_ref(), notifier.as_ref(), window, Utc::now()).await?;

    for outcome in report.outcomes.iter().filter(|o| o.any_failed()) {
        warn!(learner_id = %outcome.learner_id, "guardian notification failed");
    }

    info!(
        scanned = report.scanned_learners,
        inactive = report.inactive_learners,
        notified = report.notified,
        unreachable = report.unreachable,
        failed = report.failed,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Scheduled inactivity scan completed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewLearner;
    use crate::db::SqliteStore;
    use crate::services::notifier::{Channel, DispatchError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl GuardianNotifier for CountingNotifier {
        async fn send(
            &self,
            _channel: Channel,
            address: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<(), DispatchError> {
            self.sent.lock().unwrap().push(address.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn scheduled_scan_notifies_inactive_guardians() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store
            .insert_learner(NewLearner {
                username: "ada".to_string(),
                password_hash: "hash".to_string(),
                full_name: "Ada Lovelace".to_string(),
                mobile_number: "555-0100".to_string(),
                school_name: None,
                state: None,
                grade: Some("5".to_string()),
                preferred_language: None,
                profile_picture: None,
                guardian_email: Some("parent@example.com".to_string()),
                guardian_phone: None,
            })
            .await
            .unwrap();

        let notifier = Arc::new(CountingNotifier::default());
        run_scheduled_scan(store, notifier.clone(), Duration::days(7))
            .await
            .unwrap();

        assert_eq!(
            notifier.sent.lock().unwrap().as_slice(),
            ["parent@example.com".to_string()]
        );
    }
}
