//! Background task scheduler for automatic audits
//!
//! Optional scheduled audit generation, enabled with
//! `AUDITOR_AUDIT_SCHEDULE` (interval in hours, e.g. "24" for daily) or
//! `[scheduler] audit_interval_hours` in the settings file.
//!
//! Each run regenerates the current month's audit for every user with at
//! least one processed upload. A failure for one user is logged and the run
//! moves on to the next.

use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use auditor_core::ai::AIClient;
use auditor_core::config::Settings;
use auditor_core::models::AuditPeriod;
use auditor_core::synthesizer::AuditSynthesizer;
use auditor_core::Database;

/// Longest interval the scheduler honors (one year)
const MAX_INTERVAL_HOURS: u64 = 24 * 366;

/// Configuration for scheduled audits
#[derive(Debug, Clone)]
pub struct AuditScheduleConfig {
    /// Interval between runs in hours
    pub interval_hours: u64,
}

impl AuditScheduleConfig {
    /// Returns None if scheduling is not configured or set to 0
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        match settings.audit_interval_hours {
            Some(0) => {
                warn!("Audit schedule is 0, automatic audits disabled");
                None
            }
            Some(interval_hours) => Some(Self { interval_hours }),
            None => None,
        }
    }

    /// Time between runs, capped at a year
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_hours.min(MAX_INTERVAL_HOURS) * 3600)
    }
}

/// Outcome of one scheduled run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduledRunSummary {
    pub generated: usize,
    pub failed: usize,
}

/// Start the audit scheduler as a background task
pub fn start_audit_scheduler(db: Database, ai: AIClient, config: AuditScheduleConfig) {
    info!(
        "Starting audit scheduler: every {} hours",
        config.interval_hours
    );

    tokio::spawn(async move {
        let mut ticker = interval(config.period());

        // Skip the first immediate tick - audits are not regenerated on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let period = AuditPeriod::current();
            info!("Running scheduled audits for {}...", period.label());

            match run_scheduled_audits(&db, &ai, period).await {
                Ok(summary) => info!(
                    "Scheduled audits completed: {} generated, {} failed",
                    summary.generated, summary.failed
                ),
                Err(e) => error!("Scheduled audits failed: {}", e),
            }
        }
    });
}

/// Generate one period's audit for every user with processed uploads
pub async fn run_scheduled_audits(
    db: &Database,
    ai: &AIClient,
    period: AuditPeriod,
) -> auditor_core::Result<ScheduledRunSummary> {
    let synthesizer = AuditSynthesizer::new(db, ai);
    let mut summary = ScheduledRunSummary::default();

    for user_id in db.users_with_processed_uploads()? {
        match synthesizer.generate(&user_id, period).await {
            Ok(audit) => {
                summary.generated += 1;
                if let Err(e) = db.log_activity(
                    "scheduler",
                    "generate",
                    Some("audit"),
                    Some(audit.id),
                    Some(&format!("user_id={}, period={}", user_id, period)),
                ) {
                    warn!("Failed to log scheduled audit: {}", e);
                }
            }
            Err(e) => {
                summary.failed += 1;
                warn!(user_id = %user_id, "Scheduled audit failed: {}", e);
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditor_core::ai::MockBackend;
    use auditor_core::models::{AggregateMetrics, FileType, NewUpload, UploadAnalysis};

    fn seed_processed_upload(db: &Database, user_id: &str) {
        let id = db
            .create_upload(&NewUpload {
                user_id: user_id.to_string(),
                filename: "sales.csv".to_string(),
                storage_path: format!("{}/sales.csv", user_id),
                file_type: FileType::Csv,
                content_hash: user_id.to_string(),
                size_bytes: 10,
            })
            .unwrap();
        db.mark_upload_processed(
            id,
            &UploadAnalysis {
                metrics: AggregateMetrics::from_totals(500.0, 200.0),
                row_count: 1,
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_config_not_set() {
        assert!(AuditScheduleConfig::from_settings(&Settings::default()).is_none());
    }

    #[test]
    fn test_config_zero_disables() {
        let settings = Settings {
            audit_interval_hours: Some(0),
            ..Default::default()
        };
        assert!(AuditScheduleConfig::from_settings(&settings).is_none());
    }

    #[test]
    fn test_config_interval() {
        let settings = Settings {
            audit_interval_hours: Some(24),
            ..Default::default()
        };
        let config = AuditScheduleConfig::from_settings(&settings).unwrap();
        assert_eq!(config.interval_hours, 24);
        assert_eq!(config.period(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_config_huge_interval_is_capped() {
        let settings = Settings {
            audit_interval_hours: Some(u64::MAX),
            ..Default::default()
        };
        let config = AuditScheduleConfig::from_settings(&settings).unwrap();
        assert_eq!(config.period(), Duration::from_secs(MAX_INTERVAL_HOURS * 3600));
    }

    #[tokio::test]
    async fn test_run_generates_for_each_user() {
        let db = Database::in_memory().unwrap();
        seed_processed_upload(&db, "a");
        seed_processed_upload(&db, "b");

        let period = AuditPeriod::new(6, 2024).unwrap();
        let summary = run_scheduled_audits(&db, &AIClient::mock(), period)
            .await
            .unwrap();

        assert_eq!(summary.generated, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(db.list_audits(None).unwrap().len(), 2);
        assert_eq!(db.list_activity(10).unwrap()[0].user, "scheduler");
    }

    #[tokio::test]
    async fn test_run_counts_failures() {
        let db = Database::in_memory().unwrap();
        seed_processed_upload(&db, "a");

        let failing = AIClient::Mock(MockBackend::unhealthy());
        let summary = run_scheduled_audits(&db, &failing, AuditPeriod::new(6, 2024).unwrap())
            .await
            .unwrap();

        assert_eq!(summary, ScheduledRunSummary { generated: 0, failed: 1 });
        assert!(db.list_audits(None).unwrap().is_empty());
    }
}
