//! Adapter from job-tracker records to notification attributes.
//!
//! The job tracker knows about raw timestamps and statuses; the notification
//! context wants display strings and a success flag. This module does that
//! translation: timestamps are shown in a fixed display offset, execution time
//! is humanized, and only finished jobs are accepted.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::error::NotificationError;

/// Job lifecycle states reported by the tracker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Inactive,
    Queued,
    Running,
    Success,
    Error,
    Cancelled,
}

impl JobStatus {
    /// Whether the job has finished and a notification may be sent
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }

    /// Human-readable label used as the notification status text
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Success => "Completed",
            Self::Error => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The user who submitted the job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobOwner {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl JobOwner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Stage as submitted to the tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSpec {
    pub main_file: String,
    pub image_name: String,
    pub image_tag: String,
}

/// A job as reported by the job tracker when it changes state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub owner: JobOwner,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Links used in every notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationLinks {
    pub submission_url: String,
    pub docs_url: String,
    pub base_url: String,
}

/// Host-side values merged into every job's attributes
#[derive(Debug, Clone)]
pub struct AttributeDefaults {
    pub links: NotificationLinks,
    pub logo_url: Option<String>,
    /// Offset used to display timestamps
    pub display_offset: FixedOffset,
    /// Zone label appended to displayed timestamps, e.g. `EST`
    pub timezone_label: String,
}

impl JobRecord {
    /// Build the raw attribute map for a finished job.
    ///
    /// `now` supplies the copyright year so callers control the clock.
    pub fn to_attributes(
        &self,
        defaults: &AttributeDefaults,
        now: DateTime<Utc>,
    ) -> Result<Map<String, Value>, NotificationError> {
        if !self.status.is_terminal() {
            return Err(NotificationError::JobNotFinished {
                job_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }

        let display = |ts: &DateTime<Utc>| {
            format_timestamp(ts, &defaults.display_offset, &defaults.timezone_label)
        };

        let execution_time = match (self.created, self.updated) {
            (Some(start), Some(end)) if end >= start => {
                let elapsed = (end - start).to_std().unwrap_or_default();
                Some(format_duration(elapsed.as_secs()))
            }
            _ => None,
        };

        let mut attrs = Map::new();
        attrs.insert("recipient_name".into(), json!(self.owner.full_name()));
        attrs.insert("job_id".into(), json!(self.id));
        attrs.insert("is_success".into(), json!(self.status == JobStatus::Success));
        attrs.insert("status_text".into(), json!(self.status.label()));
        attrs.insert("submission_time".into(), json!(self.created.as_ref().map(display)));
        attrs.insert("completion_time".into(), json!(self.updated.as_ref().map(display)));
        attrs.insert("execution_time".into(), json!(execution_time));
        attrs.insert("error_message".into(), json!(self.error_message));
        attrs.insert("stages".into(), json!(self.stages));
        attrs.insert("links".into(), json!(defaults.links));
        attrs.insert("branding".into(), json!({ "logo_url": defaults.logo_url }));
        attrs.insert("current_year".into(), json!(now.year()));

        Ok(attrs)
    }
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS LABEL` in the given offset
pub fn format_timestamp(ts: &DateTime<Utc>, offset: &FixedOffset, label: &str) -> String {
    let local = ts.with_timezone(offset).format("%Y-%m-%d %H:%M:%S");
    if label.is_empty() {
        local.to_string()
    } else {
        format!("{} {}", local, label)
    }
}

/// Humanize a duration, e.g. `1 hour, 2 minutes, 3 seconds`
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let parts: Vec<String> = [(hours, "hour"), (minutes, "minute"), (seconds, "second")]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, unit)| {
            if count == 1 {
                format!("{} {}", count, unit)
            } else {
                format!("{} {}s", count, unit)
            }
        })
        .collect();

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationContext;
    use chrono::TimeZone;

    fn defaults() -> AttributeDefaults {
        AttributeDefaults {
            links: NotificationLinks {
                submission_url: "https://submit.sivacor.org".to_string(),
                docs_url: "https://docs.sivacor.org".to_string(),
                base_url: "https://sivacor.org".to_string(),
            },
            logo_url: None,
            display_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
            timezone_label: "EST".to_string(),
        }
    }

    fn record(status: JobStatus) -> JobRecord {
        JobRecord {
            id: "65a9f0c2e1b2c3d4e5f60718".to_string(),
            status,
            created: Some(Utc.with_ymd_and_hms(2026, 1, 18, 20, 10, 2).unwrap()),
            updated: Some(Utc.with_ymd_and_hms(2026, 1, 18, 21, 13, 24).unwrap()),
            owner: JobOwner {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            stages: vec![StageSpec {
                main_file: "main.do".to_string(),
                image_name: "dataeditors/stata18_5-mp".to_string(),
                image_tag: "2025-02-26".to_string(),
            }],
            error_message: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 18, 21, 14, 0).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(59), "59 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(3723), "1 hour, 2 minutes, 3 seconds");
        assert_eq!(format_duration(7260), "2 hours, 1 minute");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 18, 20, 13, 24).unwrap();
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(format_timestamp(&ts, &offset, "EST"), "2026-01-18 15:13:24 EST");
        assert_eq!(format_timestamp(&ts, &offset, ""), "2026-01-18 15:13:24");
    }

    #[test]
    fn test_success_record_to_context() {
        let attrs = record(JobStatus::Success).to_attributes(&defaults(), now()).unwrap();
        let ctx = NotificationContext::from_attributes(&attrs).unwrap();

        assert!(ctx.is_success());
        assert_eq!(ctx.recipient_name(), "Ada Lovelace");
        assert_eq!(ctx.status_text(), "Completed");
        assert_eq!(ctx.submission_time(), Some("2026-01-18 15:10:02 EST"));
        assert_eq!(ctx.completion_time(), Some("2026-01-18 16:13:24 EST"));
        assert_eq!(ctx.execution_time(), Some("1 hour, 3 minutes, 22 seconds"));
        assert_eq!(ctx.current_year(), 2026);
        assert_eq!(ctx.logo_url(), None);
        assert_eq!(
            ctx.stages().unwrap()[0].line(),
            "main.do - dataeditors/stata18_5-mp:2025-02-26"
        );
    }

    #[test]
    fn test_error_and_cancelled_are_failures() {
        let mut failed = record(JobStatus::Error);
        failed.error_message = Some("Exit code 1".to_string());
        let ctx =
            NotificationContext::from_attributes(&failed.to_attributes(&defaults(), now()).unwrap())
                .unwrap();
        assert!(!ctx.is_success());
        assert_eq!(ctx.status_text(), "Failed");
        assert_eq!(ctx.error_message(), Some("Exit code 1"));

        let cancelled = record(JobStatus::Cancelled);
        let ctx = NotificationContext::from_attributes(
            &cancelled.to_attributes(&defaults(), now()).unwrap(),
        )
        .unwrap();
        assert!(!ctx.is_success());
        assert_eq!(ctx.status_text(), "Cancelled");
    }

    #[test]
    fn test_running_job_is_rejected() {
        let err = record(JobStatus::Running)
            .to_attributes(&defaults(), now())
            .unwrap_err();
        assert!(matches!(err, NotificationError::JobNotFinished { ref status, .. } if status == "running"));
    }

    #[test]
    fn test_missing_timestamps_skip_execution_time() {
        let mut job = record(JobStatus::Success);
        job.updated = None;
        let ctx =
            NotificationContext::from_attributes(&job.to_attributes(&defaults(), now()).unwrap())
                .unwrap();
        assert!(ctx.submission_time().is_some());
        assert_eq!(ctx.completion_time(), None);
        assert_eq!(ctx.execution_time(), None);
    }

    #[test]
    fn test_clock_skew_skips_execution_time() {
        let mut job = record(JobStatus::Success);
        std::mem::swap(&mut job.created, &mut job.updated);
        let attrs = job.to_attributes(&defaults(), now()).unwrap();
        assert_eq!(attrs.get("execution_time"), Some(&Value::Null));
    }

    #[test]
    fn test_job_record_deserializes() {
        let job: JobRecord = serde_json::from_value(json!({
            "id": "abc123",
            "status": "error",
            "created": "2026-01-18T20:10:02Z",
            "updated": "2026-01-18T20:11:02Z",
            "owner": {"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"},
            "error_message": "Exit code 1"
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Error);
        assert!(job.stages.is_empty());
        let attrs = job.to_attributes(&defaults(), now()).unwrap();
        assert_eq!(attrs.get("execution_time"), Some(&json!("1 minute")));
    }
}
