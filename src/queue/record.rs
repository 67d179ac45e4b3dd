//! Download queue records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Queued,
    Running,
    Done,
    Error,
    Rejected,
    Deleted,
}

impl Status {
    /// Whether a wanted extra in this state should be left alone by the extras task.
    pub fn is_settled(&self) -> bool {
        matches!(self, Status::Running | Status::Done | Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Queued => write!(f, "queued"),
            Status::Running => write!(f, "running"),
            Status::Done => write!(f, "done"),
            Status::Error => write!(f, "error"),
            Status::Rejected => write!(f, "rejected"),
            Status::Deleted => write!(f, "deleted"),
        }
    }
}

/// Library the extra belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
        }
    }
}

/// An extra that should be downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraRequest {
    /// Video-hosting identifier, the natural key of the work item.
    pub youtube_id: String,

    #[serde(default)]
    pub media_type: MediaType,

    #[serde(default)]
    pub media_id: i64,

    #[serde(default)]
    pub media_title: String,

    /// Extra category, e.g. "Trailers" or "Featurettes".
    #[serde(default)]
    pub extra_type: String,

    #[serde(default)]
    pub extra_title: String,
}

/// One appended state of a download attempt.
///
/// Records are never updated in place: every transition is a new record for
/// the same `youtube_id`, and readers reconcile them with [`dedup`](super::dedup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(flatten)]
    pub request: ExtraRequest,

    pub status: Status,

    pub queued: DateTime<Utc>,

    #[serde(default)]
    pub started: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ended: Option<DateTime<Utc>>,

    /// Seconds between start and end.
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub error: Option<String>,
}

impl Record {
    /// Create a freshly queued record.
    pub fn queued(request: ExtraRequest) -> Self {
        Self {
            request,
            status: Status::Queued,
            queued: Utc::now(),
            started: None,
            ended: None,
            duration: None,
            error: None,
        }
    }

    /// The natural key used for deduplication.
    pub fn key(&self) -> &str {
        &self.request.youtube_id
    }

    /// Next state: running.
    pub fn start(&self) -> Self {
        Self {
            status: Status::Running,
            started: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Next state: done, or error when a message is given.
    pub fn finish(&self, error: Option<String>) -> Self {
        let ended = Utc::now();
        let duration = self
            .started
            .map(|started| (ended - started).num_milliseconds() as f64 / 1000.0);

        Self {
            status: if error.is_some() {
                Status::Error
            } else {
                Status::Done
            },
            ended: Some(ended),
            duration,
            error,
            ..self.clone()
        }
    }

    /// Same record with a different status, e.g. rejected or deleted.
    pub fn with_status(&self, status: Status) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::fixtures::request;

    #[test]
    fn test_lifecycle() {
        let queued = Record::queued(request("dQw4w9WgXcQ"));
        assert_eq!(queued.status, Status::Queued);
        assert_eq!(queued.key(), "dQw4w9WgXcQ");

        let running = queued.start();
        assert_eq!(running.status, Status::Running);
        assert!(running.started.is_some());
        assert_eq!(running.queued, queued.queued);

        let done = running.finish(None);
        assert_eq!(done.status, Status::Done);
        assert!(done.duration.unwrap() >= 0.0);

        let failed = running.finish(Some("video unavailable".into()));
        assert_eq!(failed.status, Status::Error);
        assert_eq!(failed.error.as_deref(), Some("video unavailable"));
    }

    #[test]
    fn test_json_shape() {
        let record = Record::queued(request("dQw4w9WgXcQ"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["youtubeId"], "dQw4w9WgXcQ");
        assert_eq!(json["mediaType"], "movie");
        assert_eq!(json["status"], "queued");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_settled_statuses() {
        assert!(Status::Done.is_settled());
        assert!(Status::Running.is_settled());
        assert!(Status::Rejected.is_settled());
        assert!(!Status::Error.is_settled());
        assert!(!Status::Queued.is_settled());
        assert!(!Status::Deleted.is_settled());
    }
}
