use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded time-tracking interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "session_id")]
    pub id: String,
    pub begin_at: DateTime<Utc>,
    /// Absent while the session is still open
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Duration in seconds, absent until the server has computed it
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_at.is_none()
    }
}

/// One page of sessions plus the total count across all pages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionListResult {
    #[serde(rename = "sessions", default)]
    pub items: Vec<Session>,
    #[serde(default)]
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_open_session() {
        let json = r#"{
            "sessions": [
                {"session_id": "s-1", "begin_at": "2024-03-01T10:00:00Z"},
                {"session_id": "s-2", "begin_at": "2024-03-01T08:00:00Z",
                 "end_at": "2024-03-01T09:30:00Z", "duration": 5400}
            ],
            "total": 27
        }"#;

        let result: SessionListResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.total, 27);
        assert_eq!(result.items.len(), 2);
        assert!(result.items[0].is_open());
        assert_eq!(result.items[0].duration, None);
        assert!(!result.items[1].is_open());
        assert_eq!(result.items[1].duration, Some(5400.0));
    }

    #[test]
    fn test_ended_session_without_duration() {
        let json = r#"{"session_id": "s-3", "begin_at": "2024-03-01T08:00:00Z",
                       "end_at": "2024-03-01T09:00:00Z", "duration": null}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert!(!session.is_open());
        assert!(session.duration.is_none());
    }
}
