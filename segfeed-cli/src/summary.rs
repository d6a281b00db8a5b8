use segfeed_engine::{FeederStats, SessionEnd, SessionReport};
use serde::Serialize;

/// One-line JSON description of a finished session.
#[derive(Debug, Serialize)]
pub struct SessionSummary<'a> {
    pub session_id: &'a str,
    pub stream_id: &'a str,
    pub started_at: String,
    pub duration_ms: u64,
    pub end: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: &'a FeederStats,
}

impl<'a> SessionSummary<'a> {
    pub fn from_report(report: &'a SessionReport) -> Self {
        let (end, error) = match &report.end {
            SessionEnd::Stopped => ("stopped", None),
            SessionEnd::StreamEnded => ("stream_ended", None),
            SessionEnd::SinkClosed => ("sink_closed", None),
            SessionEnd::Failed(e) => ("failed", Some(e.to_string())),
        };
        Self {
            session_id: &report.session_id,
            stream_id: &report.stream_id,
            started_at: report.started_at.to_rfc3339(),
            duration_ms: report.duration().as_millis() as u64,
            end,
            error,
            stats: &report.stats,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use segfeed_engine::FeederError;

    fn report(end: SessionEnd) -> SessionReport {
        let now = Utc::now();
        SessionReport {
            session_id: "6f1c".to_string(),
            stream_id: "demo".to_string(),
            started_at: now,
            ended_at: now,
            end,
            stats: FeederStats {
                segments_received: 3,
                bytes_received: 24,
                segments_fed: 3,
                bytes_fed: 24,
                segments_discarded: 0,
                peak_queue_len: 2,
            },
        }
    }

    #[test]
    fn test_summary_json_carries_stats() {
        let report = report(SessionEnd::StreamEnded);
        let json = SessionSummary::from_report(&report).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["stream_id"], "demo");
        assert_eq!(value["end"], "stream_ended");
        assert_eq!(value["stats"]["segments_fed"], 3);
        assert_eq!(value["stats"]["peak_queue_len"], 2);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_summary_json_reports_failure() {
        let report = report(SessionEnd::Failed(FeederError::IdleTimeout {
            timeout: std::time::Duration::from_secs(10),
        }));
        let json = SessionSummary::from_report(&report).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["end"], "failed");
        assert!(value["error"].as_str().unwrap().contains("10"));
    }
}
