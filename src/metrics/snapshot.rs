use serde::{Deserialize, Serialize};

/// One point-in-time read of the backend job counters and run flags,
/// as served by `GET /admin/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pending: u64,
    pub crawled: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub media: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub is_paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_stats_body() {
        let body = r#"{"pending":10,"crawled":100,"failed":2,"media":7,"is_running":true,"is_paused":false}"#;
        let snapshot: Snapshot = serde_json::from_str(body).unwrap();
        assert_eq!(
            snapshot,
            Snapshot {
                pending: 10,
                crawled: 100,
                failed: 2,
                media: 7,
                is_running: true,
                is_paused: false,
            }
        );
    }

    #[test]
    fn older_backends_only_report_counts() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"pending":3,"crawled":9}"#).unwrap();
        assert_eq!(snapshot.failed, 0);
        assert!(!snapshot.is_running);
        assert!(!snapshot.is_paused);
    }

    #[test]
    fn rejects_negative_counts() {
        assert!(serde_json::from_str::<Snapshot>(r#"{"pending":-1,"crawled":0}"#).is_err());
    }
}
