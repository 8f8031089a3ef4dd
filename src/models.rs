use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope tag carried by every score update pushed on the channel.
pub const SCORE_UPDATE_TYPE: &str = "cricket_score_update";

/// One side of a match as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    pub name: String,
    /// Display score, e.g. "287/6" or "456 & 89/2"
    pub score: String,
    /// Overs bowled, e.g. "45.3"
    pub overs: String,
}

/// A single match as held in the live collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Stable key, unique within a collection
    pub id: String,
    pub name: String,
    pub team1: TeamState,
    pub team2: TeamState,
    pub status: String,
    pub venue: String,
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    /// "ODI" | "Test" | "T20" ...
    pub format: String,
    /// Latest ball commentary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_over: Option<String>,
    pub live: bool,
    /// Publisher timestamp, when the update carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Matches ordered most-recently-updated first, at most one record per id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatchCollection {
    records: Vec<MatchRecord>,
}

/// Where an upserted record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inserted,
    Replaced,
}

impl MatchCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from an ordered seed, keeping the first record per id.
    pub fn from_records(records: Vec<MatchRecord>) -> Self {
        let mut out: Vec<MatchRecord> = Vec::with_capacity(records.len());
        for record in records {
            if !out.iter().any(|r| r.id == record.id) {
                out.push(record);
            }
        }
        MatchCollection { records: out }
    }

    pub fn get(&self, id: &str) -> Option<&MatchRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Put `record` at the front, dropping any previous record with the same id.
    pub fn upsert_front(&mut self, record: MatchRecord) -> Placement {
        let placement = match self.records.iter().position(|r| r.id == record.id) {
            Some(idx) => {
                self.records.remove(idx);
                Placement::Replaced
            }
            None => Placement::Inserted,
        };
        self.records.insert(0, record);
        placement
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &MatchRecord> {
        self.records.iter()
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn to_vec(&self) -> Vec<MatchRecord> {
        self.records.clone()
    }
}

/// Short-lived credentials for one live-channel connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    #[serde(rename = "url")]
    pub transport_url: String,
    #[serde(rename = "zuid")]
    pub subject_id: String,
    #[serde(rename = "key")]
    pub access_key: String,
}

// The access key must never reach the logs.
impl std::fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("transport_url", &self.transport_url)
            .field("subject_id", &self.subject_id)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Everything the status indicator needs, published on every transition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    /// Real-time mode abandoned; the board shows seed data
    pub degraded: bool,
    pub reconnect_pending: bool,
    /// Frames received since the last successful open
    pub messages_received: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Frames the client writes to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Subscribe { channel: String },
    Ack,
}

impl ClientFrame {
    pub fn to_text(&self) -> String {
        // Both variants are plain string maps; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Envelope the companion function publishes on the channel.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreUpdateEnvelope<T: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ScoreUpdateEnvelope<T> {
    pub fn new(data: T) -> Self {
        ScoreUpdateEnvelope {
            kind: SCORE_UPDATE_TYPE,
            data,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            name: format!("{} match", id),
            team1: TeamState {
                name: "India".into(),
                score: "10/1".into(),
                overs: "2.0".into(),
            },
            team2: TeamState {
                name: "Australia".into(),
                score: "0/0".into(),
                overs: "0.0".into(),
            },
            status: "Live".into(),
            venue: "MCG".into(),
            date: "2025-08-12".into(),
            format: "ODI".into(),
            current_over: None,
            live: true,
            last_update: None,
        }
    }

    #[test]
    fn test_upsert_front_insert_and_replace() {
        let mut c = MatchCollection::new();
        assert_eq!(c.upsert_front(record("A")), Placement::Inserted);
        assert_eq!(c.upsert_front(record("B")), Placement::Inserted);
        assert_eq!(c.upsert_front(record("C")), Placement::Inserted);
        assert_eq!(c.ids(), vec!["C", "B", "A"]);

        assert_eq!(c.upsert_front(record("A")), Placement::Replaced);
        assert_eq!(c.ids(), vec!["A", "C", "B"]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_from_records_drops_duplicate_ids() {
        let c = MatchCollection::from_records(vec![record("A"), record("B"), record("A")]);
        assert_eq!(c.ids(), vec!["A", "B"]);
    }

    #[test]
    fn test_client_frames_wire_format() {
        let sub = ClientFrame::Subscribe {
            channel: "0".into(),
        };
        assert_eq!(sub.to_text(), r#"{"type":"subscribe","channel":"0"}"#);
        assert_eq!(ClientFrame::Ack.to_text(), r#"{"type":"ack"}"#);
    }

    #[test]
    fn test_credentials_wire_names_and_redaction() {
        let creds: ConnectionCredentials = serde_json::from_str(
            r#"{"url":"wss://stream.example.com/ws","zuid":"123","key":"secret"}"#,
        )
        .unwrap();
        assert_eq!(creds.transport_url, "wss://stream.example.com/ws");
        assert_eq!(creds.subject_id, "123");
        assert_eq!(creds.access_key, "secret");
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting...");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
