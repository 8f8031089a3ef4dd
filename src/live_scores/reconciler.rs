//! Score reconciler: turns raw update envelopes into canonical
//! [`MatchRecord`]s and merges them into the live [`MatchCollection`].
//!
//! Merging is last-writer-wins by arrival order. Update payloads carry no
//! sequence number, so a late-delivered old update overwrites newer data.
//! [`UpdateOrdering::RejectStale`] changes that behavior by comparing the
//! publisher timestamp (`lastUpdate` / `last_update`) when both sides have
//! one; it is opt-in.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{MatchCollection, MatchRecord, Placement, TeamState, SCORE_UPDATE_TYPE};

/// Format tag assumed when a payload does not name one.
const DEFAULT_FORMAT: &str = "ODI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateOrdering {
    /// Most recent arrival wins
    #[default]
    ArrivalOrder,
    /// Drop updates whose publisher timestamp is older than the stored record's
    RejectStale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Envelope without the score update tag
    NotAnUpdate,
    /// Tagged, but the embedded record is unusable
    Invalid(String),
    Inserted { id: String },
    Replaced { id: String },
    /// Tagged and valid, but older than what we already hold
    Stale { id: String },
}

impl MergeOutcome {
    /// Whether the envelope was a score update (and therefore gets an ack).
    pub fn is_update(&self) -> bool {
        !matches!(self, MergeOutcome::NotAnUpdate)
    }

    pub fn changed(&self) -> bool {
        matches!(
            self,
            MergeOutcome::Inserted { .. } | MergeOutcome::Replaced { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    ordering: UpdateOrdering,
}

impl Reconciler {
    pub fn new(ordering: UpdateOrdering) -> Self {
        Reconciler { ordering }
    }

    /// Merge one envelope, stamping undated records with today's UTC date.
    pub fn merge(&self, collection: MatchCollection, envelope: &Value) -> (MatchCollection, MergeOutcome) {
        self.merge_on(collection, envelope, Utc::now().date_naive())
    }

    pub fn merge_on(
        &self,
        mut collection: MatchCollection,
        envelope: &Value,
        today: NaiveDate,
    ) -> (MatchCollection, MergeOutcome) {
        if envelope.get("type").and_then(|t| t.as_str()) != Some(SCORE_UPDATE_TYPE) {
            return (collection, MergeOutcome::NotAnUpdate);
        }

        let Some(data) = envelope.get("data") else {
            warn!("[Reconciler] Score update without data, ignoring");
            return (collection, MergeOutcome::Invalid("missing data".into()));
        };

        let record = match to_match_record(data, today) {
            Ok(r) => r,
            Err(reason) => {
                warn!("[Reconciler] Unusable score update: {}", reason);
                return (collection, MergeOutcome::Invalid(reason));
            }
        };

        if self.ordering == UpdateOrdering::RejectStale {
            if let Some(existing) = collection.get(&record.id) {
                if let (Some(held), Some(incoming)) = (existing.last_update, record.last_update) {
                    if incoming < held {
                        debug!(
                            "[Reconciler] Dropping stale update for {} ({} < {})",
                            record.id, incoming, held
                        );
                        return (collection, MergeOutcome::Stale { id: record.id });
                    }
                }
            }
        }

        let id = record.id.clone();
        let outcome = match collection.upsert_front(record) {
            Placement::Inserted => MergeOutcome::Inserted { id },
            Placement::Replaced => MergeOutcome::Replaced { id },
        };
        (collection, outcome)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTeam {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    wickets: Option<Value>,
    #[serde(default)]
    overs: Option<Value>,
}

/// Match fields as published. Both the legacy (`matchId`, numeric score +
/// wickets, `commentary`) and the record-shaped layout are accepted.
#[derive(Debug, Deserialize)]
struct RawMatchUpdate {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "matchId")]
    match_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "matchName")]
    match_name: Option<String>,
    #[serde(default)]
    team1: RawTeam,
    #[serde(default)]
    team2: RawTeam,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    current_over: Option<String>,
    #[serde(default)]
    commentary: Option<String>,
    #[serde(default)]
    live: Option<bool>,
    #[serde(default)]
    last_update: Option<String>,
    #[serde(default, rename = "lastUpdate")]
    last_update_camel: Option<String>,
}

fn to_match_record(data: &Value, today: NaiveDate) -> Result<MatchRecord, String> {
    let raw: RawMatchUpdate =
        serde_json::from_value(data.clone()).map_err(|e| format!("bad match fields: {}", e))?;

    let non_empty = |v: &Option<Value>| v.as_ref().and_then(display_value).filter(|s| !s.is_empty());
    let id = non_empty(&raw.id)
        .or_else(|| non_empty(&raw.match_id))
        .ok_or_else(|| "missing match id".to_string())?;

    let last_update = raw
        .last_update
        .or(raw.last_update_camel)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc));

    Ok(MatchRecord {
        id,
        name: raw.name.or(raw.match_name).unwrap_or_default(),
        team1: to_team_state(&raw.team1),
        team2: to_team_state(&raw.team2),
        status: raw.status.unwrap_or_default(),
        venue: raw.venue.unwrap_or_default(),
        date: raw
            .date
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
        format: raw
            .format
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        current_over: raw.current_over.or(raw.commentary),
        live: raw.live.unwrap_or(true),
        last_update,
    })
}

/// Score display: "{score}/{wickets}" when wickets come separately,
/// otherwise the score as published.
fn to_team_state(team: &RawTeam) -> TeamState {
    let score = team.score.as_ref().and_then(display_value);
    let wickets = team.wickets.as_ref().and_then(display_value);
    let score = match (score, wickets) {
        (Some(s), Some(w)) => format!("{}/{}", s, w),
        (None, Some(w)) => format!("0/{}", w),
        (Some(s), None) => s,
        (None, None) => String::new(),
    };
    TeamState {
        name: team.name.clone().unwrap_or_default(),
        score,
        overs: team
            .overs
            .as_ref()
            .and_then(display_value)
            .unwrap_or_default(),
    }
}

fn display_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
