use std::sync::Arc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::reconciler::{MergeOutcome, Reconciler};
use crate::models::{MatchCollection, MatchRecord};

/// Shared live match collection.
///
/// Readers get snapshots; only the supervisor task writes, through the
/// reconciler, so merges are serialized in delivery order.
#[derive(Clone, Default)]
pub struct ScoreBoard {
    matches: Arc<RwLock<MatchCollection>>,
}

impl ScoreBoard {
    pub fn new(initial: MatchCollection) -> Self {
        ScoreBoard {
            matches: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> Vec<MatchRecord> {
        self.matches.read().await.to_vec()
    }

    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub(crate) async fn apply(&self, reconciler: &Reconciler, envelope: &Value) -> MergeOutcome {
        let mut guard = self.matches.write().await;
        let current = std::mem::take(&mut *guard);
        let (next, outcome) = reconciler.merge(current, envelope);
        *guard = next;
        outcome
    }

    pub(crate) async fn load(&self, collection: MatchCollection) {
        *self.matches.write().await = collection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_scores::seed::seed_matches;
    use serde_json::json;

    #[tokio::test]
    async fn test_apply_moves_updated_match_to_front() {
        let board = ScoreBoard::new(seed_matches());
        let outcome = board
            .apply(
                &Reconciler::default(),
                &json!({
                    "type": "cricket_score_update",
                    "data": { "id": "ENG_vs_PAK_TEST_2", "team1": { "name": "England", "score": "456 & 95/2", "overs": "22.0" } }
                }),
            )
            .await;
        assert!(outcome.changed());

        let snap = board.snapshot().await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, "ENG_vs_PAK_TEST_2");
        assert_eq!(snap[0].team1.score, "456 & 95/2");
        assert_eq!(snap[1].id, "IND_vs_AUS_ODI_1");
    }

    #[tokio::test]
    async fn test_load_replaces_everything() {
        let board = ScoreBoard::default();
        assert_eq!(board.len().await, 0);
        board.load(seed_matches()).await;
        assert_eq!(board.len().await, 2);
    }
}
