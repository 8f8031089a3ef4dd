use crate::models::{MatchCollection, MatchRecord, TeamState};

/// Static matches shown before the first live update and whenever the
/// credential fetch fails.
pub fn seed_matches() -> MatchCollection {
    MatchCollection::from_records(vec![
        MatchRecord {
            id: "IND_vs_AUS_ODI_1".into(),
            name: "India vs Australia - 1st ODI".into(),
            team1: TeamState {
                name: "India".into(),
                score: "287/6".into(),
                overs: "45.3".into(),
            },
            team2: TeamState {
                name: "Australia".into(),
                score: "145/3".into(),
                overs: "25.0".into(),
            },
            status: "Live - Australia need 143 runs from 150 balls".into(),
            venue: "Melbourne Cricket Ground".into(),
            date: "2025-08-12".into(),
            format: "ODI".into(),
            current_over: Some("Waiting for live updates...".into()),
            live: true,
            last_update: None,
        },
        MatchRecord {
            id: "ENG_vs_PAK_TEST_2".into(),
            name: "England vs Pakistan - 2nd Test".into(),
            team1: TeamState {
                name: "England".into(),
                score: "456 & 89/2".into(),
                overs: "20.0".into(),
            },
            team2: TeamState {
                name: "Pakistan".into(),
                score: "298".into(),
                overs: "78.4".into(),
            },
            status: "Live - Day 3, Session 2".into(),
            venue: "Lords, London".into(),
            date: "2025-08-12".into(),
            format: "Test".into(),
            current_over: Some("Good length delivery, defended".into()),
            live: true,
            last_update: None,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_has_two_distinct_matches() {
        let seed = seed_matches();
        assert_eq!(seed.ids(), vec!["IND_vs_AUS_ODI_1", "ENG_vs_PAK_TEST_2"]);
        assert!(seed.iter().all(|m| m.live));
    }
}
