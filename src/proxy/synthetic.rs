use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

const COMMENTARY: [&str; 5] = [
    "FOUR! Brilliant shot through covers",
    "Good length delivery, defended",
    "SIX! What a shot over long-on!",
    "Wicket! Caught at slip",
    "Single taken, good running",
];

#[derive(Debug, Clone, Serialize)]
pub struct SyntheticTeam {
    pub name: &'static str,
    pub score: u32,
    pub wickets: u32,
    pub overs: String,
}

/// Demo update in the publisher's legacy shape (numeric score + wickets).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticUpdate {
    pub match_id: &'static str,
    pub match_name: &'static str,
    pub team1: SyntheticTeam,
    pub team2: SyntheticTeam,
    pub status: &'static str,
    pub venue: &'static str,
    pub last_update: DateTime<Utc>,
    pub commentary: &'static str,
}

/// Random India vs Australia scoreline for exercising the live channel.
pub fn synthetic_update<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> SyntheticUpdate {
    SyntheticUpdate {
        match_id: "IND_vs_AUS_ODI_1",
        match_name: "India vs Australia - 1st ODI",
        team1: SyntheticTeam {
            name: "India",
            score: rng.gen_range(280..330),
            wickets: rng.gen_range(0..7),
            overs: format!("45.{}", rng.gen_range(0..6)),
        },
        team2: SyntheticTeam {
            name: "Australia",
            score: rng.gen_range(140..190),
            wickets: rng.gen_range(0..5),
            overs: format!("25.{}", rng.gen_range(0..6)),
        },
        status: "Live",
        venue: "Melbourne Cricket Ground",
        last_update: now,
        commentary: COMMENTARY.choose(rng).copied().unwrap_or(COMMENTARY[0]),
    }
}
