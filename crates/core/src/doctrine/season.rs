use serde::{Deserialize, Serialize};

use crate::domain::conclusion::Conclusion;
use crate::domain::snapshot::{ConfidenceLevel, SeasonSignal, SeasonStrength, Snapshot};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonSanity {
    pub max_confidence: ConfidenceLevel,
    pub warnings: Vec<String>,
}

/// Highest confidence a Conclusion may declare given the season rhythm.
/// A weak and unpredictable season caps at low; either one alone caps at
/// medium.
pub fn max_confidence_for(season: &SeasonSignal) -> ConfidenceLevel {
    let weak = season.strength == SeasonStrength::Weak;
    let unpredictable = season.predictability == ConfidenceLevel::Low;
    match (weak, unpredictable) {
        (true, true) => ConfidenceLevel::Low,
        (true, false) | (false, true) => ConfidenceLevel::Medium,
        (false, false) => ConfidenceLevel::High,
    }
}

pub fn check_season_sanity(snapshot: &Snapshot, conclusion: &Conclusion) -> SeasonSanity {
    let season = &snapshot.season;
    let max_confidence = max_confidence_for(season);
    let mut warnings = Vec::new();

    if conclusion.confidence > max_confidence {
        warnings.push(format!(
            "confidence {} exceeds {} allowed by a {} season with {} predictability",
            conclusion.confidence,
            max_confidence,
            season.strength.as_str(),
            season.predictability
        ));
    }

    let phase = season.phase.as_str();
    if !conclusion.season_context.to_lowercase().contains(&phase.to_lowercase()) {
        warnings.push(format!("season_context does not mention the {phase} phase"));
    }

    SeasonSanity { max_confidence, warnings }
}
