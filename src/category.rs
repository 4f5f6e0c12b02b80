use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Weight given to a missing or unrecognized answer.
pub const NEUTRAL_WEIGHT: f64 = 50.0;

/// How confident the practice is in hitting its revenue forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastConfidence {
    VeryConfident,
    Confident,
    Uncertain,
    Concerned,
    VeryConcerned,
}

impl ForecastConfidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryConfident => "very-confident",
            Self::Confident => "confident",
            Self::Uncertain => "uncertain",
            Self::Concerned => "concerned",
            Self::VeryConcerned => "very-concerned",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            Self::VeryConfident => 100.0,
            Self::Confident => 75.0,
            Self::Uncertain => 50.0,
            Self::Concerned => 25.0,
            Self::VeryConcerned => 0.0,
        }
    }
}

impl FromStr for ForecastConfidence {
    type Err = UnknownAnswer;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "very-confident" => Ok(Self::VeryConfident),
            "confident" => Ok(Self::Confident),
            "uncertain" => Ok(Self::Uncertain),
            "concerned" => Ok(Self::Concerned),
            "very-concerned" => Ok(Self::VeryConcerned),
            other => Err(UnknownAnswer(other.to_string())),
        }
    }
}

/// How clearly the team's job descriptions are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobClarity {
    VeryClear,
    MostlyClear,
    Partially,
    Unclear,
    NonExistent,
}

impl JobClarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryClear => "very-clear",
            Self::MostlyClear => "mostly-clear",
            Self::Partially => "partially",
            Self::Unclear => "unclear",
            Self::NonExistent => "non-existent",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            Self::VeryClear => 100.0,
            Self::MostlyClear => 75.0,
            Self::Partially => 50.0,
            Self::Unclear => 25.0,
            Self::NonExistent => 0.0,
        }
    }
}

impl FromStr for JobClarity {
    type Err = UnknownAnswer;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "very-clear" => Ok(Self::VeryClear),
            "mostly-clear" => Ok(Self::MostlyClear),
            "partially" => Ok(Self::Partially),
            "unclear" => Ok(Self::Unclear),
            "non-existent" => Ok(Self::NonExistent),
            other => Err(UnknownAnswer(other.to_string())),
        }
    }
}

impl fmt::Display for ForecastConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for JobClarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized answer {0:?}")]
pub struct UnknownAnswer(pub String);

/// Selects one of the two five-level enumerations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalCategory {
    RevenueForecastConfidence,
    JobDescriptionsClarity,
}

/// Maps a raw categorical answer to its weight on the 0-100 scale.
///
/// Never fails: empty or unknown answers fall back to [`NEUTRAL_WEIGHT`].
pub fn map_ordinal(category: OrdinalCategory, answer: &str) -> f64 {
    match category {
        OrdinalCategory::RevenueForecastConfidence => answer
            .parse::<ForecastConfidence>()
            .map(ForecastConfidence::weight)
            .unwrap_or(NEUTRAL_WEIGHT),
        OrdinalCategory::JobDescriptionsClarity => answer
            .parse::<JobClarity>()
            .map(JobClarity::weight)
            .unwrap_or(NEUTRAL_WEIGHT),
    }
}

/// Average weight of the two ordinal answers; unanswered ones count as neutral.
pub fn ordinal_average(
    forecast: Option<ForecastConfidence>,
    clarity: Option<JobClarity>,
) -> f64 {
    let forecast = map_ordinal(
        OrdinalCategory::RevenueForecastConfidence,
        forecast.map_or("", ForecastConfidence::as_str),
    );
    let clarity = map_ordinal(
        OrdinalCategory::JobDescriptionsClarity,
        clarity.map_or("", JobClarity::as_str),
    );
    (forecast + clarity) / 2.0
}

/// Deserializes an optional answer, turning unknown strings into `None`
/// so that partially completed forms still load.
pub fn lenient_answer<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}
