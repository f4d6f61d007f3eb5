//! Retrieval profiles: named speed/accuracy tradeoffs.
//!
//! Each profile fixes one reranker model and one maximum passage length,
//! and decides whether the collection plan comes from the planner model
//! or from a hardcoded single-collection plan.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::catalog::ELEMENTS;
use super::plan::CollectionPlan;
use crate::error::ConfigError;

/// The five selectable profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileName {
    /// Smallest reranker, fixed single-collection plan.
    MaxSpeed,
    /// Fixed single-collection plan with a mid-size reranker.
    Efficient,
    /// Planner-driven with planner-chosen depths.
    #[default]
    Optimized,
    /// Planner-driven, depth forced to 6.
    HighPrecision,
    /// Planner-driven, depth forced to 12.
    MaxAccuracy,
}

impl ProfileName {
    /// All profiles, fastest first.
    pub const ALL: [Self; 5] = [
        Self::MaxSpeed,
        Self::Efficient,
        Self::Optimized,
        Self::HighPrecision,
        Self::MaxAccuracy,
    ];

    /// Returns the kebab-case identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MaxSpeed => "max-speed",
            Self::Efficient => "efficient",
            Self::Optimized => "optimized",
            Self::HighPrecision => "high-precision",
            Self::MaxAccuracy => "max-accuracy",
        }
    }

    /// Returns the human-facing label (`"Max Speed"`).
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MaxSpeed => "Max Speed",
            Self::Efficient => "Efficient",
            Self::Optimized => "Optimized",
            Self::HighPrecision => "High Precision",
            Self::MaxAccuracy => "Max Accuracy",
        }
    }

    /// Resolves the full profile configuration.
    #[must_use]
    pub fn profile(self) -> RetrievalProfile {
        RetrievalProfile::resolve(self)
    }
}

impl FromStr for ProfileName {
    type Err = ConfigError;

    /// Accepts the identifier or the label in any case, with spaces,
    /// dashes or underscores as separators (`max-speed`, `Max Speed`,
    /// `MaxSpeed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "maxspeed" => Ok(Self::MaxSpeed),
            "efficient" => Ok(Self::Efficient),
            "optimized" => Ok(Self::Optimized),
            "highprecision" => Ok(Self::HighPrecision),
            "maxaccuracy" => Ok(Self::MaxAccuracy),
            _ => Err(ConfigError::UnknownProfile {
                name: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-encoder models available for reranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RerankerModel {
    /// `ms-marco-TinyBERT-L-2-v2`: two-layer, lowest latency.
    #[serde(rename = "ms-marco-TinyBERT-L-2-v2")]
    TinyBertL2,
    /// `ms-marco-MiniLM-L-12-v2`: twelve-layer, higher quality.
    #[serde(rename = "ms-marco-MiniLM-L-12-v2")]
    MiniLmL12,
}

impl RerankerModel {
    /// Model identifier, also the model's directory name on disk.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        match self {
            Self::TinyBertL2 => "ms-marco-TinyBERT-L-2-v2",
            Self::MiniLmL12 => "ms-marco-MiniLM-L-12-v2",
        }
    }
}

impl std::fmt::Display for RerankerModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// How per-collection retrieval is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalStrategy {
    /// Fixed breadth, no metadata predicate; a report filter is appended
    /// to the query text.
    Plain,
    /// Per-collection breadth with a metadata predicate built by the
    /// structured-query step.
    SelfQuery,
}

/// Where the collection plan comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PlanningMode {
    /// Always use this plan; no model call.
    Fixed {
        /// The preconfigured plan.
        plan: CollectionPlan,
    },
    /// Ask the planner model.
    LlmDriven {
        /// Depth applied to every planned collection after parsing.
        depth_override: Option<usize>,
    },
}

/// Fully resolved profile configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalProfile {
    /// Human-facing label.
    pub label: &'static str,
    /// Reranking model.
    pub reranker_model: RerankerModel,
    /// Maximum passage length in tokens fed to the reranker.
    pub max_passage_length: usize,
    /// Plan source.
    pub planning_mode: PlanningMode,
    /// Retrieval strategy for every planned collection.
    pub strategy: RetrievalStrategy,
}

impl RetrievalProfile {
    /// Resolves a named profile.
    #[must_use]
    pub fn resolve(name: ProfileName) -> Self {
        match name {
            ProfileName::MaxSpeed => Self {
                label: name.label(),
                reranker_model: RerankerModel::TinyBertL2,
                max_passage_length: 128,
                planning_mode: PlanningMode::Fixed {
                    plan: CollectionPlan::single(ELEMENTS, 3),
                },
                strategy: RetrievalStrategy::Plain,
            },
            ProfileName::Efficient => Self {
                label: name.label(),
                reranker_model: RerankerModel::MiniLmL12,
                max_passage_length: 256,
                planning_mode: PlanningMode::Fixed {
                    plan: CollectionPlan::single(ELEMENTS, 5),
                },
                strategy: RetrievalStrategy::Plain,
            },
            ProfileName::Optimized => Self::llm_driven(name, None),
            ProfileName::HighPrecision => Self::llm_driven(name, Some(6)),
            ProfileName::MaxAccuracy => Self::llm_driven(name, Some(12)),
        }
    }

    /// Parses a profile name and resolves it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProfile`] for unrecognised names.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        name.parse::<ProfileName>().map(Self::resolve)
    }

    /// The fixed profile behind the Origin tool: detailed elements only,
    /// depth 3, no model calls besides reranking.
    #[must_use]
    pub fn origin() -> Self {
        Self {
            label: "Origin",
            reranker_model: RerankerModel::MiniLmL12,
            max_passage_length: 256,
            planning_mode: PlanningMode::Fixed {
                plan: CollectionPlan::single(ELEMENTS, 3),
            },
            strategy: RetrievalStrategy::Plain,
        }
    }

    /// Returns `true` when planning is delegated to the planner model.
    #[must_use]
    pub const fn is_llm_driven(&self) -> bool {
        matches!(self.planning_mode, PlanningMode::LlmDriven { .. })
    }

    fn llm_driven(name: ProfileName, depth_override: Option<usize>) -> Self {
        Self {
            label: name.label(),
            reranker_model: RerankerModel::MiniLmL12,
            max_passage_length: 512,
            planning_mode: PlanningMode::LlmDriven { depth_override },
            strategy: RetrievalStrategy::SelfQuery,
        }
    }
}
