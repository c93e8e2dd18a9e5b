use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    // Ord follows declaration order: Urgent sorts first.
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
    Land,
    MixedUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Korean,
    English,
}

/// A property-tax-delinquent lead requiring an in-person field visit.
///
/// Owned by the lead workflow; the distribution engine only reads it and
/// flips the `assigned` marker. Once a mission against it completes, the
/// record is frozen and any follow-up visit gets a fresh target.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Target {
    pub id: String,
    pub coordinate: Coordinate,
    pub property_type: PropertyType,

    #[serde(default)]
    pub is_dangerous: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<Language>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,

    pub priority: PriorityTier,
    pub created_at: DateTime<Utc>,

    /// Set when an active mission references this target; cleared when that
    /// mission declines, fails, or is cancelled.
    #[serde(default)]
    pub assigned: bool,

    /// Set on mission completion; frozen targets never re-enter distribution.
    #[serde(default)]
    pub completed: bool,
}

impl Target {
    pub fn new(id: impl Into<String>, coordinate: Coordinate, property_type: PropertyType) -> Self {
        Self {
            id: id.into(),
            coordinate,
            property_type,
            is_dangerous: false,
            preferred_language: None,
            county: None,
            priority: PriorityTier::Medium,
            created_at: Utc::now(),
            assigned: false,
            completed: false,
        }
    }

    pub fn with_priority(mut self, priority: PriorityTier) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn dangerous(mut self) -> Self {
        self.is_dangerous = true;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.preferred_language = Some(language);
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        !self.assigned && !self.completed
    }
}
