use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::target::{Language, PropertyType};
use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Available,
    Busy,
    Offline,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

/// What contact languages an agent can work in. `Both` accepts any target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LanguagePreference {
    Korean,
    English,
    #[default]
    Both,
}

impl LanguagePreference {
    pub fn accepts(&self, target_language: Option<Language>) -> bool {
        match (self, target_language) {
            (Self::Both, _) | (_, None) => true,
            (Self::Korean, Some(Language::Korean)) => true,
            (Self::English, Some(Language::English)) => true,
            _ => false,
        }
    }
}

/// A field operative. Never deleted, only deactivated; cumulative counters
/// survive deactivation for audit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,

    pub coordinate: Coordinate,
    pub location_updated_at: DateTime<Utc>,

    /// Kilometers the agent is willing to travel to a target.
    pub max_radius_km: f64,
    /// Max concurrent open missions.
    pub max_hold: u32,
    /// Monthly decline quota.
    pub max_decline: u32,
    /// Max new missions per distribution run, a proxy for route density.
    pub optimal_route_points: u32,
    /// Max concurrent authenticated field devices. Carried from the roster
    /// schema; nothing in the engine consumes it yet (the intended capacity
    /// semantics are unconfirmed upstream).
    pub devices_allowed: u32,

    #[serde(default)]
    pub missions_completed: u32,
    #[serde(default)]
    pub missions_failed: u32,
    #[serde(default)]
    pub missions_declined: u32,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub average_completion_minutes: f64,

    #[serde(default)]
    pub monthly_declines: u32,
    pub last_decline_reset: DateTime<Utc>,

    #[serde(default)]
    pub active_missions: u32,
    #[serde(default)]
    pub missions_on_hold: u32,

    /// Empty list accepts all property types.
    #[serde(default)]
    pub property_type_filters: Vec<PropertyType>,
    #[serde(default)]
    pub language_preference: LanguagePreference,
    #[serde(default)]
    pub handles_dangerous: bool,

    /// County/city allow-list. Advisory only: a scoring bonus, never a hard
    /// filter, so under-covered areas are not starved.
    #[serde(default)]
    pub territory_preference: Vec<String>,

    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, coordinate: Coordinate) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            status: AgentStatus::Available,
            coordinate,
            location_updated_at: now,
            max_radius_km: 20.0,
            max_hold: 5,
            max_decline: 3,
            optimal_route_points: 4,
            devices_allowed: 1,
            missions_completed: 0,
            missions_failed: 0,
            missions_declined: 0,
            success_rate: 0.0,
            average_completion_minutes: 0.0,
            monthly_declines: 0,
            last_decline_reset: now,
            active_missions: 0,
            missions_on_hold: 0,
            property_type_filters: Vec::new(),
            language_preference: LanguagePreference::Both,
            handles_dangerous: false,
            territory_preference: Vec::new(),
            active: true,
        }
    }

    pub fn remaining_hold_capacity(&self) -> u32 {
        self.max_hold.saturating_sub(self.active_missions)
    }

    /// Lazily zero the monthly decline counter when `now` falls in a later
    /// calendar month than the stored reset marker. No background timer.
    pub fn roll_decline_window(&mut self, now: DateTime<Utc>) {
        let stored = (self.last_decline_reset.year(), self.last_decline_reset.month());
        if (now.year(), now.month()) > stored {
            self.monthly_declines = 0;
            self.last_decline_reset = now;
        }
    }

    pub fn decline_quota_exhausted(&mut self, now: DateTime<Utc>) -> bool {
        self.roll_decline_window(now);
        self.monthly_declines >= self.max_decline
    }

    pub fn record_completion(&mut self, completion_minutes: f64) {
        self.missions_completed += 1;
        self.active_missions = self.active_missions.saturating_sub(1);
        self.recompute_success_rate();

        // Running mean over completed missions.
        let n = self.missions_completed as f64;
        self.average_completion_minutes =
            self.average_completion_minutes + (completion_minutes - self.average_completion_minutes) / n;
    }

    pub fn record_failure(&mut self) {
        self.missions_failed += 1;
        self.active_missions = self.active_missions.saturating_sub(1);
        self.recompute_success_rate();
    }

    pub fn record_decline(&mut self, now: DateTime<Utc>) {
        self.roll_decline_window(now);
        self.monthly_declines += 1;
        self.missions_declined += 1;
        self.active_missions = self.active_missions.saturating_sub(1);
    }

    pub fn release_capacity(&mut self) {
        self.active_missions = self.active_missions.saturating_sub(1);
    }

    fn recompute_success_rate(&mut self) {
        let attempts = self.missions_completed + self.missions_failed;
        self.success_rate = if attempts == 0 {
            0.0
        } else {
            self.missions_completed as f64 / attempts as f64
        };
    }
}
