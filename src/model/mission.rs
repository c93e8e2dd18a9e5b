use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::target::PriorityTier;
use crate::lifecycle::{MissionStatus, StatusTransition};

/// One target assigned to one agent, with its own lifecycle. Created by the
/// assignment engine in `assigned` state; owned by the lifecycle thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Mission {
    pub id: String,
    pub target_id: String,
    pub agent_id: String,
    pub status: MissionStatus,
    pub priority: PriorityTier,

    /// Agent-to-target distance at assignment time, kilometers.
    pub distance_km: f64,
    pub estimated_duration_minutes: f64,

    pub assigned_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,

    #[serde(default)]
    pub status_history: Vec<StatusTransition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

impl Mission {
    pub fn new(
        target_id: impl Into<String>,
        agent_id: impl Into<String>,
        priority: PriorityTier,
        distance_km: f64,
        estimated_duration_minutes: f64,
        assigned_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_id: target_id.into(),
            agent_id: agent_id.into(),
            status: MissionStatus::Assigned,
            priority,
            distance_km,
            estimated_duration_minutes,
            assigned_at,
            deadline,
            status_history: vec![StatusTransition::at_time(
                MissionStatus::Pending,
                MissionStatus::Assigned,
                "assigned by distribution run",
                assigned_at,
            )],
            completed_at: None,
            completion_notes: None,
            decline_reason: None,
        }
    }

    /// Continue a requeued (declined) mission's identity and audit history
    /// instead of opening a second record for the same target.
    pub fn inherit_from(mut self, prior: Mission) -> Self {
        self.id = prior.id;
        let mut history = prior.status_history;
        history.append(&mut self.status_history);
        self.status_history = history;
        self
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal() && self.status != MissionStatus::Declined
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        // Only missions an agent is actually holding can expire; a requeued
        // pending mission waits for the next run instead.
        self.status.is_active() && now > self.deadline
    }
}

/// Counter adjustments for one agent produced by a single distribution run.
/// The controller persists these together with the new missions in one
/// logical transaction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentCounterDelta {
    pub agent_id: String,
    /// New missions assigned this run; added to `active_missions`.
    pub new_missions: u32,
}
