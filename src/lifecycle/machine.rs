use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Unassigned, waiting for a distribution run. Declined missions return
    /// here so the target re-enters the next run.
    #[default]
    Pending,
    Assigned,
    EnRoute,
    OnSite,
    Completed,
    Declined,
    Failed,
    Cancelled,
}

impl MissionStatus {
    pub fn allowed_transitions(&self) -> &'static [MissionStatus] {
        use MissionStatus::*;
        match self {
            Pending => &[Assigned, Cancelled],
            Assigned => &[EnRoute, Declined, Failed, Cancelled],
            EnRoute => &[OnSite, Declined, Failed, Cancelled],
            // No declining once on-site; the visit either completes or fails.
            OnSite => &[Completed, Failed, Cancelled],
            Declined => &[Pending],
            Completed => &[],
            Failed => &[],
            Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: MissionStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MissionStatus::Completed | MissionStatus::Failed | MissionStatus::Cancelled
        )
    }

    /// Holding agent capacity: assigned or actively being worked.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            MissionStatus::Assigned | MissionStatus::EnRoute | MissionStatus::OnSite
        )
    }

    pub fn can_decline(&self) -> bool {
        matches!(self, MissionStatus::Assigned | MissionStatus::EnRoute)
    }

    pub fn allowed_transitions_display(&self) -> String {
        self.allowed_transitions()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::EnRoute => "en_route",
            Self::OnSite => "on_site",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusTransition {
    pub from: MissionStatus,
    pub to: MissionStatus,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl StatusTransition {
    pub fn new(from: MissionStatus, to: MissionStatus, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn at_time(
        from: MissionStatus,
        to: MissionStatus,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            at,
        }
    }
}
