//! Mission lifecycle: the state machine and the bookkeeping each transition
//! carries (capacity release, decline quota, success-rate recompute).

mod machine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use machine::{MissionStatus, StatusTransition};

use crate::error::{DispatchError, Result};
use crate::model::{Agent, Mission, Target};

/// A requested status change, as posted by a field device or an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: MissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: MissionStatus) -> Self {
        Self { status, notes: None }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

pub struct MissionLifecycle;

impl MissionLifecycle {
    /// Validate and apply one status update. Invalid transitions are rejected
    /// before any state is touched; declines and failures are business
    /// outcomes and always leave an audit trail in the mission history.
    pub fn apply(
        mission: &mut Mission,
        agent: &mut Agent,
        target: &mut Target,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let from = mission.status;
        let to = update.status;

        if !from.can_transition_to(to) {
            return Err(DispatchError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                allowed: from.allowed_transitions_display(),
            });
        }

        match to {
            MissionStatus::Completed => Self::complete(mission, agent, target, update, now)?,
            MissionStatus::Declined => Self::decline(mission, agent, target, update, now),
            MissionStatus::Failed => Self::fail(mission, agent, target, update, now),
            MissionStatus::Cancelled => Self::cancel(mission, agent, target, update, now),
            _ => {
                mission
                    .status_history
                    .push(StatusTransition::at_time(from, to, describe(&update), now));
                mission.status = to;
                debug!(mission = %mission.id, %from, %to, "Mission status updated");
            }
        }
        Ok(())
    }

    fn complete(
        mission: &mut Mission,
        agent: &mut Agent,
        target: &mut Target,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let notes = match update.notes.as_deref() {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => {
                return Err(DispatchError::MissingTransitionField {
                    status: MissionStatus::Completed.to_string(),
                    field: "completion_notes".to_string(),
                });
            }
        };

        let from = mission.status;
        mission
            .status_history
            .push(StatusTransition::at_time(from, MissionStatus::Completed, &notes, now));
        mission.status = MissionStatus::Completed;
        mission.completed_at = Some(now);
        mission.completion_notes = Some(notes);

        let minutes = (now - mission.assigned_at).num_seconds().max(0) as f64 / 60.0;
        agent.record_completion(minutes);

        // Completed targets are frozen; follow-up visits create a new target.
        target.completed = true;

        info!(
            mission = %mission.id,
            agent = %agent.id,
            target = %target.id,
            minutes = format!("{minutes:.1}"),
            "Mission completed"
        );
        Ok(())
    }

    fn decline(
        mission: &mut Mission,
        agent: &mut Agent,
        target: &mut Target,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) {
        let from = mission.status;
        let reason = update.notes.unwrap_or_else(|| "declined by agent".to_string());

        mission
            .status_history
            .push(StatusTransition::at_time(from, MissionStatus::Declined, &reason, now));
        // Requeue immediately: the mission re-enters the next distribution
        // run, carrying its history. Never silently dropped.
        mission.status_history.push(StatusTransition::at_time(
            MissionStatus::Declined,
            MissionStatus::Pending,
            "requeued after decline",
            now,
        ));
        mission.status = MissionStatus::Pending;
        mission.decline_reason = Some(reason);

        agent.record_decline(now);
        // Original priority and created_at are untouched, so the target keeps
        // rising to the front of subsequent runs instead of starving.
        target.assigned = false;

        if agent.monthly_declines >= agent.max_decline {
            warn!(
                agent = %agent.id,
                declines = agent.monthly_declines,
                quota = agent.max_decline,
                "Agent reached monthly decline quota; excluded until window resets"
            );
        }
        info!(mission = %mission.id, agent = %agent.id, target = %target.id, "Mission declined, target requeued");
    }

    fn fail(
        mission: &mut Mission,
        agent: &mut Agent,
        target: &mut Target,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) {
        let from = mission.status;
        let reason = update.notes.unwrap_or_else(|| "deadline exceeded".to_string());
        mission
            .status_history
            .push(StatusTransition::at_time(from, MissionStatus::Failed, &reason, now));
        mission.status = MissionStatus::Failed;

        // Lowers success_rate; no decline-quota charge.
        agent.record_failure();
        target.assigned = false;

        info!(mission = %mission.id, agent = %agent.id, target = %target.id, "Mission failed");
    }

    fn cancel(
        mission: &mut Mission,
        agent: &mut Agent,
        target: &mut Target,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) {
        let from = mission.status;
        let reason = update.notes.unwrap_or_else(|| "cancelled by operator".to_string());
        mission
            .status_history
            .push(StatusTransition::at_time(from, MissionStatus::Cancelled, &reason, now));
        mission.status = MissionStatus::Cancelled;

        // Administrative override: capacity released, no counter penalty.
        if from.is_active() {
            agent.release_capacity();
        }
        target.assigned = false;

        info!(mission = %mission.id, agent = %agent.id, "Mission cancelled");
    }

    /// Ids of open missions past their deadline. The caller applies the
    /// `failed` transition for each with the owning agent and target loaded.
    pub fn expire_overdue<'a, I>(missions: I, now: DateTime<Utc>) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Mission>,
    {
        missions
            .into_iter()
            .filter(|m| m.is_overdue(now) && m.status.can_transition_to(MissionStatus::Failed))
            .map(|m| m.id.clone())
            .collect()
    }
}

fn describe(update: &StatusUpdate) -> String {
    update
        .notes
        .clone()
        .unwrap_or_else(|| format!("status update to {}", update.status))
}
