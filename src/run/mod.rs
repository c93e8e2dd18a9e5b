//! The outward-facing orchestrator: serializes distribution runs, snapshots
//! state through the store, delegates to the engine, and commits the result
//! as one logical transaction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::DispatchConfig;
use crate::engine::{AssignmentEngine, ScoringModel, UnassignedTarget};
use crate::error::{DispatchError, Result};
use crate::lifecycle::{MissionLifecycle, MissionStatus, StatusUpdate};
use crate::model::Mission;
use crate::store::DispatchStore;

/// One assignment in the run report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssignmentSummary {
    pub mission_id: String,
    pub target_id: String,
    pub agent_id: String,
    pub distance_km: f64,
    pub deadline: DateTime<Utc>,
}

/// Per-agent load after the run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentLoad {
    pub agent_id: String,
    pub new_missions: u32,
    pub active_missions: u32,
}

/// What one `distribute()` call did. Returned to the caller; not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub targets_considered: usize,
    pub agents_considered: usize,
    pub assigned: usize,
    pub assignments: Vec<AssignmentSummary>,
    pub unassigned: Vec<UnassignedTarget>,
    pub agent_loads: Vec<AgentLoad>,
}

/// Serializes whole runs. Guard resets the flag on drop, so an aborted run
/// never wedges the controller.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DispatchError::RunInProgress);
        }
        Ok(Self { flag: Arc::clone(flag) })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct DistributionRunController {
    store: Arc<dyn DispatchStore>,
    engine: AssignmentEngine,
    run_in_progress: Arc<AtomicBool>,
}

impl DistributionRunController {
    pub fn new(store: Arc<dyn DispatchStore>, config: &DispatchConfig) -> Self {
        Self {
            store,
            engine: AssignmentEngine::new(
                ScoringModel::new(config.scoring),
                config.engine.clone(),
            ),
            run_in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trigger one distribution run. At most one run executes at a time;
    /// concurrent triggers get `RunInProgress` instead of interleaving.
    pub async fn distribute(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let _guard = RunGuard::acquire(&self.run_in_progress)?;

        // Consistent snapshot at run start; capacity decisions are made on
        // this copy and committed in one write below.
        let targets = self.store.list_pending_targets().await?;
        let mut agents = self.store.list_active_agents().await?;

        info!(
            targets = targets.len(),
            agents = agents.len(),
            "Starting distribution run"
        );

        let run = self.engine.run(&targets, &mut agents, now)?;

        // Declined-and-requeued missions keep their identity across
        // reassignment so the audit trail stays on one record.
        let mut missions = Vec::with_capacity(run.missions.len());
        for mission in run.missions {
            match self.store.find_requeued_mission(&mission.target_id).await? {
                Some(prior) => missions.push(mission.inherit_from(prior)),
                None => missions.push(mission),
            }
        }

        if let Err(e) = self
            .store
            .commit_assignments(missions.clone(), run.deltas.clone())
            .await
        {
            // Abort the whole run; nothing from it is observable.
            error!(error = %e, "Commit failed; distribution run aborted");
            return Err(DispatchError::Persistence(e.to_string()));
        }

        let agent_loads = run
            .deltas
            .iter()
            .map(|delta| AgentLoad {
                agent_id: delta.agent_id.clone(),
                new_missions: delta.new_missions,
                active_missions: agents
                    .iter()
                    .find(|a| a.id == delta.agent_id)
                    .map(|a| a.active_missions)
                    .unwrap_or(delta.new_missions),
            })
            .collect();

        Ok(RunReport {
            started_at: run.started_at,
            targets_considered: run.targets_considered,
            agents_considered: run.agents_considered,
            assigned: missions.len(),
            assignments: missions
                .iter()
                .map(|m| AssignmentSummary {
                    mission_id: m.id.clone(),
                    target_id: m.target_id.clone(),
                    agent_id: m.agent_id.clone(),
                    distance_km: m.distance_km,
                    deadline: m.deadline,
                })
                .collect(),
            unassigned: run.unassigned,
            agent_loads,
        })
    }

    /// Apply a posted status update to a mission, validating the transition
    /// before anything is written. The `POST /missions/{id}/status`
    /// counterpart.
    pub async fn update_mission_status(
        &self,
        mission_id: &str,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Mission> {
        let mut mission = self.store.get_mission(mission_id).await?;
        let mut agent = self.store.get_agent(&mission.agent_id).await?;
        let mut target = self.store.get_target(&mission.target_id).await?;

        MissionLifecycle::apply(&mut mission, &mut agent, &mut target, update, now)?;
        self.store.save_transition(&mission, &agent, &target).await?;
        Ok(mission)
    }

    /// Fail every open mission past its deadline. Returns the failed ids.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let open = self.store.list_open_missions().await?;
        let overdue = MissionLifecycle::expire_overdue(open.iter(), now);

        let mut failed = Vec::with_capacity(overdue.len());
        for id in overdue {
            self.update_mission_status(
                &id,
                StatusUpdate::new(MissionStatus::Failed).with_notes("deadline exceeded"),
                now,
            )
            .await?;
            failed.push(id);
        }
        Ok(failed)
    }
}
