use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::DispatchStore;
use crate::error::{DispatchError, Result};
use crate::lifecycle::MissionStatus;
use crate::model::{Agent, AgentCounterDelta, AgentStatus, Mission, Target};

/// In-memory store backed by `RwLock` maps. The substrate for tests and for
/// embedding the engine inside a host application that owns persistence.
#[derive(Default)]
pub struct MemoryStore {
    targets: RwLock<HashMap<String, Target>>,
    agents: RwLock<HashMap<String, Agent>>,
    missions: RwLock<HashMap<String, Mission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fleet(targets: Vec<Target>, agents: Vec<Agent>) -> Self {
        let store = Self::new();
        {
            let mut t = store.targets.write();
            for target in targets {
                t.insert(target.id.clone(), target);
            }
            let mut a = store.agents.write();
            for agent in agents {
                a.insert(agent.id.clone(), agent);
            }
        }
        store
    }

    pub fn mission_count(&self) -> usize {
        self.missions.read().len()
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn list_pending_targets(&self) -> Result<Vec<Target>> {
        let mut pending: Vec<Target> = self
            .targets
            .read()
            .values()
            .filter(|t| t.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pending)
    }

    async fn list_active_agents(&self) -> Result<Vec<Agent>> {
        let mut roster: Vec<Agent> = self
            .agents
            .read()
            .values()
            .filter(|a| a.active && a.status != AgentStatus::Offline)
            .cloned()
            .collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(roster)
    }

    async fn list_open_missions(&self) -> Result<Vec<Mission>> {
        let mut open: Vec<Mission> = self
            .missions
            .read()
            .values()
            .filter(|m| m.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(open)
    }

    async fn get_target(&self, id: &str) -> Result<Target> {
        self.targets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::TargetNotFound(id.to_string()))
    }

    async fn get_agent(&self, id: &str) -> Result<Agent> {
        self.agents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::AgentNotFound(id.to_string()))
    }

    async fn get_mission(&self, id: &str) -> Result<Mission> {
        self.missions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::MissionNotFound(id.to_string()))
    }

    async fn find_requeued_mission(&self, target_id: &str) -> Result<Option<Mission>> {
        Ok(self
            .missions
            .read()
            .values()
            .find(|m| m.target_id == target_id && m.status == MissionStatus::Pending)
            .cloned())
    }

    async fn commit_assignments(
        &self,
        missions: Vec<Mission>,
        deltas: Vec<AgentCounterDelta>,
    ) -> Result<()> {
        // All maps locked for the whole commit so no reader observes a
        // half-applied run.
        let mut target_map = self.targets.write();
        let mut agent_map = self.agents.write();
        let mut mission_map = self.missions.write();

        for delta in &deltas {
            let agent = agent_map
                .get_mut(&delta.agent_id)
                .ok_or_else(|| DispatchError::AgentNotFound(delta.agent_id.clone()))?;
            agent.active_missions += delta.new_missions;
        }
        for mission in missions {
            if let Some(target) = target_map.get_mut(&mission.target_id) {
                target.assigned = true;
            }
            mission_map.insert(mission.id.clone(), mission);
        }
        Ok(())
    }

    async fn save_transition(
        &self,
        mission: &Mission,
        agent: &Agent,
        target: &Target,
    ) -> Result<()> {
        self.missions
            .write()
            .insert(mission.id.clone(), mission.clone());
        self.agents.write().insert(agent.id.clone(), agent.clone());
        self.targets
            .write()
            .insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn upsert_target(&self, target: Target) -> Result<()> {
        self.targets.write().insert(target.id.clone(), target);
        Ok(())
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<()> {
        self.agents.write().insert(agent.id.clone(), agent);
        Ok(())
    }
}
