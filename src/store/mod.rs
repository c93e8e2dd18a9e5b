//! Persistence contracts for the engine, plus the in-memory implementation
//! used by tests and embedders. The engine itself never touches storage;
//! the run controller goes through `DispatchStore` exclusively.

mod file;
mod memory;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::{Agent, AgentCounterDelta, Mission, Target};

#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Targets awaiting assignment: not assigned, not completed.
    async fn list_pending_targets(&self) -> Result<Vec<Target>>;

    /// Roster considered for distribution: active and not offline.
    async fn list_active_agents(&self) -> Result<Vec<Agent>>;

    async fn list_open_missions(&self) -> Result<Vec<Mission>>;

    async fn get_target(&self, id: &str) -> Result<Target>;
    async fn get_agent(&self, id: &str) -> Result<Agent>;
    async fn get_mission(&self, id: &str) -> Result<Mission>;

    /// A requeued (declined, now pending) mission for this target, if one
    /// exists. Reassignment continues that mission's audit history instead
    /// of opening a second record.
    async fn find_requeued_mission(&self, target_id: &str) -> Result<Option<Mission>>;

    /// Persist one run's output as a single logical transaction: the new
    /// missions, the per-agent counter deltas, and the assigned markers on
    /// the covered targets. All-or-nothing; a failure aborts the whole run.
    async fn commit_assignments(
        &self,
        missions: Vec<Mission>,
        deltas: Vec<AgentCounterDelta>,
    ) -> Result<()>;

    /// Persist the outcome of one lifecycle transition: the mission, the
    /// owning agent's counters, and the target's assignment marker.
    async fn save_transition(
        &self,
        mission: &Mission,
        agent: &Agent,
        target: &Target,
    ) -> Result<()>;

    async fn upsert_target(&self, target: Target) -> Result<()>;
    async fn upsert_agent(&self, agent: Agent) -> Result<()>;
}
