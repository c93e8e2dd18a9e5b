use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::debug;

use super::DispatchStore;
use crate::error::{DispatchError, Result};
use crate::lifecycle::MissionStatus;
use crate::model::{Agent, AgentCounterDelta, AgentStatus, Mission, Target};

/// YAML-document store: one file per record under `agents/`, `targets/`,
/// and `missions/`. Writes are atomic (temp file, fsync, rename) and
/// interrupted writes are swept on init.
pub struct FileStore {
    agents_dir: PathBuf,
    targets_dir: PathBuf,
    missions_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            agents_dir: data_dir.join("agents"),
            targets_dir: data_dir.join("targets"),
            missions_dir: data_dir.join("missions"),
        }
    }

    pub async fn init(&self) -> Result<()> {
        for dir in [&self.agents_dir, &self.targets_dir, &self.missions_dir] {
            fs::create_dir_all(dir).await?;
            self.recover_interrupted_writes(dir).await;
        }
        self.reconcile_stranded_targets().await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.agents_dir.exists() && self.targets_dir.exists() && self.missions_dir.exists()
    }

    /// Clear `assigned` markers on targets no active mission references.
    /// A commit that failed between document writes can leave such a marker
    /// behind; without this sweep the target would never return to the
    /// pending pool.
    async fn reconcile_stranded_targets(&self) -> Result<()> {
        let missions: Vec<Mission> = self.read_all(&self.missions_dir).await?;
        let covered: HashSet<&str> = missions
            .iter()
            .filter(|m| m.status.is_active())
            .map(|m| m.target_id.as_str())
            .collect();

        let targets: Vec<Target> = self.read_all(&self.targets_dir).await?;
        for mut target in targets {
            if target.assigned && !target.completed && !covered.contains(target.id.as_str()) {
                tracing::warn!(target = %target.id, "Releasing assigned marker with no active mission");
                target.assigned = false;
                self.write_doc(&self.targets_dir, &target.id, &target).await?;
            }
        }
        Ok(())
    }

    async fn recover_interrupted_writes(&self, dir: &Path) {
        if let Ok(mut entries) = fs::read_dir(dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    debug!(path = %path.display(), "Removing interrupted write");
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
    }

    async fn write_doc<T: Serialize>(&self, dir: &Path, id: &str, value: &T) -> Result<()> {
        let path = dir.join(format!("{id}.yaml"));
        let tmp_path = path.with_extension("yaml.tmp");
        let content = serde_yaml_bw::to_string(value)?;

        fs::write(&tmp_path, content).await?;

        let tmp_for_sync = tmp_path.clone();
        let sync_result = tokio::task::spawn_blocking(move || {
            std::fs::File::open(&tmp_for_sync).and_then(|file| file.sync_all())
        })
        .await;
        match sync_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to sync temp file to disk"),
            Err(e) => tracing::warn!(error = %e, "Sync task failed"),
        }

        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn read_doc<T: DeserializeOwned>(&self, dir: &Path, id: &str) -> Result<Option<T>> {
        let path = dir.join(format!("{id}.yaml"));
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_yaml_bw::from_str(&content)?))
    }

    async fn read_all<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut records = Vec::new();
        if !dir.exists() {
            return Err(DispatchError::NotInitialized);
        }
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                let content = fs::read_to_string(&path).await?;
                match serde_yaml_bw::from_str(&content) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document")
                    }
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl DispatchStore for FileStore {
    async fn list_pending_targets(&self) -> Result<Vec<Target>> {
        let mut targets: Vec<Target> = self.read_all(&self.targets_dir).await?;
        targets.retain(|t: &Target| t.is_pending());
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(targets)
    }

    async fn list_active_agents(&self) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self.read_all(&self.agents_dir).await?;
        agents.retain(|a: &Agent| a.active && a.status != AgentStatus::Offline);
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn list_open_missions(&self) -> Result<Vec<Mission>> {
        let mut missions: Vec<Mission> = self.read_all(&self.missions_dir).await?;
        missions.retain(|m: &Mission| m.is_open());
        missions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(missions)
    }

    async fn get_target(&self, id: &str) -> Result<Target> {
        self.read_doc(&self.targets_dir, id)
            .await?
            .ok_or_else(|| DispatchError::TargetNotFound(id.to_string()))
    }

    async fn get_agent(&self, id: &str) -> Result<Agent> {
        self.read_doc(&self.agents_dir, id)
            .await?
            .ok_or_else(|| DispatchError::AgentNotFound(id.to_string()))
    }

    async fn get_mission(&self, id: &str) -> Result<Mission> {
        self.read_doc(&self.missions_dir, id)
            .await?
            .ok_or_else(|| DispatchError::MissionNotFound(id.to_string()))
    }

    async fn find_requeued_mission(&self, target_id: &str) -> Result<Option<Mission>> {
        let missions: Vec<Mission> = self.read_all(&self.missions_dir).await?;
        Ok(missions
            .into_iter()
            .find(|m| m.target_id == target_id && m.status == MissionStatus::Pending))
    }

    async fn commit_assignments(
        &self,
        missions: Vec<Mission>,
        deltas: Vec<AgentCounterDelta>,
    ) -> Result<()> {
        // Write order matters for crash recovery: mission documents first,
        // then target markers, agent deltas last. An orphaned mission is
        // recoverable (the expire sweep fails it, undercounted deltas
        // saturate on release), while a target marked assigned with no
        // mission record would be stranded; `init` reconciles any marker
        // left behind by a commit that failed partway.
        for mission in &missions {
            self.write_doc(&self.missions_dir, &mission.id, mission).await?;
        }
        for mission in &missions {
            if let Ok(mut target) = self.get_target(&mission.target_id).await {
                target.assigned = true;
                self.write_doc(&self.targets_dir, &target.id, &target).await?;
            }
        }
        for delta in &deltas {
            let mut agent = self.get_agent(&delta.agent_id).await?;
            agent.active_missions += delta.new_missions;
            self.write_doc(&self.agents_dir, &agent.id, &agent).await?;
        }
        Ok(())
    }

    async fn save_transition(
        &self,
        mission: &Mission,
        agent: &Agent,
        target: &Target,
    ) -> Result<()> {
        self.write_doc(&self.missions_dir, &mission.id, mission).await?;
        self.write_doc(&self.agents_dir, &agent.id, agent).await?;
        self.write_doc(&self.targets_dir, &target.id, target).await?;
        Ok(())
    }

    async fn upsert_target(&self, target: Target) -> Result<()> {
        self.write_doc(&self.targets_dir, &target.id, &target).await
    }

    async fn upsert_agent(&self, agent: Agent) -> Result<()> {
        self.write_doc(&self.agents_dir, &agent.id, &agent).await
    }
}
