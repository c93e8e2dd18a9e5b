use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use fieldops::config::DispatchConfig;
use fieldops::geo::Coordinate;
use fieldops::lifecycle::{MissionStatus, StatusUpdate};
use fieldops::model::{Agent, PropertyType, Target};
use fieldops::run::DistributionRunController;
use fieldops::store::{DispatchStore, FileStore};

async fn seeded_store(dir: &TempDir) -> FileStore {
    let store = FileStore::new(dir.path());
    store.init().await.unwrap();

    let mut agent = Agent::new("a-1", "Jung", Coordinate::new(37.00, 127.02));
    agent.max_radius_km = 15.0;
    store.upsert_agent(agent).await.unwrap();
    store
        .upsert_target(Target::new(
            "t-1",
            Coordinate::new(37.00, 127.00),
            PropertyType::Land,
        ))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn run_and_status_updates_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();

    let mission_id = {
        let store: Arc<dyn DispatchStore> = Arc::new(seeded_store(&dir).await);
        let ctl = DistributionRunController::new(Arc::clone(&store), &DispatchConfig::default());

        let report = ctl.distribute(now).await.unwrap();
        assert_eq!(report.assigned, 1);
        let id = report.assignments[0].mission_id.clone();

        ctl.update_mission_status(&id, StatusUpdate::new(MissionStatus::EnRoute), now)
            .await
            .unwrap();
        id
    };

    // Reopen the directory fresh: everything was persisted.
    let reopened = FileStore::new(dir.path());
    assert!(reopened.is_initialized());

    let mission = reopened.get_mission(&mission_id).await.unwrap();
    assert_eq!(mission.status, MissionStatus::EnRoute);
    assert_eq!(mission.target_id, "t-1");

    let agent = reopened.get_agent("a-1").await.unwrap();
    assert_eq!(agent.active_missions, 1);

    let pending = reopened.list_pending_targets().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn interrupted_writes_are_swept_on_init() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    drop(store);

    let orphan = dir.path().join("missions").join("m-broken.yaml.tmp");
    tokio::fs::write(&orphan, "partial").await.unwrap();

    let store = FileStore::new(dir.path());
    store.init().await.unwrap();
    assert!(!orphan.exists());

    // The sweep never touches committed documents.
    assert!(store.get_agent("a-1").await.is_ok());
}

#[tokio::test]
async fn init_releases_target_stranded_by_interrupted_commit() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;

    // A commit that died between document writes: the target carries the
    // assigned marker but no mission record exists for it.
    let mut stranded = store.get_target("t-1").await.unwrap();
    stranded.assigned = true;
    store.upsert_target(stranded).await.unwrap();
    assert!(store.list_pending_targets().await.unwrap().is_empty());

    let store = FileStore::new(dir.path());
    store.init().await.unwrap();

    let pending = store.list_pending_targets().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "t-1");
}

#[tokio::test]
async fn init_keeps_markers_backed_by_active_missions() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();

    {
        let store: Arc<dyn DispatchStore> = Arc::new(seeded_store(&dir).await);
        let ctl = DistributionRunController::new(Arc::clone(&store), &DispatchConfig::default());
        let report = ctl.distribute(now).await.unwrap();
        assert_eq!(report.assigned, 1);
    }

    // Re-init must not release a target whose mission is live.
    let store = FileStore::new(dir.path());
    store.init().await.unwrap();

    assert!(store.list_pending_targets().await.unwrap().is_empty());
    let target = store.get_target("t-1").await.unwrap();
    assert!(target.assigned);
}

#[tokio::test]
async fn unknown_mission_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let err = store.get_mission("no-such-mission").await.unwrap_err();
    assert!(matches!(err, fieldops::DispatchError::MissionNotFound(_)));
}

#[tokio::test]
async fn config_round_trips_through_data_dir() {
    let dir = TempDir::new().unwrap();
    let mut config = DispatchConfig::default();
    config.engine.deadline_hours = 48;
    config.save(dir.path()).await.unwrap();

    let loaded = DispatchConfig::load(dir.path()).await.unwrap();
    assert_eq!(loaded.engine.deadline_hours, 48);
}
