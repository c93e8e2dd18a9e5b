use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use fieldops::config::DispatchConfig;
use fieldops::geo::Coordinate;
use fieldops::lifecycle::{MissionStatus, StatusUpdate};
use fieldops::model::{Agent, PriorityTier, PropertyType, Target};
use fieldops::run::DistributionRunController;
use fieldops::store::{DispatchStore, MemoryStore};
use fieldops::{DispatchError, RejectionReason};

fn controller(store: Arc<MemoryStore>) -> DistributionRunController {
    DistributionRunController::new(store, &DispatchConfig::default())
}

fn target(id: &str, lat: f64, lon: f64) -> Target {
    Target::new(id, Coordinate::new(lat, lon), PropertyType::Residential)
}

fn agent(id: &str, lat: f64, lon: f64) -> Agent {
    let mut a = Agent::new(id, id, Coordinate::new(lat, lon));
    a.max_radius_km = 20.0;
    a.max_hold = 5;
    a.max_decline = 3;
    a.optimal_route_points = 4;
    a
}

/// Deterministic generator for the randomized invariant suites.
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn in_range(&mut self, lo: u32, hi: u32) -> u32 {
        lo + self.next_u32() % (hi - lo + 1)
    }

    fn chance(&mut self, percent: u32) -> bool {
        self.next_u32() % 100 < percent
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        (self.next_u32() % 1000) as f64 / 1000.0 * scale - scale / 2.0
    }
}

fn random_fleet(rng: &mut Lcg, n_targets: usize, n_agents: usize) -> (Vec<Target>, Vec<Agent>) {
    let property_types = [
        PropertyType::Residential,
        PropertyType::Commercial,
        PropertyType::Industrial,
        PropertyType::Land,
        PropertyType::MixedUse,
    ];
    let tiers = [
        PriorityTier::Urgent,
        PriorityTier::High,
        PriorityTier::Medium,
        PriorityTier::Low,
    ];

    let targets = (0..n_targets)
        .map(|i| {
            let mut t = Target::new(
                format!("t-{i:04}"),
                Coordinate::new(37.0 + rng.jitter(0.4), 127.0 + rng.jitter(0.4)),
                property_types[rng.in_range(0, 4) as usize],
            )
            .with_priority(tiers[rng.in_range(0, 3) as usize]);
            if rng.chance(20) {
                t = t.dangerous();
            }
            t
        })
        .collect();

    let agents = (0..n_agents)
        .map(|i| {
            let mut a = agent(
                &format!("a-{i:03}"),
                37.0 + rng.jitter(0.4),
                127.0 + rng.jitter(0.4),
            );
            a.max_radius_km = rng.in_range(5, 40) as f64;
            a.max_hold = rng.in_range(1, 6);
            a.optimal_route_points = rng.in_range(1, 5);
            a.active_missions = rng.in_range(0, a.max_hold);
            a.handles_dangerous = rng.chance(40);
            a.success_rate = rng.in_range(0, 100) as f64 / 100.0;
            a
        })
        .collect();

    (targets, agents)
}

#[tokio::test]
async fn max_hold_never_exceeded_across_random_fleets() {
    for seed in 1..=20u64 {
        let mut rng = Lcg::new(seed);
        let (targets, agents) = random_fleet(&mut rng, 120, 12);
        let store = Arc::new(MemoryStore::with_fleet(targets, agents));
        let ctl = controller(Arc::clone(&store));

        ctl.distribute(Utc::now()).await.unwrap();

        for agent in store.list_active_agents().await.unwrap() {
            assert!(
                agent.active_missions <= agent.max_hold,
                "seed {seed}: agent {} at {}/{}",
                agent.id,
                agent.active_missions,
                agent.max_hold
            );
        }
    }
}

#[tokio::test]
async fn dangerous_targets_never_reach_unqualified_agents() {
    for seed in 100..=119u64 {
        let mut rng = Lcg::new(seed);
        let (targets, agents) = random_fleet(&mut rng, 80, 10);
        let store = Arc::new(MemoryStore::with_fleet(targets, agents));
        let ctl = controller(Arc::clone(&store));

        let report = ctl.distribute(Utc::now()).await.unwrap();

        for assignment in &report.assignments {
            let target = store.get_target(&assignment.target_id).await.unwrap();
            if target.is_dangerous {
                let agent = store.get_agent(&assignment.agent_id).await.unwrap();
                assert!(
                    agent.handles_dangerous,
                    "seed {seed}: dangerous target {} assigned to unqualified agent {}",
                    target.id, agent.id
                );
            }
        }
    }
}

#[tokio::test]
async fn route_budget_bounds_missions_per_agent_per_run() {
    for seed in 200..=209u64 {
        let mut rng = Lcg::new(seed);
        let (targets, agents) = random_fleet(&mut rng, 100, 8);
        let store = Arc::new(MemoryStore::with_fleet(targets, agents));
        let ctl = controller(Arc::clone(&store));

        let report = ctl.distribute(Utc::now()).await.unwrap();

        for load in &report.agent_loads {
            let agent = store.get_agent(&load.agent_id).await.unwrap();
            assert!(
                load.new_missions <= agent.optimal_route_points,
                "seed {seed}: agent {} got {} missions, budget {}",
                agent.id,
                load.new_missions,
                agent.optimal_route_points
            );
        }
    }
}

#[tokio::test]
async fn dangerous_target_prefers_qualified_agent_over_closer_unqualified() {
    // Agent A: 15 km radius, hold 5, handles dangerous, 2 active missions.
    // Agent B: 10 km radius, hold 3, no dangerous, idle. Target is dangerous
    // and ~7 km from both; it must go to A, never B.
    let t = target("t-danger", 37.000, 127.000).dangerous();
    let mut a = agent("agent-a", 37.063, 127.000);
    a.max_radius_km = 15.0;
    a.max_hold = 5;
    a.handles_dangerous = true;
    a.active_missions = 2;
    let mut b = agent("agent-b", 36.937, 127.000);
    b.max_radius_km = 10.0;
    b.max_hold = 3;
    b.handles_dangerous = false;

    let store = Arc::new(MemoryStore::with_fleet(vec![t], vec![a, b]));
    let ctl = controller(Arc::clone(&store));

    let report = ctl.distribute(Utc::now()).await.unwrap();
    assert_eq!(report.assigned, 1);
    assert_eq!(report.assignments[0].agent_id, "agent-a");
    assert!(report.assignments[0].distance_km > 6.0 && report.assignments[0].distance_km < 8.0);
}

#[tokio::test]
async fn urgent_target_wins_sole_agent_regardless_of_creation_order() {
    let now = Utc::now();
    let old_low = target("t-low", 37.00, 127.00)
        .with_priority(PriorityTier::Low)
        .with_created_at(now - Duration::hours(8));
    let new_urgent = target("t-urgent", 37.00, 127.00)
        .with_priority(PriorityTier::Urgent)
        .with_created_at(now);

    let mut sole = agent("a-sole", 37.00, 127.01);
    sole.max_hold = 1;

    let store = Arc::new(MemoryStore::with_fleet(vec![old_low, new_urgent], vec![sole]));
    let ctl = controller(Arc::clone(&store));

    let report = ctl.distribute(now).await.unwrap();
    assert_eq!(report.assigned, 1);
    assert_eq!(report.assignments[0].target_id, "t-urgent");
    assert_eq!(report.unassigned.len(), 1);
    assert_eq!(report.unassigned[0].target_id, "t-low");
}

#[tokio::test]
async fn second_run_is_empty_when_nothing_changed() {
    let targets = vec![
        target("t-1", 37.00, 127.00),
        target("t-2", 37.01, 127.00),
        // Out of everyone's range; stays unassigned with the same reason.
        target("t-far", 39.50, 127.00),
    ];
    let agents = vec![agent("a-1", 37.00, 127.01), agent("a-2", 37.01, 127.01)];
    let store = Arc::new(MemoryStore::with_fleet(targets, agents));
    let ctl = controller(Arc::clone(&store));
    let now = Utc::now();

    let first = ctl.distribute(now).await.unwrap();
    assert_eq!(first.assigned, 2);
    assert_eq!(first.unassigned.len(), 1);
    assert_eq!(first.unassigned[0].reason, RejectionReason::OutOfRange);

    let second = ctl.distribute(now).await.unwrap();
    assert_eq!(second.assigned, 0);
    assert_eq!(second.unassigned.len(), 1);
    assert_eq!(second.unassigned[0].target_id, "t-far");
    assert_eq!(second.unassigned[0].reason, RejectionReason::OutOfRange);
}

#[tokio::test]
async fn exhausted_decline_quota_excludes_agent_until_reset() {
    let jan = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();

    let mut quota_spent = agent("a-spent", 37.00, 127.01);
    quota_spent.monthly_declines = 3;
    quota_spent.max_decline = 3;
    quota_spent.last_decline_reset = jan;
    // Make it otherwise the obvious choice.
    quota_spent.success_rate = 1.0;

    let store = Arc::new(MemoryStore::with_fleet(
        vec![target("t-1", 37.00, 127.00)],
        vec![quota_spent],
    ));
    let ctl = controller(Arc::clone(&store));

    let in_window = ctl.distribute(jan + Duration::days(5)).await.unwrap();
    assert_eq!(in_window.assigned, 0);
    assert_eq!(
        in_window.unassigned[0].reason,
        RejectionReason::DeclineQuotaExhausted
    );

    // The month rolls over and the agent is admitted again.
    let feb = Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap();
    let after_reset = ctl.distribute(feb).await.unwrap();
    assert_eq!(after_reset.assigned, 1);
    assert_eq!(after_reset.assignments[0].agent_id, "a-spent");
}

#[tokio::test]
async fn final_decline_locks_agent_out_of_following_runs() {
    let now = Utc::now();
    let mut a = agent("a-1", 37.00, 127.01);
    a.max_decline = 2;
    a.monthly_declines = 1;

    let store = Arc::new(MemoryStore::with_fleet(
        vec![target("t-1", 37.00, 127.00)],
        vec![a],
    ));
    let ctl = controller(Arc::clone(&store));

    let first = ctl.distribute(now).await.unwrap();
    assert_eq!(first.assigned, 1);
    let mission_id = first.assignments[0].mission_id.clone();

    // One more decline exhausts the quota.
    ctl.update_mission_status(
        &mission_id,
        StatusUpdate::new(MissionStatus::Declined).with_notes("unsafe access road"),
        now,
    )
    .await
    .unwrap();

    let agent = store.get_agent("a-1").await.unwrap();
    assert_eq!(agent.monthly_declines, agent.max_decline);

    let next = ctl.distribute(now).await.unwrap();
    assert_eq!(next.assigned, 0);
    assert_eq!(
        next.unassigned[0].reason,
        RejectionReason::DeclineQuotaExhausted
    );
}

#[tokio::test]
async fn declined_target_is_reassigned_to_another_agent() {
    let now = Utc::now();
    let mut decliner = agent("a-decliner", 37.00, 127.01);
    decliner.max_decline = 1; // one decline locks it out for the month
    let mut backup = agent("a-backup", 37.00, 127.05);
    backup.success_rate = 0.1; // scores below the decliner initially

    let store = Arc::new(MemoryStore::with_fleet(
        vec![target("t-1", 37.00, 127.00)],
        vec![decliner, backup],
    ));
    let ctl = controller(Arc::clone(&store));

    let first = ctl.distribute(now).await.unwrap();
    assert_eq!(first.assignments[0].agent_id, "a-decliner");
    let mission_id = first.assignments[0].mission_id.clone();

    ctl.update_mission_status(
        &mission_id,
        StatusUpdate::new(MissionStatus::Declined),
        now,
    )
    .await
    .unwrap();

    // The target is pending again, not lost; the next run places it with
    // the other agent and the mission record keeps its identity.
    let second = ctl.distribute(now + Duration::minutes(5)).await.unwrap();
    assert_eq!(second.assigned, 1);
    assert_eq!(second.assignments[0].agent_id, "a-backup");
    assert_eq!(second.assignments[0].mission_id, mission_id);

    let mission = store.get_mission(&mission_id).await.unwrap();
    assert_eq!(mission.status, MissionStatus::Assigned);
    // assigned, declined, requeued, reassigned
    assert!(mission.status_history.len() >= 4);
}

#[tokio::test]
async fn invalid_transition_is_rejected_and_nothing_persists() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::with_fleet(
        vec![target("t-1", 37.00, 127.00)],
        vec![agent("a-1", 37.00, 127.01)],
    ));
    let ctl = controller(Arc::clone(&store));

    let report = ctl.distribute(now).await.unwrap();
    let mission_id = report.assignments[0].mission_id.clone();

    // Can't complete straight from assigned.
    let err = ctl
        .update_mission_status(
            &mission_id,
            StatusUpdate::new(MissionStatus::Completed).with_notes("done"),
            now,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition { .. }));

    let mission = store.get_mission(&mission_id).await.unwrap();
    assert_eq!(mission.status, MissionStatus::Assigned);
    let agent = store.get_agent("a-1").await.unwrap();
    assert_eq!(agent.active_missions, 1);
    assert_eq!(agent.missions_completed, 0);
}

/// Store whose commit can be made to fail, for exercising run-abort
/// semantics. Everything else delegates to the in-memory store.
struct FlakyCommitStore {
    inner: MemoryStore,
    fail_commit: std::sync::atomic::AtomicBool,
}

impl FlakyCommitStore {
    fn new(targets: Vec<Target>, agents: Vec<Agent>) -> Self {
        Self {
            inner: MemoryStore::with_fleet(targets, agents),
            fail_commit: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_commit
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DispatchStore for FlakyCommitStore {
    async fn list_pending_targets(&self) -> fieldops::Result<Vec<Target>> {
        self.inner.list_pending_targets().await
    }

    async fn list_active_agents(&self) -> fieldops::Result<Vec<Agent>> {
        self.inner.list_active_agents().await
    }

    async fn list_open_missions(&self) -> fieldops::Result<Vec<fieldops::Mission>> {
        self.inner.list_open_missions().await
    }

    async fn get_target(&self, id: &str) -> fieldops::Result<Target> {
        self.inner.get_target(id).await
    }

    async fn get_agent(&self, id: &str) -> fieldops::Result<Agent> {
        self.inner.get_agent(id).await
    }

    async fn get_mission(&self, id: &str) -> fieldops::Result<fieldops::Mission> {
        self.inner.get_mission(id).await
    }

    async fn find_requeued_mission(
        &self,
        target_id: &str,
    ) -> fieldops::Result<Option<fieldops::Mission>> {
        self.inner.find_requeued_mission(target_id).await
    }

    async fn commit_assignments(
        &self,
        missions: Vec<fieldops::Mission>,
        deltas: Vec<fieldops::AgentCounterDelta>,
    ) -> fieldops::Result<()> {
        if self.fail_commit.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DispatchError::Persistence("disk full".to_string()));
        }
        self.inner.commit_assignments(missions, deltas).await
    }

    async fn save_transition(
        &self,
        mission: &fieldops::Mission,
        agent: &Agent,
        target: &Target,
    ) -> fieldops::Result<()> {
        self.inner.save_transition(mission, agent, target).await
    }

    async fn upsert_target(&self, target: Target) -> fieldops::Result<()> {
        self.inner.upsert_target(target).await
    }

    async fn upsert_agent(&self, agent: Agent) -> fieldops::Result<()> {
        self.inner.upsert_agent(agent).await
    }
}

#[tokio::test]
async fn failed_commit_aborts_run_with_nothing_observable() {
    let targets = vec![target("t-1", 37.00, 127.00), target("t-2", 37.01, 127.00)];
    let agents = vec![agent("a-1", 37.00, 127.01)];
    let store = Arc::new(FlakyCommitStore::new(targets, agents));
    let ctl = DistributionRunController::new(
        Arc::clone(&store) as Arc<dyn DispatchStore>,
        &DispatchConfig::default(),
    );
    let now = Utc::now();

    store.set_failing(true);
    let err = ctl.distribute(now).await.unwrap_err();
    assert!(matches!(err, DispatchError::Persistence(_)));

    // The aborted run left nothing behind: no missions, no assigned
    // markers, no capacity consumed.
    assert_eq!(store.inner.mission_count(), 0);
    assert_eq!(store.list_pending_targets().await.unwrap().len(), 2);
    let agent = store.get_agent("a-1").await.unwrap();
    assert_eq!(agent.active_missions, 0);

    // The controller is not wedged either; a healthy retry assigns
    // everything the failed run attempted.
    store.set_failing(false);
    let report = ctl.distribute(now).await.unwrap();
    assert_eq!(report.assigned, 2);
    assert!(report.unassigned.is_empty());
}

#[tokio::test]
async fn offline_agents_are_not_considered() {
    let mut offline = agent("a-off", 37.00, 127.01);
    offline.status = fieldops::AgentStatus::Offline;

    let store = Arc::new(MemoryStore::with_fleet(
        vec![target("t-1", 37.00, 127.00)],
        vec![offline],
    ));
    let ctl = controller(Arc::clone(&store));

    let report = ctl.distribute(Utc::now()).await.unwrap();
    assert_eq!(report.agents_considered, 0);
    assert_eq!(report.assigned, 0);
}
