use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::eligibility::{EligibilityFilter, RejectionReason};
use super::scoring::{Candidate, ScoringModel, rank_candidates};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{Agent, AgentCounterDelta, Mission, Target};

/// A target the run could not place, with the dominant rejection reason
/// across the agents that were considered.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UnassignedTarget {
    pub target_id: String,
    pub reason: RejectionReason,
}

/// Outcome of one assignment pass over a snapshot of targets and agents.
/// Ephemeral: the controller persists the missions and deltas, renders the
/// report, and drops this.
#[derive(Debug, Clone)]
pub struct DistributionRun {
    pub started_at: DateTime<Utc>,
    pub targets_considered: usize,
    pub agents_considered: usize,
    pub missions: Vec<Mission>,
    pub deltas: Vec<AgentCounterDelta>,
    pub unassigned: Vec<UnassignedTarget>,
}

/// Greedy, single-pass assignment over priority-ordered targets.
///
/// Deliberate simplification: no global matching (Hungarian-style min-cost
/// search). Priority ordering plus per-target independence makes greedy good
/// enough here, and a global optimum would have to be re-solved on every
/// agent status change. Swapping in an optimal matcher changes fairness and
/// ordering guarantees and needs the invariant suite re-validated.
pub struct AssignmentEngine {
    scoring: ScoringModel,
    config: EngineConfig,
}

impl AssignmentEngine {
    pub fn new(scoring: ScoringModel, config: EngineConfig) -> Self {
        Self { scoring, config }
    }

    /// Run one distribution over snapshots of the pending targets and the
    /// roster. `agents` is the run's working copy: capacity increments land
    /// on it so later targets in the same pass see them, and the controller
    /// commits the summed deltas afterwards.
    pub fn run(
        &self,
        targets: &[Target],
        agents: &mut [Agent],
        now: DateTime<Utc>,
    ) -> Result<DistributionRun> {
        let mut order: Vec<usize> = (0..targets.len())
            .filter(|&i| targets[i].is_pending())
            .collect();
        // Urgent before low, oldest-waiting first: requeued declines keep
        // their original age, so they rise instead of starving.
        order.sort_by(|&a, &b| {
            targets[a]
                .priority
                .cmp(&targets[b].priority)
                .then_with(|| targets[a].created_at.cmp(&targets[b].created_at))
                .then_with(|| targets[a].id.cmp(&targets[b].id))
        });

        let mut assigned_this_run: Vec<u32> = vec![0; agents.len()];
        let mut missions = Vec::new();
        let mut unassigned = Vec::new();

        for &ti in &order {
            let target = &targets[ti];
            match self.place_target(target, agents, &mut assigned_this_run, now)? {
                Some(mission) => missions.push(mission),
                None => {
                    let reason = dominant_rejection(target, agents, &assigned_this_run, now);
                    debug!(target = %target.id, %reason, "Target left unassigned");
                    unassigned.push(UnassignedTarget {
                        target_id: target.id.clone(),
                        reason,
                    });
                }
            }
        }

        let deltas: Vec<AgentCounterDelta> = agents
            .iter()
            .zip(&assigned_this_run)
            .filter(|&(_, &n)| n > 0)
            .map(|(agent, &n)| AgentCounterDelta {
                agent_id: agent.id.clone(),
                new_missions: n,
            })
            .collect();

        info!(
            assigned = missions.len(),
            unassigned = unassigned.len(),
            agents_loaded = deltas.len(),
            "Distribution pass finished"
        );

        Ok(DistributionRun {
            started_at: now,
            targets_considered: order.len(),
            agents_considered: agents.len(),
            missions,
            deltas,
            unassigned,
        })
    }

    /// Score the eligible agents for one target and commit the best that
    /// still passes re-validation. Returns `None` when no agent remains.
    fn place_target(
        &self,
        target: &Target,
        agents: &mut [Agent],
        assigned_this_run: &mut [u32],
        now: DateTime<Utc>,
    ) -> Result<Option<Mission>> {
        let mut candidates = Vec::new();
        for (i, agent) in agents.iter().enumerate() {
            if let Ok(distance) = EligibilityFilter::check(target, agent, assigned_this_run[i], now) {
                candidates.push(Candidate {
                    agent_index: i,
                    agent_id: agent.id.clone(),
                    score: self.scoring.score(target, agent, distance),
                    distance_km: distance,
                    remaining_capacity: agent.remaining_hold_capacity(),
                });
            }
        }
        rank_candidates(&mut candidates);

        for candidate in candidates {
            let i = candidate.agent_index;
            // Optimistic re-validation right before commit: agent state may
            // have moved since the candidate was scored (capacity race).
            if EligibilityFilter::check(target, &agents[i], assigned_this_run[i], now).is_err() {
                warn!(
                    target = %target.id,
                    agent = %candidate.agent_id,
                    "Chosen agent no longer eligible at commit; falling back to next candidate"
                );
                continue;
            }

            assigned_this_run[i] += 1;
            agents[i].active_missions += 1;

            match self.build_mission(target, &agents[i], candidate.distance_km, now) {
                Ok(mission) => {
                    debug!(
                        target = %target.id,
                        agent = %candidate.agent_id,
                        score = format!("{:.3}", candidate.score),
                        distance_km = format!("{:.2}", candidate.distance_km),
                        "Target assigned"
                    );
                    return Ok(Some(mission));
                }
                Err(e) => {
                    // No partial commit may leak into later targets.
                    assigned_this_run[i] -= 1;
                    agents[i].active_missions -= 1;
                    warn!(target = %target.id, agent = %candidate.agent_id, error = %e,
                        "Mission creation failed; counters rolled back");
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    fn build_mission(
        &self,
        target: &Target,
        agent: &Agent,
        distance_km: f64,
        now: DateTime<Utc>,
    ) -> Result<Mission> {
        target.coordinate.validate()?;
        let travel_minutes = distance_km / self.config.average_speed_kmh.max(1.0) * 60.0;
        let estimated = self.config.base_visit_minutes(target.property_type) + travel_minutes;
        let deadline = now + Duration::hours(self.config.deadline_hours as i64);

        Ok(Mission::new(
            target.id.clone(),
            agent.id.clone(),
            target.priority,
            distance_km,
            estimated,
            now,
            deadline,
        ))
    }
}

/// Most common rejection reason across the roster for an unplaceable target;
/// ties resolve to the earliest check in the eligibility order.
fn dominant_rejection(
    target: &Target,
    agents: &[Agent],
    assigned_this_run: &[u32],
    now: DateTime<Utc>,
) -> RejectionReason {
    let mut counts: HashMap<RejectionReason, u32> = HashMap::new();
    for (i, agent) in agents.iter().enumerate() {
        if let Err(reason) = EligibilityFilter::check(target, agent, assigned_this_run[i], now) {
            *counts.entry(reason).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(reason, _)| reason)
        .unwrap_or(RejectionReason::Offline)
}
