use std::cmp::Ordering;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Agent, Target};

/// Weights for the ranking score. Must sum to 1.0; validated with the rest
/// of the config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScoringWeights {
    pub distance: f64,
    pub success_rate: f64,
    pub completion_speed: f64,
    pub territory_bonus: f64,
    pub load_balance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.35,
            success_rate: 0.30,
            completion_speed: 0.15,
            territory_bonus: 0.10,
            load_balance: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.distance + self.success_rate + self.completion_speed + self.territory_bonus + self.load_balance
    }
}

/// Completion-time normalization anchor: an agent averaging this many minutes
/// per mission scores 0.5 on the speed component.
const SPEED_BASELINE_MINUTES: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct ScoringModel {
    weights: ScoringWeights,
}

impl ScoringModel {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Ranking score for an admissible (target, agent) pair; higher is
    /// better. Deterministic and side-effect free. `distance_km` comes from
    /// the eligibility check so it is never recomputed here.
    pub fn score(&self, target: &Target, agent: &Agent, distance_km: f64) -> f64 {
        let w = &self.weights;

        // Closer is better, normalized against how far this agent travels.
        let distance_component = if agent.max_radius_km > 0.0 {
            (1.0 - distance_km / agent.max_radius_km).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Agents with no completion history score neutral speed, not top.
        let speed_component = if agent.average_completion_minutes > 0.0 {
            SPEED_BASELINE_MINUTES / (SPEED_BASELINE_MINUTES + agent.average_completion_minutes)
        } else {
            0.5
        };

        let territory_component = match &target.county {
            Some(county) => {
                if agent
                    .territory_preference
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(county))
                {
                    1.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        // Spread work: agents with more free hold slots rank higher.
        let load_component = if agent.max_hold > 0 {
            1.0 - agent.active_missions.min(agent.max_hold) as f64 / agent.max_hold as f64
        } else {
            0.0
        };

        w.distance * distance_component
            + w.success_rate * agent.success_rate.clamp(0.0, 1.0)
            + w.completion_speed * speed_component
            + w.territory_bonus * territory_component
            + w.load_balance * load_component
    }
}

/// A scored admissible candidate for one target.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub agent_index: usize,
    pub agent_id: String,
    pub score: f64,
    pub distance_km: f64,
    pub remaining_capacity: u32,
}

/// Best candidate first: highest score, then more remaining hold capacity,
/// then lowest agent id so runs are reproducible.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.remaining_capacity.cmp(&a.remaining_capacity))
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
}
