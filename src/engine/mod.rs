//! The distribution engine: hard-constraint eligibility, weighted scoring,
//! and the greedy assignment pass.

mod assignment;
mod eligibility;
mod scoring;

pub use assignment::{AssignmentEngine, DistributionRun, UnassignedTarget};
pub use eligibility::{EligibilityFilter, RejectionReason};
pub use scoring::{Candidate, ScoringModel, ScoringWeights, rank_candidates};
