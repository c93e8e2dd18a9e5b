//! fieldops — the field-mission distribution engine.
//!
//! Matches pending field-visit targets to available agents under hard
//! geographic, capacity, compliance, and preference constraints, and owns
//! the mission lifecycle from assignment through completion, decline,
//! failure, or cancellation.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod model;
pub mod run;
pub mod store;

pub use config::{DispatchConfig, EngineConfig, StoreConfig};
pub use engine::{AssignmentEngine, EligibilityFilter, RejectionReason, ScoringModel, ScoringWeights};
pub use error::{DispatchError, Result};
pub use geo::Coordinate;
pub use lifecycle::{MissionLifecycle, MissionStatus, StatusTransition, StatusUpdate};
pub use model::{
    Agent, AgentCounterDelta, AgentStatus, Language, LanguagePreference, Mission, PriorityTier,
    PropertyType, Target,
};
pub use run::{DistributionRunController, RunReport};
pub use store::{DispatchStore, FileStore, MemoryStore};
