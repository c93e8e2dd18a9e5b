mod agent;
mod mission;
mod target;

pub use agent::{Agent, AgentStatus, LanguagePreference};
pub use mission::{AgentCounterDelta, Mission};
pub use target::{Language, PriorityTier, PropertyType, Target};
