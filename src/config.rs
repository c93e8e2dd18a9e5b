use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::engine::ScoringWeights;
use crate::error::{DispatchError, Result};
use crate::model::PropertyType;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DispatchConfig {
    pub scoring: ScoringWeights,
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Hours from assignment to the mission deadline.
    pub deadline_hours: u32,
    /// Assumed travel speed for the estimated-duration calculation.
    pub average_speed_kmh: f64,
    pub residential_visit_minutes: f64,
    pub commercial_visit_minutes: f64,
    pub industrial_visit_minutes: f64,
    pub land_visit_minutes: f64,
    pub mixed_use_visit_minutes: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline_hours: 24,
            average_speed_kmh: 40.0,
            residential_visit_minutes: 30.0,
            commercial_visit_minutes: 45.0,
            industrial_visit_minutes: 60.0,
            land_visit_minutes: 20.0,
            mixed_use_visit_minutes: 45.0,
        }
    }
}

impl EngineConfig {
    pub fn base_visit_minutes(&self, property_type: PropertyType) -> f64 {
        match property_type {
            PropertyType::Residential => self.residential_visit_minutes,
            PropertyType::Commercial => self.commercial_visit_minutes,
            PropertyType::Industrial => self.industrial_visit_minutes,
            PropertyType::Land => self.land_visit_minutes,
            PropertyType::MixedUse => self.mixed_use_visit_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".fieldops"),
        }
    }
}

impl DispatchConfig {
    pub async fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| DispatchError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let weight_sum = self.scoring.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            errors.push(format!("scoring weights must sum to 1.0, got {weight_sum}"));
        }
        let w = &self.scoring;
        for (name, value) in [
            ("distance", w.distance),
            ("success_rate", w.success_rate),
            ("completion_speed", w.completion_speed),
            ("territory_bonus", w.territory_bonus),
            ("load_balance", w.load_balance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("scoring weight {name} must be in [0, 1], got {value}"));
            }
        }

        if self.engine.deadline_hours == 0 {
            errors.push("deadline_hours must be greater than 0".to_string());
        }
        if self.engine.average_speed_kmh <= 0.0 {
            errors.push("average_speed_kmh must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Config(errors.join("; ")))
        }
    }
}
