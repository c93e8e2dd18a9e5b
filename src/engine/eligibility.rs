use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geo;
use crate::model::{Agent, AgentStatus, Target};

/// Which hard-constraint check rejected a (target, agent) pair. Ordered to
/// match the check sequence; run reports and tests key off these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Offline,
    AtHoldCapacity,
    DeclineQuotaExhausted,
    OutOfRange,
    DangerousUnqualified,
    PropertyTypeMismatch,
    LanguageMismatch,
    RouteBudgetExhausted,
    InvalidCoordinates,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "agent offline",
            Self::AtHoldCapacity => "agent at max_hold capacity",
            Self::DeclineQuotaExhausted => "monthly decline quota exhausted",
            Self::OutOfRange => "target outside agent max_radius",
            Self::DangerousUnqualified => "agent not qualified for dangerous contact",
            Self::PropertyTypeMismatch => "property type not in agent filters",
            Self::LanguageMismatch => "contact language mismatch",
            Self::RouteBudgetExhausted => "per-run route budget exhausted",
            Self::InvalidCoordinates => "invalid coordinates",
        }
    }
}

pub struct EligibilityFilter;

impl EligibilityFilter {
    /// Hard-constraint admissibility for one (target, agent) pair. Pure:
    /// mutates nothing, short-circuits on the first failed check. On success
    /// returns the agent-to-target distance so scoring reuses it.
    ///
    /// `assigned_this_run` is the number of missions the current run has
    /// already given this agent; the engine owns that count and folds it
    /// into `active_missions` at each commit, so here it only feeds the
    /// route-budget check.
    pub fn check(
        target: &Target,
        agent: &Agent,
        assigned_this_run: u32,
        now: DateTime<Utc>,
    ) -> Result<f64, RejectionReason> {
        // 1. Operational status and spare hold capacity.
        if agent.status == AgentStatus::Offline || !agent.active {
            return Err(RejectionReason::Offline);
        }
        if agent.active_missions >= agent.max_hold {
            return Err(RejectionReason::AtHoldCapacity);
        }

        // 2. Decline quota, against a lazily rolled monthly window.
        if effective_monthly_declines(agent, now) >= agent.max_decline {
            return Err(RejectionReason::DeclineQuotaExhausted);
        }

        // 3. Geography.
        let distance = geo::distance_km(agent.coordinate, target.coordinate)
            .map_err(|_| RejectionReason::InvalidCoordinates)?;
        if distance > agent.max_radius_km {
            return Err(RejectionReason::OutOfRange);
        }

        // 4. Dangerous-contact compliance.
        if target.is_dangerous && !agent.handles_dangerous {
            return Err(RejectionReason::DangerousUnqualified);
        }

        // 5. Property type. Empty filter list accepts everything.
        if !agent.property_type_filters.is_empty()
            && !agent.property_type_filters.contains(&target.property_type)
        {
            return Err(RejectionReason::PropertyTypeMismatch);
        }

        // 6. Contact language.
        if !agent.language_preference.accepts(target.preferred_language) {
            return Err(RejectionReason::LanguageMismatch);
        }

        // 7. Per-run route budget.
        if assigned_this_run >= agent.optimal_route_points {
            return Err(RejectionReason::RouteBudgetExhausted);
        }

        Ok(distance)
    }
}

/// Read-only view of the decline counter with the monthly window applied.
/// The filter must stay pure, so the roll is computed, not stored; the
/// lifecycle persists the actual reset when it next mutates the agent.
fn effective_monthly_declines(agent: &Agent, now: DateTime<Utc>) -> u32 {
    use chrono::Datelike;
    let stored = (agent.last_decline_reset.year(), agent.last_decline_reset.month());
    if (now.year(), now.month()) > stored {
        0
    } else {
        agent.monthly_declines
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::geo::Coordinate;
    use crate::model::{Language, LanguagePreference, PropertyType};

    fn target() -> Target {
        Target::new("t-1", Coordinate::new(37.50, 127.00), PropertyType::Residential)
    }

    fn agent() -> Agent {
        let mut a = Agent::new("a-1", "Lee", Coordinate::new(37.52, 127.02));
        a.max_radius_km = 15.0;
        a.max_hold = 5;
        a.max_decline = 3;
        a.optimal_route_points = 4;
        a
    }

    #[test]
    fn test_eligible_pair_returns_distance() {
        let d = EligibilityFilter::check(&target(), &agent(), 0, Utc::now()).unwrap();
        assert!(d > 0.0 && d < 15.0);
    }

    #[test]
    fn test_check_order_short_circuits() {
        // Offline wins over every later violation.
        let mut a = agent();
        a.status = AgentStatus::Offline;
        a.active_missions = a.max_hold;
        let mut t = target();
        t.is_dangerous = true;
        assert_eq!(
            EligibilityFilter::check(&t, &a, 0, Utc::now()),
            Err(RejectionReason::Offline)
        );
    }

    #[test]
    fn test_hold_capacity() {
        let mut a = agent();
        a.max_hold = 3;
        a.active_missions = 2;
        assert!(EligibilityFilter::check(&target(), &a, 0, Utc::now()).is_ok());
        a.active_missions = 3;
        assert_eq!(
            EligibilityFilter::check(&target(), &a, 0, Utc::now()),
            Err(RejectionReason::AtHoldCapacity)
        );
    }

    #[test]
    fn test_decline_quota_window() {
        let mut a = agent();
        a.monthly_declines = 3;
        a.last_decline_reset = Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap();

        let in_window = Utc.with_ymd_and_hms(2026, 5, 20, 0, 0, 0).unwrap();
        assert_eq!(
            EligibilityFilter::check(&target(), &a, 0, in_window),
            Err(RejectionReason::DeclineQuotaExhausted)
        );

        // A new month re-admits the agent without mutating it.
        let next_month = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        assert!(EligibilityFilter::check(&target(), &a, 0, next_month).is_ok());
        assert_eq!(a.monthly_declines, 3);
    }

    #[test]
    fn test_out_of_range() {
        let mut a = agent();
        a.max_radius_km = 1.0;
        assert_eq!(
            EligibilityFilter::check(&target(), &a, 0, Utc::now()),
            Err(RejectionReason::OutOfRange)
        );
    }

    #[test]
    fn test_dangerous_requires_qualification() {
        let t = target().dangerous();
        let mut a = agent();
        a.handles_dangerous = false;
        assert_eq!(
            EligibilityFilter::check(&t, &a, 0, Utc::now()),
            Err(RejectionReason::DangerousUnqualified)
        );
        a.handles_dangerous = true;
        assert!(EligibilityFilter::check(&t, &a, 0, Utc::now()).is_ok());
    }

    #[test]
    fn test_property_type_filter_empty_accepts_all() {
        let mut a = agent();
        assert!(EligibilityFilter::check(&target(), &a, 0, Utc::now()).is_ok());

        a.property_type_filters = vec![PropertyType::Commercial, PropertyType::Industrial];
        assert_eq!(
            EligibilityFilter::check(&target(), &a, 0, Utc::now()),
            Err(RejectionReason::PropertyTypeMismatch)
        );

        a.property_type_filters.push(PropertyType::Residential);
        assert!(EligibilityFilter::check(&target(), &a, 0, Utc::now()).is_ok());
    }

    #[test]
    fn test_language_mismatch() {
        let t = target().with_language(Language::English);
        let mut a = agent();
        a.language_preference = LanguagePreference::Korean;
        assert_eq!(
            EligibilityFilter::check(&t, &a, 0, Utc::now()),
            Err(RejectionReason::LanguageMismatch)
        );

        // Target without a preference is acceptable to anyone.
        assert!(EligibilityFilter::check(&target(), &a, 0, Utc::now()).is_ok());
    }

    #[test]
    fn test_route_budget() {
        let mut a = agent();
        a.optimal_route_points = 2;
        assert!(EligibilityFilter::check(&target(), &a, 1, Utc::now()).is_ok());
        assert_eq!(
            EligibilityFilter::check(&target(), &a, 2, Utc::now()),
            Err(RejectionReason::RouteBudgetExhausted)
        );
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let mut t = target();
        t.coordinate = Coordinate::new(99.0, 500.0);
        assert_eq!(
            EligibilityFilter::check(&t, &agent(), 0, Utc::now()),
            Err(RejectionReason::InvalidCoordinates)
        );
    }
}
