//! Service classes and their cycle time goals

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ServiceClassConfig;

pub const DEFAULT_SERVICE_CLASS: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceClass {
    pub name: String,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub wip: Option<f64>,
}

impl ServiceClass {
    pub fn unconfigured(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lower: None,
            upper: None,
            wip: None,
        }
    }

    /// Compare a cycle time against this class's goal
    pub fn goal_status(&self, cycle_time: i64) -> GoalStatus {
        let (lower, upper) = match (self.lower, self.upper) {
            (Some(lower), Some(upper)) => (lower, upper),
            (None, Some(upper)) => (0, upper),
            _ => return GoalStatus::Within,
        };

        if cycle_time < lower {
            GoalStatus::Under
        } else if cycle_time <= upper {
            GoalStatus::Within
        } else if cycle_time >= upper * 2 {
            GoalStatus::FarOver
        } else {
            GoalStatus::Over
        }
    }

    /// Whether a cycle time meets the goal; classes without an upper bound always do
    pub fn hit_goal(&self, cycle_time: i64) -> bool {
        self.upper.map_or(true, |upper| cycle_time <= upper)
    }
}

/// Cycle time relative to the service class goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Under,
    Within,
    Over,
    FarOver,
}

impl GoalStatus {
    /// -1 under, 0 within, 1 over, 2 at least double the upper bound
    pub fn as_i8(&self) -> i8 {
        match self {
            GoalStatus::Under => -1,
            GoalStatus::Within => 0,
            GoalStatus::Over => 1,
            GoalStatus::FarOver => 2,
        }
    }
}

/// Lookup table built from configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceClasses {
    classes: HashMap<String, ServiceClass>,
}

impl ServiceClasses {
    pub fn from_config(config: &HashMap<String, ServiceClassConfig>) -> Self {
        let classes = config
            .iter()
            .map(|(name, c)| {
                (
                    name.clone(),
                    ServiceClass {
                        name: name.clone(),
                        lower: c.lower,
                        upper: c.upper,
                        wip: c.wip,
                    },
                )
            })
            .collect();
        Self { classes }
    }

    /// Resolve a card's class name, falling back to the `default` class
    pub fn resolve(&self, name: Option<&str>) -> ServiceClass {
        name.and_then(|n| self.classes.get(n))
            .or_else(|| self.classes.get(DEFAULT_SERVICE_CLASS))
            .cloned()
            .unwrap_or_else(|| ServiceClass::unconfigured(DEFAULT_SERVICE_CLASS))
    }

    pub fn get(&self, name: &str) -> Option<&ServiceClass> {
        self.classes.get(name)
    }
}
