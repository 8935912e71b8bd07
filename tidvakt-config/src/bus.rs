//! Event bus runtime settings.
//!
//! Mirrors [`BusSettings`] in a serialisable, validated form. The number of
//! levels is fixed when the bus type is chosen, so conversion happens through
//! [`BusConfig::to_settings`] with the bus's level count.

use serde::{Deserialize, Serialize};
use tidvakt_core::config::{
    BusSettings, DeadlineAction, LevelPolicy, OverflowPolicy, DEFAULT_OVERFLOW_POLICY,
    EVENT_PRIORITIES, MAX_EVENTS_PER_CYCLE, MAX_PROCESS_TIME_MS,
};
use validator::Validate;

use crate::error::ConfigError;
use crate::validation;

/// Event bus configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[validate(schema(function = validation::validate_level_count))]
pub struct BusConfig {
    /// Per-level queue behaviour, most urgent level first.
    #[serde(default = "default_levels")]
    #[validate(nested)]
    pub levels: Vec<LevelConfig>,

    /// Deadline for one processing cycle (milliseconds).
    #[serde(default = "default_max_process_time_ms")]
    #[validate(range(min = 1, max = 60_000))]
    pub max_process_time_ms: u32,

    /// Reaction to a cycle that exceeds its deadline (log or halt).
    #[serde(default)]
    pub deadline_action: DeadlineAction,

    /// Route events to per-priority queues; otherwise everything shares level 0.
    #[serde(default = "default_true")]
    pub priority_enabled: bool,

    /// Run the filter engine on publish.
    #[serde(default = "default_true")]
    pub filters_enabled: bool,
}

/// Queue behaviour of one priority level.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, Copy, PartialEq)]
pub struct LevelConfig {
    /// What a full queue does with the next event.
    #[serde(default = "default_overflow")]
    pub overflow: OverflowPolicy,

    /// Events drained from this level per cycle.
    #[serde(default = "default_max_events_per_cycle")]
    #[validate(range(min = 1))]
    pub max_events_per_cycle: usize,
}

fn default_levels() -> Vec<LevelConfig> {
    vec![LevelConfig::default(); EVENT_PRIORITIES]
}

fn default_max_process_time_ms() -> u32 {
    MAX_PROCESS_TIME_MS
}

fn default_true() -> bool {
    true
}

fn default_overflow() -> OverflowPolicy {
    DEFAULT_OVERFLOW_POLICY
}

fn default_max_events_per_cycle() -> usize {
    MAX_EVENTS_PER_CYCLE
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            max_process_time_ms: default_max_process_time_ms(),
            deadline_action: DeadlineAction::default(),
            priority_enabled: default_true(),
            filters_enabled: default_true(),
        }
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            overflow: default_overflow(),
            max_events_per_cycle: default_max_events_per_cycle(),
        }
    }
}

impl From<LevelConfig> for LevelPolicy {
    fn from(level: LevelConfig) -> Self {
        LevelPolicy::new(level.overflow, level.max_events_per_cycle)
    }
}

impl BusConfig {
    /// Builds settings for a bus with `LEVELS` priority levels.
    ///
    /// Levels missing from the configuration keep the default policy.
    pub fn to_settings<const LEVELS: usize>(&self) -> Result<BusSettings<LEVELS>, ConfigError> {
        if self.levels.len() > LEVELS {
            return Err(ConfigError::LevelCount {
                configured: self.levels.len(),
                supported: LEVELS,
            });
        }

        let settings = self
            .levels
            .iter()
            .enumerate()
            .fold(BusSettings::<LEVELS>::DEFAULT, |settings, (index, level)| {
                settings.with_level(index, LevelPolicy::from(*level))
            })
            .with_deadline(self.max_process_time_ms, self.deadline_action)
            .with_priority(self.priority_enabled)
            .with_filters(self.filters_enabled);
        Ok(settings)
    }
}
