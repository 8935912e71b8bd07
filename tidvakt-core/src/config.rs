//! ## tidvakt-core::config
//! **Compile-time capacities and per-bus settings**
//!
//! Every table and queue in the core is sized by the constants below, so the
//! memory footprint is fixed at build time. The behavioural knobs that may
//! differ between deployments (overflow policy per level, per-cycle budgets,
//! the processing deadline and the feature switches) live in [`BusSettings`],
//! a plain value that can be built in a `const` or produced by
//! `tidvakt-config` at startup.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Slots per priority ring. One slot stays free, so each level holds `EVENT_QUEUE_SIZE - 1` events.
pub const EVENT_QUEUE_SIZE: usize = 32;

/// Width of a queue slot in bytes: the largest encoded event (header + payload).
pub const MAX_EVENT_SIZE: usize = 16;

/// Entries in the subscriber table.
pub const MAX_SUBSCRIBERS: usize = 8;

/// Event ids must be below this value.
pub const MAX_EVENT_TYPES: usize = 16;

/// Number of priority levels; level 0 is the most urgent.
pub const EVENT_PRIORITIES: usize = 3;

/// Entries in the filter rule table.
pub const MAX_FILTER_RULES: usize = 8;

/// Default anti-starvation cap: events drained from one level per `process()` call.
pub const MAX_EVENTS_PER_CYCLE: usize = 10;

/// Levels in a hierarchical state machine.
pub const MAX_HSM_DEPTH: usize = 4;

/// Default processing deadline for one bus cycle.
pub const MAX_PROCESS_TIME_MS: u32 = 10;

pub const DEFAULT_OVERFLOW_POLICY: OverflowPolicy = OverflowPolicy::DropOldest;

const_assert!(EVENT_QUEUE_SIZE >= 2);
const_assert!(EVENT_PRIORITIES >= 1);
const_assert!(MAX_EVENT_TYPES <= 256);
const_assert!(MAX_SUBSCRIBERS >= 1);
const_assert!(MAX_HSM_DEPTH >= 1);
const_assert!(MAX_EVENTS_PER_CYCLE >= 1);

/// What a full queue does with the next push.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming event and count it as dropped.
    DropNewest,
    /// Discard the oldest queued event to make room.
    DropOldest,
    /// Overflow is unrecoverable: report it and request the safe state.
    Panic,
}

/// Reaction to a `process()` cycle that ran past its deadline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineAction {
    /// Report the overrun to the fault handler and carry on.
    #[default]
    Log,
    /// Report the overrun and request the safe state.
    Halt,
}

/// Queue behaviour of a single priority level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelPolicy {
    pub overflow: OverflowPolicy,
    pub max_events_per_cycle: usize,
}

impl LevelPolicy {
    pub const DEFAULT: Self = Self::new(DEFAULT_OVERFLOW_POLICY, MAX_EVENTS_PER_CYCLE);

    pub const fn new(overflow: OverflowPolicy, max_events_per_cycle: usize) -> Self {
        Self {
            overflow,
            max_events_per_cycle,
        }
    }
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runtime settings of one event bus with `LEVELS` priority levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusSettings<const LEVELS: usize> {
    /// Per-level overflow policy and anti-starvation cap, indexed by priority.
    pub levels: [LevelPolicy; LEVELS],

    /// Deadline for a single `process()` call, in ticks.
    pub max_process_time_ms: u32,

    pub deadline_action: DeadlineAction,

    /// When disabled every event goes to level 0 regardless of its priority field.
    pub priority_enabled: bool,

    /// When disabled the filter engine is bypassed on publish.
    pub filters_enabled: bool,
}

impl<const LEVELS: usize> BusSettings<LEVELS> {
    pub const DEFAULT: Self = Self {
        levels: [LevelPolicy::DEFAULT; LEVELS],
        max_process_time_ms: MAX_PROCESS_TIME_MS,
        deadline_action: DeadlineAction::Log,
        priority_enabled: true,
        filters_enabled: true,
    };

    /// Replaces the policy of one level. Out-of-range levels are ignored.
    pub fn with_level(mut self, level: usize, policy: LevelPolicy) -> Self {
        if let Some(slot) = self.levels.get_mut(level) {
            *slot = policy;
        }
        self
    }

    /// Applies the same overflow policy to every level.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        for level in &mut self.levels {
            level.overflow = overflow;
        }
        self
    }

    pub fn with_deadline(mut self, max_process_time_ms: u32, action: DeadlineAction) -> Self {
        self.max_process_time_ms = max_process_time_ms;
        self.deadline_action = action;
        self
    }

    pub fn with_priority(mut self, enabled: bool) -> Self {
        self.priority_enabled = enabled;
        self
    }

    pub fn with_filters(mut self, enabled: bool) -> Self {
        self.filters_enabled = enabled;
        self
    }
}

impl<const LEVELS: usize> Default for BusSettings<LEVELS> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_constants() {
        let settings = BusSettings::<EVENT_PRIORITIES>::default();
        assert!(settings.priority_enabled);
        assert!(settings.filters_enabled);
        assert_eq!(settings.max_process_time_ms, MAX_PROCESS_TIME_MS);
        for level in settings.levels {
            assert_eq!(level.overflow, OverflowPolicy::DropOldest);
            assert_eq!(level.max_events_per_cycle, MAX_EVENTS_PER_CYCLE);
        }
    }

    #[test]
    fn with_level_ignores_out_of_range() {
        let settings = BusSettings::<2>::DEFAULT
            .with_level(1, LevelPolicy::new(OverflowPolicy::Panic, 3))
            .with_level(7, LevelPolicy::new(OverflowPolicy::DropNewest, 1));
        assert_eq!(settings.levels[0], LevelPolicy::DEFAULT);
        assert_eq!(settings.levels[1].overflow, OverflowPolicy::Panic);
        assert_eq!(settings.levels[1].max_events_per_cycle, 3);
    }

    #[test]
    fn overflow_policy_uses_snake_case_names() {
        let policy: OverflowPolicy = serde_yaml::from_str("drop_newest").unwrap();
        assert_eq!(policy, OverflowPolicy::DropNewest);
        let action: DeadlineAction = serde_yaml::from_str("halt").unwrap();
        assert_eq!(action, DeadlineAction::Halt);
    }
}
