//! Custom validation functions for configuration.
//!
//! Capacity checks against the core's compile-time limits live here because
//! the derive attributes only accept literals.

use tidvakt_core::config::{EVENT_PRIORITIES, MAX_EVENT_TYPES, MAX_FILTER_RULES};
use validator::ValidationError;

use crate::bus::BusConfig;
use crate::filters::{FilterConfig, RuleConfig};

/// Validate that between one and `EVENT_PRIORITIES` levels are configured.
pub fn validate_level_count(bus: &BusConfig) -> Result<(), ValidationError> {
    if (1..=EVENT_PRIORITIES).contains(&bus.levels.len()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_level_count"))
    }
}

/// Validate that the rule table fits the filter engine.
pub fn validate_rule_count(filters: &FilterConfig) -> Result<(), ValidationError> {
    if filters.rules.len() <= MAX_FILTER_RULES {
        Ok(())
    } else {
        Err(ValidationError::new("too_many_rules"))
    }
}

/// Validate that a rule targets an event id the bus accepts.
pub fn validate_rule_event_id(rule: &RuleConfig) -> Result<(), ValidationError> {
    if (rule.event_id as usize) < MAX_EVENT_TYPES {
        Ok(())
    } else {
        Err(ValidationError::new("event_id_out_of_range"))
    }
}
