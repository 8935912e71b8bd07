//! Filter rule table configuration.

use serde::{Deserialize, Serialize};
use tidvakt_core::filter::{FilterRule, RuleKind};
use validator::Validate;

use crate::validation;

/// Rules loaded into the filter engine at startup, in evaluation order.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[validate(schema(function = validation::validate_rule_count))]
pub struct FilterConfig {
    #[serde(default)]
    #[validate(nested)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleKindConfig {
    Allow,
    Deny,
    SizeMin,
    SizeMax,
    Priority,
}

impl From<RuleKindConfig> for RuleKind {
    fn from(kind: RuleKindConfig) -> Self {
        match kind {
            RuleKindConfig::Allow => RuleKind::Allow,
            RuleKindConfig::Deny => RuleKind::Deny,
            RuleKindConfig::SizeMin => RuleKind::SizeMin,
            RuleKindConfig::SizeMax => RuleKind::SizeMax,
            RuleKindConfig::Priority => RuleKind::Priority,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, Copy, PartialEq)]
#[validate(schema(function = validation::validate_rule_event_id))]
pub struct RuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub kind: RuleKindConfig,

    /// Event id matched by allow/deny rules.
    #[serde(default)]
    pub event_id: u8,

    /// Size bound for size rules, lowest admitted priority for priority rules.
    #[serde(default)]
    pub param: u8,
}

fn default_true() -> bool {
    true
}

impl From<&RuleConfig> for FilterRule {
    fn from(rule: &RuleConfig) -> Self {
        let filter = FilterRule::new(rule.kind.into(), rule.event_id, rule.param);
        if rule.enabled {
            filter
        } else {
            filter.disabled()
        }
    }
}

impl FilterConfig {
    pub fn to_rules(&self) -> Vec<FilterRule> {
        self.rules.iter().map(FilterRule::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: RuleKindConfig, event_id: u8, param: u8) -> RuleConfig {
        RuleConfig {
            enabled: true,
            kind,
            event_id,
            param,
        }
    }

    #[test]
    fn converts_in_order() {
        let config = FilterConfig {
            rules: vec![
                rule(RuleKindConfig::Deny, 7, 0),
                rule(RuleKindConfig::Allow, 7, 0),
                RuleConfig {
                    enabled: false,
                    ..rule(RuleKindConfig::SizeMax, 0, 12)
                },
            ],
        };
        config.validate().unwrap();
        assert_eq!(
            config.to_rules(),
            vec![
                FilterRule::deny(7),
                FilterRule::allow(7),
                FilterRule::size_max(12).disabled(),
            ]
        );
    }

    #[test]
    fn rejects_out_of_range_event_id() {
        let config = FilterConfig {
            rules: vec![rule(RuleKindConfig::Allow, 200, 0)],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_table() {
        let config = FilterConfig {
            rules: vec![rule(RuleKindConfig::Allow, 1, 0); 9],
        };
        assert!(config.validate().is_err());
    }
}
