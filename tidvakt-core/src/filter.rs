//! ## tidvakt-core::filter
//! **Ordered admission rules evaluated before an event is queued**
//!
//! The engine is allow-by-default. Every enabled rule is evaluated in table
//! order and may overwrite the verdict, so the last matching rule wins:
//! `[DENY 7, ALLOW 7]` admits id 7 while `[ALLOW 7, DENY 7]` rejects it.

use crate::config::MAX_FILTER_RULES;
use crate::error::FilterError;
use crate::events::EventHeader;

/// Size of one rule record in a bulk rule buffer: `[enabled, kind, event_id, param]`.
pub const RULE_RECORD_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Matching id forces the verdict to admit.
    Allow,
    /// Matching id forces the verdict to reject.
    Deny,
    /// Rejects events whose encoded size is below `param`.
    SizeMin,
    /// Rejects events whose encoded size is above `param`.
    SizeMax,
    /// Rejects events with a priority value above `param` (less urgent).
    Priority,
    /// Unrecognised kind code; never affects the verdict.
    Other(u8),
}

impl RuleKind {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Allow,
            1 => Self::Deny,
            2 => Self::SizeMin,
            3 => Self::SizeMax,
            4 => Self::Priority,
            other => Self::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Deny => 1,
            Self::SizeMin => 2,
            Self::SizeMax => 3,
            Self::Priority => 4,
            Self::Other(code) => code,
        }
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterRule {
    pub enabled: bool,
    pub kind: RuleKind,
    pub event_id: u8,
    pub param: u8,
}

impl FilterRule {
    const EMPTY: Self = Self {
        enabled: false,
        kind: RuleKind::Allow,
        event_id: 0,
        param: 0,
    };

    pub const fn new(kind: RuleKind, event_id: u8, param: u8) -> Self {
        Self {
            enabled: true,
            kind,
            event_id,
            param,
        }
    }

    pub const fn allow(event_id: u8) -> Self {
        Self::new(RuleKind::Allow, event_id, 0)
    }

    pub const fn deny(event_id: u8) -> Self {
        Self::new(RuleKind::Deny, event_id, 0)
    }

    pub const fn size_min(min: u8) -> Self {
        Self::new(RuleKind::SizeMin, 0, min)
    }

    pub const fn size_max(max: u8) -> Self {
        Self::new(RuleKind::SizeMax, 0, max)
    }

    /// Admits only priorities numerically at or below `lowest`.
    pub const fn max_priority(lowest: u8) -> Self {
        Self::new(RuleKind::Priority, 0, lowest)
    }

    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn to_record(&self) -> [u8; RULE_RECORD_LEN] {
        [
            u8::from(self.enabled),
            self.kind.code(),
            self.event_id,
            self.param,
        ]
    }

    pub fn from_record(record: [u8; RULE_RECORD_LEN]) -> Self {
        Self {
            enabled: record[0] != 0,
            kind: RuleKind::from_code(record[1]),
            event_id: record[2],
            param: record[3],
        }
    }

    fn apply(&self, header: &EventHeader, verdict: bool) -> bool {
        match self.kind {
            RuleKind::Allow if header.id == self.event_id => true,
            RuleKind::Deny if header.id == self.event_id => false,
            RuleKind::SizeMin if header.size < self.param => false,
            RuleKind::SizeMax if header.size > self.param => false,
            RuleKind::Priority if header.priority > self.param => false,
            _ => verdict,
        }
    }
}

/// Fixed-capacity, insertion-ordered rule table.
#[derive(Clone, Debug)]
pub struct FilterEngine {
    rules: [FilterRule; MAX_FILTER_RULES],
    len: usize,
}

impl FilterEngine {
    pub const fn new() -> Self {
        Self {
            rules: [FilterRule::EMPTY; MAX_FILTER_RULES],
            len: 0,
        }
    }

    /// Clears every rule.
    pub fn init(&mut self) {
        self.rules = [FilterRule::EMPTY; MAX_FILTER_RULES];
        self.len = 0;
    }

    pub fn add_rule(&mut self, rule: FilterRule) -> Result<(), FilterError> {
        let slot = self
            .rules
            .get_mut(self.len)
            .ok_or(FilterError::CapacityExceeded {
                capacity: MAX_FILTER_RULES,
            })?;
        *slot = rule;
        self.len += 1;
        Ok(())
    }

    /// Removes the rule at `index`, shifting later rules down.
    pub fn remove_rule(&mut self, index: usize) -> Result<FilterRule, FilterError> {
        if index >= self.len {
            return Err(FilterError::InvalidIndex {
                index,
                len: self.len,
            });
        }
        let removed = self.rules[index];
        self.rules.copy_within(index + 1..self.len, index);
        self.len -= 1;
        self.rules[self.len] = FilterRule::EMPTY;
        Ok(removed)
    }

    /// Returns whether an event with this header may be queued.
    pub fn check(&self, header: &EventHeader) -> bool {
        self.rules()
            .iter()
            .filter(|rule| rule.enabled)
            .fold(true, |verdict, rule| rule.apply(header, verdict))
    }

    /// Replaces the whole table with rules decoded from `buffer`.
    ///
    /// The table is untouched when the buffer is rejected. Rules with an
    /// unknown kind are loaded disabled.
    pub fn load_rules_from_buffer(&mut self, buffer: &[u8]) -> Result<(), FilterError> {
        if buffer.is_empty() || buffer.len() % RULE_RECORD_LEN != 0 {
            return Err(FilterError::MalformedInput {
                len: buffer.len(),
                record: RULE_RECORD_LEN,
            });
        }
        let count = buffer.len() / RULE_RECORD_LEN;
        if count > MAX_FILTER_RULES {
            return Err(FilterError::CapacityExceeded {
                capacity: MAX_FILTER_RULES,
            });
        }

        self.init();
        for (slot, record) in self
            .rules
            .iter_mut()
            .zip(buffer.chunks_exact(RULE_RECORD_LEN))
        {
            let mut raw = [0u8; RULE_RECORD_LEN];
            raw.copy_from_slice(record);
            let rule = FilterRule::from_record(raw);
            *slot = if rule.kind.is_known() {
                rule
            } else {
                rule.disabled()
            };
        }
        self.len = count;
        Ok(())
    }

    /// Encodes the current table in the bulk buffer format.
    pub fn encode_rules(&self) -> Vec<u8> {
        self.rules().iter().flat_map(FilterRule::to_record).collect()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}
