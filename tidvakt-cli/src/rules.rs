//! Binary rule buffer tooling.

use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use tidvakt_config::TidvaktConfig;
use tidvakt_core::filter::{FilterEngine, FilterRule, RuleKind};
use tracing::info;

/// Validates a rule buffer and prints its table.
pub fn inspect(path: &Path) -> anyhow::Result<()> {
    let buffer = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut engine = FilterEngine::new();
    engine
        .load_rules_from_buffer(&buffer)
        .with_context(|| format!("{} is not a valid rule buffer", path.display()))?;
    print!("{}", describe(engine.rules()));
    Ok(())
}

/// Encodes the rules of a configuration file into a binary buffer.
pub fn encode(config: &Path, out: &Path) -> anyhow::Result<()> {
    let config = TidvaktConfig::load_from_path(config)?;
    let mut engine = FilterEngine::new();
    for rule in config.filters.to_rules() {
        engine.add_rule(rule)?;
    }
    let buffer = engine.encode_rules();
    std::fs::write(out, &buffer).with_context(|| format!("writing {}", out.display()))?;
    info!(rules = engine.len(), bytes = buffer.len(), path = %out.display(), "rule buffer written");
    Ok(())
}

fn kind_name(kind: RuleKind) -> String {
    match kind {
        RuleKind::Allow => "allow".into(),
        RuleKind::Deny => "deny".into(),
        RuleKind::SizeMin => "size_min".into(),
        RuleKind::SizeMax => "size_max".into(),
        RuleKind::Priority => "priority".into(),
        RuleKind::Other(code) => format!("unknown({code})"),
    }
}

pub fn describe(rules: &[FilterRule]) -> String {
    let mut output = String::new();
    for (index, rule) in rules.iter().enumerate() {
        let _ = writeln!(
            output,
            "{index:>2}  {:<8} {:<12} event_id={:<3} param={}",
            if rule.enabled { "enabled" } else { "disabled" },
            kind_name(rule.kind),
            rule.event_id,
            rule.param,
        );
    }
    output
}
