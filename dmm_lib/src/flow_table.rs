//! Installed-rule bookkeeping and diff-based reconciliation.

use common::{SwitchId, UeId};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

use crate::{
    error::{FlowError, FlowResult},
    metrics,
    rule::{Action, Match, Rule, RuleKey, RuleSet, PIPELINE_PRIORITY, TABLE_COUNT},
};

/// The physical write/delete primitive of a datapath.
pub trait RuleWriter: Send + 'static {
    fn write(&mut self, rule: &Rule) -> anyhow::Result<()>;
    fn delete(&mut self, rule: &Rule) -> anyhow::Result<()>;
}

/// Writer that only logs what it would send to the switches.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingWriter;

impl RuleWriter for LoggingWriter {
    fn write(&mut self, rule: &Rule) -> anyhow::Result<()> {
        tracing::info!(%rule, "flow mod add");
        Ok(())
    }

    fn delete(&mut self, rule: &Rule) -> anyhow::Result<()> {
        tracing::info!(key = %rule.key(), "flow mod delete");
        Ok(())
    }
}

/// Where reconciled rules go. The flow table applies them directly; the
/// runtime forwards them to the flow-table task.
pub trait RuleSink {
    fn install(&mut self, rule: Rule);
    fn remove(&mut self, key: RuleKey);
}

/// Ground truth of what has been written to the datapaths.
pub struct FlowTable<W> {
    installed: HashMap<RuleKey, Rule>,
    writer: W,
}

impl<W: RuleWriter> FlowTable<W> {
    pub fn new(writer: W) -> Self {
        Self {
            installed: HashMap::new(),
            writer,
        }
    }

    /// Writes `rule` unless an identical one already occupies its slot.
    ///
    /// Returns whether a write was issued. The rule is recorded as installed
    /// even when the writer reports a failure.
    pub fn upsert(&mut self, rule: Rule) -> FlowResult<bool> {
        let key = rule.key();
        if self
            .installed
            .get(&key)
            .is_some_and(|r| r.actions == rule.actions)
        {
            return Ok(false);
        }
        let res = self.writer.write(&rule);
        self.installed.insert(key.clone(), rule);
        match res {
            Ok(()) => {
                metrics::inc_rule_written();
                Ok(true)
            }
            Err(e) => {
                metrics::inc_rule_failure();
                Err(FlowError::RuleWriteFailed {
                    key,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Deletes the rule at `key` if one is installed. Returns whether a
    /// delete was issued.
    pub fn remove(&mut self, key: &RuleKey) -> FlowResult<bool> {
        let Some(rule) = self.installed.remove(key) else {
            return Ok(false);
        };
        match self.writer.delete(&rule) {
            Ok(()) => {
                metrics::inc_rule_deleted();
                Ok(true)
            }
            Err(e) => {
                metrics::inc_rule_failure();
                Err(FlowError::RuleDeleteFailed {
                    key: key.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn get(&self, key: &RuleKey) -> Option<&Rule> {
        self.installed.get(key)
    }

    pub fn installed(&self) -> impl Iterator<Item = &Rule> {
        self.installed.values()
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: RuleWriter> RuleSink for FlowTable<W> {
    fn install(&mut self, rule: Rule) {
        if let Err(e) = self.upsert(rule) {
            tracing::warn!(error = %e, "rule install failed");
        }
    }

    fn remove(&mut self, key: RuleKey) {
        if let Err(e) = FlowTable::remove(self, &key) {
            tracing::warn!(error = %e, "rule removal failed");
        }
    }
}

/// Reconciliation scope. Each scope owns a disjoint part of the flow tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Pipeline,
    Routing,
    Ue(UeId),
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Pipeline => write!(f, "pipeline"),
            Scope::Routing => write!(f, "routing"),
            Scope::Ue(id) => write!(f, "ue {id}"),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RuleDiff {
    pub to_add: Vec<Rule>,
    pub to_remove: Vec<RuleKey>,
}

impl RuleDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Rules in `desired` that are missing from `previous` or whose actions
/// changed, and keys of `previous` that `desired` no longer has.
pub fn diff(desired: &RuleSet, previous: &RuleSet) -> RuleDiff {
    let to_add = desired
        .iter()
        .filter(|(key, rule)| {
            previous
                .get(*key)
                .map_or(true, |old| old.actions != rule.actions)
        })
        .map(|(_, rule)| rule.clone())
        .collect();
    let to_remove = previous
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .cloned()
        .collect();
    RuleDiff { to_add, to_remove }
}

/// Converges `scope` from `previous` to `desired` and returns the new
/// installed set for the scope.
pub fn reconcile<S: RuleSink + ?Sized>(
    scope: Scope,
    desired: RuleSet,
    previous: &RuleSet,
    sink: &mut S,
) -> RuleSet {
    let delta = diff(&desired, previous);
    if !delta.is_empty() {
        tracing::debug!(
            %scope,
            rules = desired.len(),
            add = delta.to_add.len(),
            remove = delta.to_remove.len(),
            "reconciling"
        );
    }
    for rule in delta.to_add {
        sink.install(rule);
    }
    for key in delta.to_remove {
        sink.remove(key);
    }
    desired
}

/// Table-miss rules chaining every table to the next one.
pub fn pipeline_rules(switch: SwitchId) -> impl Iterator<Item = Rule> {
    (0..TABLE_COUNT - 1).map(move |table| {
        Rule::new(
            switch,
            table,
            Match::default(),
            vec![Action::GotoTable(table + 1)],
        )
        .with_priority(PIPELINE_PRIORITY)
    })
}
