//! Ordered, id-keyed collection of decode rules for one device.

use crate::rule::{ConfigurationError, DecodeRule, RuleId, RuleSpec};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from rule set mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleSetError {
    #[error("rule '{0}' not found")]
    NotFound(RuleId),
    #[error("duplicate rule id '{0}'")]
    DuplicateId(RuleId),
    #[error("invalid rule: {0}")]
    Invalid(#[from] ConfigurationError),
    #[error("rule set changed (expected revision {expected}, found {actual})")]
    Stale { expected: u64, actual: u64 },
}

/// Failure to release an external resource tied to a rule.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to release resources of rule '{id}': {reason}")]
pub struct CleanupError {
    pub id: RuleId,
    pub reason: String,
}

/// Something outside the rule set holding resources keyed by rule id.
pub trait ResourceCleanup {
    fn release(&mut self, id: &RuleId) -> Result<(), CleanupError>;
}

/// Cleanup for callers with nothing registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCleanup;

impl ResourceCleanup for NoCleanup {
    fn release(&mut self, _id: &RuleId) -> Result<(), CleanupError> {
        Ok(())
    }
}

/// Rules in insertion order, ids unique. Every mutation bumps the revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<DecodeRule>,
    revision: u64,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already validated rules, rejecting duplicate ids.
    pub fn from_rules(rules: impl IntoIterator<Item = DecodeRule>) -> Result<Self, RuleSetError> {
        let mut set = Self::new();
        for rule in rules {
            set.insert(rule)?;
        }
        set.revision = 0;
        Ok(set)
    }

    /// Name used for a rule without one, by 0-based position.
    pub fn default_name(index: usize) -> String {
        format!("Rule {}", index + 1)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecodeRule> {
        self.rules.iter()
    }

    pub fn get(&self, id: &RuleId) -> Option<&DecodeRule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    fn position(&self, id: &RuleId) -> Result<usize, RuleSetError> {
        self.rules
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| RuleSetError::NotFound(id.clone()))
    }

    /// Append a rule that already carries an id.
    pub fn insert(&mut self, rule: DecodeRule) -> Result<(), RuleSetError> {
        if self.get(rule.id()).is_some() {
            return Err(RuleSetError::DuplicateId(rule.id().clone()));
        }
        self.rules.push(rule);
        self.revision += 1;
        Ok(())
    }

    /// Validate `spec`, give it a fresh id and append it.
    pub fn add(&mut self, spec: RuleSpec) -> Result<RuleId, RuleSetError> {
        let mut id = RuleId::generate();
        while self.get(&id).is_some() {
            id = RuleId::generate();
        }
        let rule = DecodeRule::new(id.clone(), spec)?;
        info!(rule = %id, name = rule.name(), "rule added");
        self.insert(rule)?;
        Ok(id)
    }

    /// Replace the rule with `id` in place, keeping its id and position.
    pub fn edit(&mut self, id: &RuleId, spec: RuleSpec) -> Result<(), RuleSetError> {
        let index = self.position(id)?;
        self.rules[index] = DecodeRule::new(id.clone(), spec)?;
        self.revision += 1;
        info!(rule = %id, "rule edited");
        Ok(())
    }

    /// Remove the rule with `id`, then ask `cleanup` to release whatever was
    /// registered for it. A failed release is logged and does not restore the
    /// rule.
    pub fn remove(
        &mut self,
        id: &RuleId,
        cleanup: &mut dyn ResourceCleanup,
    ) -> Result<DecodeRule, RuleSetError> {
        let index = self.position(id)?;
        let rule = self.rules.remove(index);
        self.revision += 1;
        release(cleanup, id);
        info!(rule = %id, "rule removed");
        Ok(rule)
    }
}

fn release(cleanup: &mut dyn ResourceCleanup, id: &RuleId) {
    if let Err(e) = cleanup.release(id) {
        warn!(rule = %id, error = %e, "resource cleanup failed");
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a DecodeRule;
    type IntoIter = std::slice::Iter<'a, DecodeRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// A [`RuleSet`] behind a lock, for editing from several tasks.
///
/// Each operation is one critical section. The `*_at` variants only apply
/// when the set is still at the revision the caller read, so interleaved
/// read-modify-write sequences surface as [`RuleSetError::Stale`] instead of
/// silently overwriting each other.
///
/// Standalone library API for embedders that edit rules outside the run
/// loop. [`Orchestrator`](crate::orchestrator::Orchestrator) owns its rule
/// sets directly and serializes edits itself, so it does not go through
/// this type.
#[derive(Debug, Clone, Default)]
pub struct SharedRuleSet {
    inner: Arc<Mutex<RuleSet>>,
}

impl SharedRuleSet {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rules)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RuleSet> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current rules.
    pub fn snapshot(&self) -> RuleSet {
        self.lock().clone()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision()
    }

    pub fn add(&self, spec: RuleSpec) -> Result<RuleId, RuleSetError> {
        self.lock().add(spec)
    }

    pub fn edit(&self, id: &RuleId, spec: RuleSpec) -> Result<(), RuleSetError> {
        self.lock().edit(id, spec)
    }

    pub fn edit_at(&self, expected: u64, id: &RuleId, spec: RuleSpec) -> Result<(), RuleSetError> {
        let mut rules = self.lock();
        check_revision(&rules, expected)?;
        rules.edit(id, spec)
    }

    /// The lock is released before `cleanup` runs.
    pub fn remove(
        &self,
        id: &RuleId,
        cleanup: &mut dyn ResourceCleanup,
    ) -> Result<DecodeRule, RuleSetError> {
        let rule = self.lock().remove(id, &mut NoCleanup)?;
        release(cleanup, id);
        Ok(rule)
    }

    pub fn remove_at(
        &self,
        expected: u64,
        id: &RuleId,
        cleanup: &mut dyn ResourceCleanup,
    ) -> Result<DecodeRule, RuleSetError> {
        let rule = {
            let mut rules = self.lock();
            check_revision(&rules, expected)?;
            rules.remove(id, &mut NoCleanup)?
        };
        release(cleanup, id);
        Ok(rule)
    }
}

fn check_revision(rules: &RuleSet, expected: u64) -> Result<(), RuleSetError> {
    if rules.revision() != expected {
        return Err(RuleSetError::Stale {
            expected,
            actual: rules.revision(),
        });
    }
    Ok(())
}
