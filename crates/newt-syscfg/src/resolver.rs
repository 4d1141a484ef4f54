//! Merge setting definitions with overrides under the precedence order.
//!
//! The resolver is filled incrementally while the package resolver
//! expands the package set: definitions and overrides arrive as packages
//! join, [`Syscfg::reevaluate`] recomputes the value map (conditional
//! overrides may flip as values settle), and [`Syscfg::finalize`] runs
//! the full validation pass once the outer fix-point converges.

use crate::error::{Result, SyscfgError};
use crate::setting::{HistoryEntry, OverrideLevel, Restriction, SettingDef};
use ahash::AHashSet;
use newt_core::{Expr, SettingLookup};
use std::collections::BTreeMap;
use tracing::debug;

/// Winner selection among ambiguous same-level overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AmbiguityPolicy {
    /// First override recorded wins.
    #[default]
    FirstSeen,
    /// Last override recorded wins.
    LastSeen,
}

/// Report produced by a successful [`Syscfg::finalize`].
#[derive(Debug, Clone, Default)]
pub struct SyscfgReport {
    /// Non-fatal findings: ambiguities, deprecations, violated
    /// restrictions, orphan overrides.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
struct SettingRecord {
    def: SettingDef,
    def_source: String,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Orphan {
    source: String,
    level: OverrideLevel,
    name: String,
    value: String,
    expr: Option<Expr>,
}

/// The system-configuration table of one resolution.
#[derive(Debug, Default)]
pub struct Syscfg {
    policy: AmbiguityPolicy,
    settings: BTreeMap<String, SettingRecord>,
    /// Overrides naming settings nobody has defined yet. A later
    /// fix-point iteration may bring the definer in; whatever is left at
    /// finalize is reported.
    orphans: Vec<Orphan>,
    values: BTreeMap<String, String>,
}

struct EnvLookup<'a>(&'a BTreeMap<String, String>);

impl SettingLookup for EnvLookup<'_> {
    fn setting_value(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl SettingLookup for Syscfg {
    fn setting_value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

impl Syscfg {
    /// Create an empty table.
    #[must_use]
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Record a package's setting definitions. Re-adding the same
    /// package's definitions is a no-op, so fix-point iterations can
    /// revisit packages freely.
    ///
    /// Returns whether anything new was recorded.
    pub fn add_defs(&mut self, source: &str, defs: &[SettingDef]) -> Result<bool> {
        let mut changed = false;
        for def in defs {
            if let Some(existing) = self.settings.get(&def.name) {
                if existing.def_source == source {
                    continue;
                }
                return Err(SyscfgError::DuplicateDefinition {
                    setting: def.name.clone(),
                    first: existing.def_source.clone(),
                    second: source.to_string(),
                });
            }

            let mut history = vec![HistoryEntry {
                source: source.to_string(),
                value: def.value.clone(),
                expr: None,
                level: OverrideLevel::Definition,
            }];

            // Adopt overrides that arrived before the definition.
            let mut remaining = Vec::with_capacity(self.orphans.len());
            for orphan in self.orphans.drain(..) {
                if orphan.name == def.name {
                    history.push(HistoryEntry {
                        source: orphan.source,
                        value: orphan.value,
                        expr: orphan.expr,
                        level: orphan.level,
                    });
                } else {
                    remaining.push(orphan);
                }
            }
            self.orphans = remaining;

            self.settings.insert(
                def.name.clone(),
                SettingRecord {
                    def: def.clone(),
                    def_source: source.to_string(),
                    history,
                },
            );
            changed = true;
        }
        Ok(changed)
    }

    /// Record one override. Duplicate records (same source, level, name,
    /// value, predicate) are dropped so iterations stay idempotent.
    ///
    /// Returns whether anything new was recorded.
    pub fn add_override(
        &mut self,
        source: &str,
        level: OverrideLevel,
        name: &str,
        value: impl Into<String>,
        expr: Option<Expr>,
    ) -> bool {
        let value = value.into();
        if let Some(record) = self.settings.get_mut(name) {
            let entry = HistoryEntry {
                source: source.to_string(),
                value,
                expr,
                level,
            };
            if record.history.contains(&entry) {
                return false;
            }
            record.history.push(entry);
            return true;
        }

        let orphan = Orphan {
            source: source.to_string(),
            level,
            name: name.to_string(),
            value,
            expr,
        };
        if self.orphans.contains(&orphan) {
            return false;
        }
        self.orphans.push(orphan);
        true
    }

    /// Programmatic engine injection, highest precedence.
    pub fn inject(&mut self, name: &str, value: impl Into<String>) -> bool {
        self.add_override("newt", OverrideLevel::Injected, name, value, None)
    }

    /// Recompute the value map. Conditional overrides are re-evaluated
    /// until the map is stable; the iteration count is bounded by the
    /// history size, after which the last map stands.
    ///
    /// Returns whether any value changed since the previous call.
    pub fn reevaluate(&mut self) -> bool {
        let cap = 2 + self
            .settings
            .values()
            .map(|r| r.history.len())
            .sum::<usize>();

        let mut env = self.values.clone();
        for _ in 0..cap {
            let next = self.compute_once(&env);
            if next == env {
                break;
            }
            env = next;
        }

        let changed = env != self.values;
        if changed {
            debug!(settings = self.settings.len(), "syscfg values moved");
        }
        self.values = env;
        changed
    }

    /// One evaluation pass under a fixed environment.
    fn compute_once(&self, env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let lookup = EnvLookup(env);

        // Raw winners first, references second.
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        for (name, record) in &self.settings {
            if let Some(entry) = self.winning_entry(record, &lookup) {
                raw.insert(name.clone(), entry.value.clone());
            }
        }

        let mut out = BTreeMap::new();
        for name in raw.keys() {
            let resolved = resolve_reference(name, &raw, &mut AHashSet::new())
                .unwrap_or_else(|| raw[name].clone());
            out.insert(name.clone(), resolved);
        }
        out
    }

    /// The active entry with the highest precedence; among equal-level
    /// entries the ambiguity policy picks.
    fn winning_entry<'a>(
        &self,
        record: &'a SettingRecord,
        lookup: &dyn SettingLookup,
    ) -> Option<&'a HistoryEntry> {
        let active = record
            .history
            .iter()
            .filter(|e| e.expr.as_ref().map_or(true, |x| x.eval(lookup)));

        let mut winner: Option<&HistoryEntry> = None;
        for entry in active {
            winner = Some(match winner {
                None => entry,
                Some(current) => {
                    if entry.level > current.level {
                        entry
                    } else if entry.level == current.level
                        && self.policy == AmbiguityPolicy::LastSeen
                    {
                        entry
                    } else {
                        current
                    }
                }
            });
        }
        winner
    }

    /// Current value of a setting.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The flat value map.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// A setting's full history, definition first.
    #[must_use]
    pub fn history(&self, name: &str) -> Option<&[HistoryEntry]> {
        self.settings.get(name).map(|r| r.history.as_slice())
    }

    /// Names of all defined settings, sorted.
    pub fn setting_names(&self) -> impl Iterator<Item = &str> {
        self.settings.keys().map(String::as_str)
    }

    /// Total recorded state, used by the outer fix-point to detect
    /// growth.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.orphans.len()
            + self
                .settings
                .values()
                .map(|r| r.history.len())
                .sum::<usize>()
    }

    /// Validate everything and produce the final report. The value map
    /// must already be at fix-point (call [`Syscfg::reevaluate`] first).
    ///
    /// All failures are collected and returned together.
    pub fn finalize(&mut self) -> Result<SyscfgReport> {
        self.reevaluate();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let lookup = EnvLookup(&self.values);

        // Raw winners, for reference-cycle checking.
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        for (name, record) in &self.settings {
            if let Some(entry) = self.winning_entry(record, &lookup) {
                raw.insert(name.clone(), entry.value.clone());
            }
        }

        for (name, record) in &self.settings {
            let active: Vec<&HistoryEntry> = record
                .history
                .iter()
                .filter(|e| e.expr.as_ref().map_or(true, |x| x.eval(&lookup)))
                .collect();

            let Some(winner) = self.winning_entry(record, &lookup) else {
                continue;
            };

            // Reference cycles are fatal. Recursion only ever follows
            // values that name a live setting, so `None` means a cycle.
            let mut seen = AHashSet::new();
            if resolve_reference(name, &raw, &mut seen).is_none() {
                let mut chain: Vec<String> = seen.into_iter().collect();
                chain.sort();
                errors.push(SyscfgError::Cycle { chain });
                continue;
            }

            let final_value = self.values.get(name).cloned().unwrap_or_default();

            // Type enforcement, on every active entry. Entries whose
            // value references another setting are checked against the
            // copied value.
            for entry in &active {
                let effective = if raw.contains_key(&entry.value) {
                    self.values.get(&entry.value).cloned().unwrap_or_default()
                } else {
                    entry.value.clone()
                };
                if !record.def.typ.accepts(&effective) {
                    errors.push(SyscfgError::TypeMismatch {
                        setting: name.clone(),
                        value: effective,
                        typ: record.def.typ.to_string(),
                        source_pkg: entry.source.clone(),
                    });
                }
            }

            // Same-level disagreements at the winning level.
            let rivals: Vec<&&HistoryEntry> = active
                .iter()
                .filter(|e| e.level == winner.level && e.value != winner.value)
                .collect();
            if !rivals.is_empty() {
                if winner.level == OverrideLevel::Injected {
                    errors.push(SyscfgError::Ambiguous {
                        setting: name.clone(),
                        first: winner.value.clone(),
                        second: rivals[0].value.clone(),
                    });
                } else {
                    let mut sources: Vec<String> = active
                        .iter()
                        .filter(|e| e.level == winner.level)
                        .map(|e| e.source.clone())
                        .collect();
                    sources.sort();
                    sources.dedup();
                    warnings.push(format!(
                        "setting {name}: ambiguous {} overrides from {}; using \"{}\"",
                        winner.level,
                        sources.join(", "),
                        winner.value
                    ));
                }
            }

            // Deprecation warns once someone overrides the setting.
            if record.def.deprecated && active.len() > 1 {
                warnings.push(format!(
                    "setting {name} is deprecated (defined by {})",
                    record.def_source
                ));
            }

            // Restrictions.
            for restriction in &record.def.restrictions {
                match restriction {
                    Restriction::NotNull => {
                        if final_value.is_empty() {
                            warnings.push(format!("setting {name} must not be null"));
                        }
                    }
                    Restriction::Expr(expr) => {
                        let in_effect = !final_value.is_empty() && final_value != "0";
                        if in_effect && !expr.eval(&lookup) {
                            warnings.push(format!(
                                "setting {name} violates restriction \"{expr}\""
                            ));
                        }
                    }
                }
            }
        }

        for orphan in &self.orphans {
            warnings.push(format!(
                "override of undefined setting {} from {} ignored",
                orphan.name, orphan.source
            ));
        }

        // Freeze histories into precedence order, keeping insertion
        // order within a level.
        for record in self.settings.values_mut() {
            record.history.sort_by_key(|e| e.level);
        }

        match errors.len() {
            0 => Ok(SyscfgReport { warnings }),
            1 => Err(errors.pop().expect("len checked")),
            _ => Err(SyscfgError::Composite(errors)),
        }
    }
}

/// Follow bare-identifier value references through `raw`. Returns `None`
/// on a cycle, with `seen` holding the chain.
fn resolve_reference(
    name: &str,
    raw: &BTreeMap<String, String>,
    seen: &mut AHashSet<String>,
) -> Option<String> {
    if !seen.insert(name.to_string()) {
        return None;
    }
    let value = raw.get(name)?;
    if raw.contains_key(value.as_str()) {
        return resolve_reference(value, raw, seen);
    }
    Some(value.clone())
}
