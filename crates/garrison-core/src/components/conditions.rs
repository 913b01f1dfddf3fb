//! Token ledger: stack-counted named conditions per entity.
//!
//! Every grant returns a fresh opaque token; revoking a token pops one
//! stacked instance of its condition. Multiple unrelated call sites (a
//! master, a container, per-passenger-type grants) can stack the same name
//! without coordinating - the ledger is the reference count.

use std::collections::HashMap;

/// Opaque handle for one granted condition instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionToken(u32);

impl ConditionToken {
    /// Sentinel for "not currently held".
    pub const INVALID: ConditionToken = ConditionToken(u32::MAX);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// A zero-to-one or one-to-zero crossing of a condition's instance count.
/// Drained once per tick into the notification log so dependent systems can
/// react to a condition becoming (un)available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionChange {
    pub name: String,
    pub enabled: bool,
}

/// Per-entity condition ledger component.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    next_token: u32,
    tokens: HashMap<ConditionToken, String>,
    counts: HashMap<String, u32>,
    changes: Vec<ConditionChange>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant one instance of `name`. Always succeeds; instances stack.
    pub fn grant(&mut self, name: &str) -> ConditionToken {
        let token = ConditionToken(self.next_token);
        self.next_token += 1;
        self.tokens.insert(token, name.to_string());
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.changes.push(ConditionChange {
                name: name.to_string(),
                enabled: true,
            });
        }
        token
    }

    /// Revoke one granted instance. No-op for the invalid sentinel and for
    /// tokens already revoked; the count never goes negative. Returns the
    /// invalid token so callers can overwrite their stored handle.
    pub fn revoke(&mut self, token: ConditionToken) -> ConditionToken {
        if !token.is_valid() {
            return ConditionToken::INVALID;
        }
        let Some(name) = self.tokens.remove(&token) else {
            return ConditionToken::INVALID;
        };
        if let Some(count) = self.counts.get_mut(&name) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&name);
                self.changes.push(ConditionChange {
                    name,
                    enabled: false,
                });
            }
        }
        ConditionToken::INVALID
    }

    pub fn token_valid(&self, token: ConditionToken) -> bool {
        self.tokens.contains_key(&token)
    }

    pub fn count(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn has(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    /// Drain the edge crossings accumulated since the last call.
    pub fn take_changes(&mut self) -> Vec<ConditionChange> {
        std::mem::take(&mut self.changes)
    }
}
