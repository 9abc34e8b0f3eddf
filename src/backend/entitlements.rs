//! Optimistic entitlement toggles
//!
//! A toggle flips the local value at once and records which request carries
//! it. Each module tracks the last value the server confirmed; a failure only
//! reverts when it belongs to the newest request for that module, so an old
//! failure arriving after a newer toggle cannot undo the newer one.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::backend::types::EntitlementRow;

/// Modules a member can switch on or off
pub const MODULES: [&str; 3] = ["marketplace", "analytics", "events"];

#[derive(Clone, Debug, PartialEq)]
pub struct ToggleRequest {
    pub module: String,
    pub enabled: bool,
    pub generation: u64,
}

#[derive(Resource, Debug, Default)]
pub struct EntitlementToggles {
    local: HashMap<String, bool>,
    confirmed: HashMap<String, bool>,
    latest: HashMap<String, u64>,
    next_generation: u64,
    pub error: Option<String>,
}

impl EntitlementToggles {
    pub fn is_enabled(&self, module: &str) -> bool {
        self.local.get(module).copied().unwrap_or(false)
    }

    pub fn in_flight(&self, module: &str) -> bool {
        self.latest.contains_key(module)
    }

    /// Take a fresh server listing. Modules with a write still in flight
    /// keep their local value until that write resolves.
    pub fn load(&mut self, rows: &[EntitlementRow]) {
        self.confirmed = rows.iter().map(|r| (r.module.clone(), r.enabled())).collect();
        let in_flight: HashMap<String, bool> = self
            .latest
            .keys()
            .map(|m| (m.clone(), self.is_enabled(m)))
            .collect();
        self.local = self.confirmed.clone();
        self.local.extend(in_flight);
        self.error = None;
    }

    pub fn clear(&mut self) {
        *self = Self {
            next_generation: self.next_generation,
            ..Default::default()
        };
    }

    /// Flip locally and describe the write that should follow.
    pub fn toggle(&mut self, module: &str) -> ToggleRequest {
        let enabled = !self.is_enabled(module);
        self.next_generation += 1;
        let generation = self.next_generation;
        self.local.insert(module.to_string(), enabled);
        self.latest.insert(module.to_string(), generation);
        self.error = None;
        ToggleRequest {
            module: module.to_string(),
            enabled,
            generation,
        }
    }

    pub fn confirm(&mut self, row: &EntitlementRow, generation: u64) {
        let module = row.module.as_str();
        self.confirmed.insert(module.to_string(), row.enabled());
        if self.latest.get(module) == Some(&generation) {
            self.latest.remove(module);
            self.local.insert(module.to_string(), row.enabled());
        }
    }

    /// Returns true when the local value was reverted.
    pub fn fail(&mut self, module: &str, generation: u64, error: String) -> bool {
        self.error = Some(error);
        if self.latest.get(module) != Some(&generation) {
            return false;
        }
        self.latest.remove(module);
        let confirmed = self.confirmed.get(module).copied().unwrap_or(false);
        self.local.insert(module.to_string(), confirmed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(module: &str, enabled: bool) -> EntitlementRow {
        EntitlementRow::new("u1", module, enabled, Utc::now())
    }

    #[test]
    fn toggle_then_confirm() {
        let mut t = EntitlementToggles::default();
        let req = t.toggle("marketplace");
        assert!(req.enabled);
        assert!(t.is_enabled("marketplace"));
        assert!(t.in_flight("marketplace"));
        t.confirm(&row("marketplace", true), req.generation);
        assert!(t.is_enabled("marketplace"));
        assert!(!t.in_flight("marketplace"));
    }

    #[test]
    fn failure_reverts_optimistic_flip() {
        let mut t = EntitlementToggles::default();
        t.load(&[row("analytics", true)]);
        let req = t.toggle("analytics");
        assert!(!t.is_enabled("analytics"));
        assert!(t.fail("analytics", req.generation, "rejected".to_string()));
        assert!(t.is_enabled("analytics"));
        assert_eq!(t.error.as_deref(), Some("rejected"));
    }

    #[test]
    fn stale_failure_does_not_undo_newer_toggle() {
        let mut t = EntitlementToggles::default();
        let first = t.toggle("events"); // -> on
        let second = t.toggle("events"); // -> off
        assert!(!second.enabled);

        assert!(!t.fail("events", first.generation, "timeout".to_string()));
        assert!(!t.is_enabled("events"));

        t.confirm(&row("events", false), second.generation);
        assert!(!t.is_enabled("events"));
        assert!(!t.in_flight("events"));
    }

    #[test]
    fn latest_failure_reverts_to_last_confirmed() {
        let mut t = EntitlementToggles::default();
        let first = t.toggle("events"); // -> on
        let second = t.toggle("events"); // -> off
        t.confirm(&row("events", true), first.generation);
        // newest request still pending, local keeps the newest intent
        assert!(!t.is_enabled("events"));
        assert!(t.fail("events", second.generation, "conflict".to_string()));
        assert!(t.is_enabled("events"));
    }

    #[test]
    fn listing_does_not_drop_pending_toggle() {
        let mut t = EntitlementToggles::default();
        let req = t.toggle("analytics");
        // listing fetched before the upsert landed
        t.load(&[row("marketplace", true)]);
        assert!(t.is_enabled("analytics"));
        assert!(t.in_flight("analytics"));
        assert!(t.is_enabled("marketplace"));

        t.confirm(&row("analytics", true), req.generation);
        assert!(t.is_enabled("analytics"));
        assert!(!t.in_flight("analytics"));
    }

    #[test]
    fn listing_then_failure_reverts_to_listed_value() {
        let mut t = EntitlementToggles::default();
        let req = t.toggle("events");
        t.load(&[row("events", true)]);
        // local keeps the pending intent (off -> on)
        assert!(t.is_enabled("events"));
        assert!(t.fail("events", req.generation, "conflict".to_string()));
        assert!(t.is_enabled("events"));

        let req = t.toggle("events");
        t.load(&[]);
        assert!(!t.is_enabled("events"));
        assert!(t.fail("events", req.generation, "conflict".to_string()));
        assert!(!t.is_enabled("events"));
    }

    #[test]
    fn generations_survive_clear() {
        let mut t = EntitlementToggles::default();
        let a = t.toggle("marketplace");
        t.clear();
        let b = t.toggle("marketplace");
        assert!(b.generation > a.generation);
        assert!(b.enabled);
    }
}
