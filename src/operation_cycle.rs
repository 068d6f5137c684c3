//! Operation-cycle registry.
//!
//! Tracks whether each named operation cycle (ignition, power, warm-up) is
//! currently running, and tells an optional observer when that changes.

use std::sync::Arc;

use crate::error::DiagResult;
use crate::notifier::call_isolated;
use crate::registry::Registry;

/// Callback invoked with `(cycle id, active)`.
pub type OperationCycleNotifier = Arc<dyn Fn(&str, bool) + Send + Sync>;

struct CycleEntry {
    active: bool,
    notifier: Option<OperationCycleNotifier>,
}

/// Registry of operation cycles.
#[derive(Debug)]
pub struct OperationCycleRegistry {
    cycles: Registry<String, CycleEntry>,
}

impl Default for OperationCycleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationCycleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycles: Registry::new("operation_cycle"),
        }
    }

    /// Register an inactive operation cycle.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::AlreadyExists` if `id` is registered.
    pub fn register_operation_cycle(
        &self,
        id: impl Into<String>,
        notifier: Option<OperationCycleNotifier>,
    ) -> DiagResult<()> {
        let id = id.into();
        self.cycles.insert(id.clone(), CycleEntry { active: false, notifier })?;
        tracing::debug!(cycle = %id, "operation cycle registered");
        Ok(())
    }

    /// Remove an operation cycle.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn unregister_operation_cycle(&self, id: &str) -> DiagResult<()> {
        let removed = self.cycles.remove(id)?;
        drop(removed);
        Ok(())
    }

    /// Start or stop a cycle; the notifier only hears about actual changes.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn set_operation_cycle_state(&self, id: &str, active: bool) -> DiagResult<()> {
        let pending = self.cycles.mutate(id, |entry| {
            if entry.active == active {
                return None;
            }
            entry.active = active;
            Some(entry.notifier.clone())
        })?;

        if let Some(notifier) = pending {
            tracing::debug!(cycle = id, active, "operation cycle state changed");
            if let Some(notifier) = notifier {
                call_isolated("operation_cycle", &id, || notifier(id, active));
            }
        }
        Ok(())
    }

    /// Whether the cycle is running.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn operation_cycle_state(&self, id: &str) -> DiagResult<bool> {
        self.cycles.mutate(id, |entry| entry.active)
    }

    /// Attach, replace or remove the notifier of a cycle.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn set_operation_cycle_notifier(&self, id: &str, notifier: Option<OperationCycleNotifier>) -> DiagResult<()> {
        let previous = self
            .cycles
            .mutate(id, |entry| std::mem::replace(&mut entry.notifier, notifier))?;
        drop(previous);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn starts_inactive_and_notifies_on_change_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let n: OperationCycleNotifier = Arc::new(move |id: &str, active: bool| {
            sink.lock().unwrap().push((id.to_string(), active));
        });

        let reg = OperationCycleRegistry::new();
        reg.register_operation_cycle("ignition", Some(n)).unwrap();
        assert!(!reg.operation_cycle_state("ignition").unwrap());

        reg.set_operation_cycle_state("ignition", false).unwrap();
        reg.set_operation_cycle_state("ignition", true).unwrap();
        reg.set_operation_cycle_state("ignition", true).unwrap();
        reg.set_operation_cycle_state("ignition", false).unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("ignition".to_string(), true), ("ignition".to_string(), false)]
        );
    }

    #[test]
    fn state_changes_without_notifier() {
        let reg = OperationCycleRegistry::new();
        reg.register_operation_cycle("power", None).unwrap();
        reg.set_operation_cycle_state("power", true).unwrap();
        assert!(reg.operation_cycle_state("power").unwrap());
    }

    #[test]
    fn unknown_cycle_is_not_found() {
        let reg = OperationCycleRegistry::new();
        assert!(reg.operation_cycle_state("x").unwrap_err().is_not_found());
        assert!(reg.set_operation_cycle_state("x", true).unwrap_err().is_not_found());
        assert!(reg.set_operation_cycle_notifier("x", None).unwrap_err().is_not_found());

        reg.register_operation_cycle("x", None).unwrap();
        assert!(reg.register_operation_cycle("x", None).unwrap_err().is_already_exists());
        reg.unregister_operation_cycle("x").unwrap();
        assert!(reg.unregister_operation_cycle("x").unwrap_err().is_not_found());
    }
}
