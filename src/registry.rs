//! Keyed, mutex-guarded registry.
//!
//! One registry owns every entry of its kind (monitors, DTCs, operation
//! cycles). All access goes through a single lock. Closures handed to
//! [`Registry::mutate`] and [`Registry::scan_mut`] run while the lock is held,
//! so they must only touch the entry and return plain data; notifier calls
//! happen after the registry method has returned.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DiagError, DiagResult};

fn lock_err(kind: &'static str, op: &'static str) -> DiagError {
    tracing::error!(registry = kind, op, "registry lock poisoned");
    DiagError::internal(format!("poisoned lock: {kind}.{op}"))
}

/// Mapping from key to entry guarded by one lock.
pub struct Registry<K, V> {
    kind: &'static str,
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> fmt::Debug for Registry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Display,
{
    /// Create an empty registry; `kind` names the entries in error messages.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The entry kind this registry holds.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    fn lock(&self, op: &'static str) -> DiagResult<MutexGuard<'_, HashMap<K, V>>> {
        self.entries.lock().map_err(|_| lock_err(self.kind, op))
    }

    /// Insert a new entry.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::AlreadyExists` if the key is present; the existing
    /// entry is left untouched.
    pub fn insert(&self, key: K, value: V) -> DiagResult<()> {
        let mut entries = self.lock("insert")?;
        if entries.contains_key(&key) {
            return Err(DiagError::already_exists(self.kind, &key));
        }
        entries.insert(key, value);
        Ok(())
    }

    /// Remove an entry and return it.
    ///
    /// The removed value is dropped by the caller, after the lock is released.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if the key is absent.
    pub fn remove<Q>(&self, key: &Q) -> DiagResult<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        let removed = self.lock("remove")?.remove(key);
        removed.ok_or_else(|| DiagError::not_found(self.kind, key))
    }

    /// Read an entry, returning `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the lock is poisoned.
    pub fn get<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> DiagResult<Option<R>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.lock("get")?;
        Ok(entries.get(key).map(f))
    }

    /// Mutate an entry in place under the lock.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if the key is absent.
    pub fn mutate<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> DiagResult<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        let mut entries = self.lock("mutate")?;
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| DiagError::not_found(self.kind, key))?;
        Ok(f(entry))
    }

    /// Visit every entry under one lock acquisition, collecting what `f` returns.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the lock is poisoned.
    pub fn scan_mut<R>(&self, mut f: impl FnMut(&K, &mut V) -> Option<R>) -> DiagResult<Vec<R>> {
        let mut entries = self.lock("scan")?;
        Ok(entries.iter_mut().filter_map(|(k, v)| f(k, v)).collect())
    }

    /// Snapshot of all keys.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the lock is poisoned.
    pub fn keys(&self) -> DiagResult<Vec<K>>
    where
        K: Clone,
    {
        Ok(self.lock("keys")?.keys().cloned().collect())
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the lock is poisoned.
    pub fn len(&self) -> DiagResult<usize> {
        Ok(self.lock("len")?.len())
    }

    /// True if the registry holds no entries.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the lock is poisoned.
    pub fn is_empty(&self) -> DiagResult<bool> {
        Ok(self.lock("len")?.is_empty())
    }
}
