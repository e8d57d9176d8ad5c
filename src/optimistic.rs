//! Tentative updates that are either confirmed by the server or rolled back.
//!
//! A mutation is two steps. `begin` applies a guessed state to a shared cell
//! right away and hands back a [`Pending`] that remembers what was there
//! before. Once the server answers, the pending change is resolved: the
//! server's state replaces the guess, or the prior state comes back. Only one
//! change per key may be pending; a second `begin` is refused rather than
//! stacked, so two guesses can never compound on the same counter.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use crate::error::{BlogError, BlogResult};

/// How a pending change ended.
#[derive(Debug)]
pub enum Outcome<S> {
    /// The server's state was adopted.
    Confirmed(S),
    /// The prior state was put back.
    RolledBack { restored: S, error: BlogError },
}

impl<S> Outcome<S> {
    pub fn into_result(self) -> BlogResult<S> {
        match self {
            Outcome::Confirmed(state) => Ok(state),
            Outcome::RolledBack { error, .. } => Err(error),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }
}

pub struct MutationCoordinator<K> {
    in_flight: Mutex<HashSet<K>>,
}

impl<K> Default for MutationCoordinator<K> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
        }
    }
}

impl<K: Eq + Hash + Clone + Display> MutationCoordinator<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.keys().contains(key)
    }

    /// Apply `transition` to `cell` and register the change under `key`.
    ///
    /// Fails with `Busy` and leaves `cell` alone if `key` already has a
    /// pending change.
    pub fn begin<'a, S: Clone>(
        &'a self,
        key: K,
        cell: &'a Mutex<S>,
        transition: impl FnOnce(&S) -> S,
    ) -> BlogResult<Pending<'a, K, S>> {
        {
            let mut keys = self.keys();
            if !keys.insert(key.clone()) {
                tracing::debug!("Rejecting overlapping change to {}", key);
                return Err(BlogError::Busy(key.to_string()));
            }
        }

        let prior = {
            let mut state = lock(cell);
            let prior = state.clone();
            *state = transition(&prior);
            prior
        };

        Ok(Pending {
            coordinator: self,
            key,
            cell,
            prior,
            resolved: false,
        })
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<K>> {
        lock(&self.in_flight)
    }
}

/// A tentative change that has been applied but not yet confirmed.
///
/// Dropping it unresolved (for example when the awaiting task is cancelled)
/// restores the prior state.
pub struct Pending<'a, K: Eq + Hash, S: Clone> {
    coordinator: &'a MutationCoordinator<K>,
    key: K,
    cell: &'a Mutex<S>,
    prior: S,
    resolved: bool,
}

impl<'a, K: Eq + Hash, S: Clone> Pending<'a, K, S> {
    pub fn prior(&self) -> &S {
        &self.prior
    }

    pub fn confirm(mut self, state: S) -> Outcome<S> {
        *lock(self.cell) = state.clone();
        self.resolved = true;
        Outcome::Confirmed(state)
    }

    pub fn roll_back(mut self, error: BlogError) -> Outcome<S> {
        let restored = self.prior.clone();
        *lock(self.cell) = restored.clone();
        self.resolved = true;
        Outcome::RolledBack { restored, error }
    }

    pub fn resolve(self, result: BlogResult<S>) -> Outcome<S> {
        match result {
            Ok(state) => self.confirm(state),
            Err(error) => self.roll_back(error),
        }
    }
}

impl<'a, K: Eq + Hash, S: Clone> Drop for Pending<'a, K, S> {
    fn drop(&mut self) {
        if !self.resolved {
            *lock(self.cell) = self.prior.clone();
        }
        lock(&self.coordinator.in_flight).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
