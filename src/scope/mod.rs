//! Scope-to-task binding: at most one live task per scope, keyed rebinding.
//!
//! A *scope* is a host-side unit of lifetime (a view, a session, a
//! subscription slot) identified by a scope id. Each scope holds at most one
//! scoped task, registered under a *key* describing what the task consumes.
//! Rebinding a scope to a different key cancels the previous task and hands
//! back a fresh future for the host to spawn; rebinding to the same key is a
//! no-op while a task is registered, even after it has finished. Restarting
//! is always an explicit unbind-then-bind.
//!
//! The manager never blocks and never waits for a cancelled task to wind
//! down. Cancellation is a request; the driver observes it at its next
//! suspension point and tears itself down.
//!
//! # Example
//!
//! ```ignore
//! let mut scopes: ScopeManager<ViewId, Topic, TaskError<Error>> = ScopeManager::new();
//! if let Some(task) = scopes.bind(view, Some(topic), |topic| {
//!     drive(CancelToken::new(), subscribe(topic), on_item).into_task()
//! }) {
//!     executor.spawn(task);
//! }
//! ```

use crate::task::{TaskFuture, TaskHandle};
use crate::tracing_compat::{debug, trace};
use crate::types::CancelReason;
use std::collections::HashMap;
use std::hash::Hash;

/// A single scope's binding slot.
///
/// Standalone slots suit hosts with a fixed set of scopes; [`ScopeManager`]
/// keys a dynamic collection of them by scope id.
#[derive(Debug)]
pub struct ScopeSlot<K, E> {
    binding: Option<Binding<K, E>>,
}

#[derive(Debug)]
struct Binding<K, E> {
    key: K,
    handle: TaskHandle<E>,
}

impl<K, E> Default for ScopeSlot<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> ScopeSlot<K, E> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { binding: None }
    }

    /// Returns the current task's handle, if one is registered.
    #[must_use]
    pub fn handle(&self) -> Option<&TaskHandle<E>> {
        self.binding.as_ref().map(|b| &b.handle)
    }

    /// Returns the current key, if the slot is bound.
    #[must_use]
    pub fn key(&self) -> Option<&K> {
        self.binding.as_ref().map(|b| &b.key)
    }

    /// Returns true if no task is registered.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.binding.is_none()
    }

    /// Unbinds the slot, cancelling any current task with `reason`.
    pub fn clear(&mut self, reason: CancelReason) {
        self.release(reason);
    }

    fn release(&mut self, reason: CancelReason) {
        if let Some(binding) = self.binding.take() {
            trace!(%reason, "cancelling superseded task");
            binding.handle.cancel(reason);
        }
    }
}

impl<K: PartialEq, E> ScopeSlot<K, E> {
    /// Rebinds this slot to `key`, building the replacement task on demand.
    ///
    /// - `Some(key)` equal to the current binding's key: no-op, returns
    ///   `None`. A finished task is not restarted; restart is an explicit
    ///   unbind followed by a bind.
    /// - `Some(key)` differing from the current binding: the old task is
    ///   cancelled with [`CancelReason::key_changed`], `factory` is invoked
    ///   with the new key, and the new task's future is returned for the
    ///   host to spawn.
    /// - `None`: unbinds, cancelling any current task with
    ///   [`CancelReason::scope_closed`].
    pub fn bind<F>(&mut self, key: Option<K>, factory: F) -> Option<TaskFuture>
    where
        F: FnOnce(&K) -> (TaskHandle<E>, TaskFuture),
    {
        match key {
            Some(key) => {
                if let Some(binding) = &self.binding {
                    if binding.key == key {
                        trace!("bind to current key, keeping registered task");
                        return None;
                    }
                }
                self.release(CancelReason::key_changed());
                let (handle, fut) = factory(&key);
                self.binding = Some(Binding { key, handle });
                Some(fut)
            }
            None => {
                self.release(CancelReason::scope_closed());
                None
            }
        }
    }
}

/// Keyed collection of scope slots.
///
/// `Id` identifies the scope, `K` the binding key, `E` the task error type.
/// All operations are synchronous and non-blocking; any returned
/// [`TaskFuture`] must be spawned by the host for the new task to run.
#[derive(Debug)]
pub struct ScopeManager<Id, K, E> {
    scopes: HashMap<Id, ScopeSlot<K, E>>,
}

impl<Id, K, E> Default for ScopeManager<Id, K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, K, E> ScopeManager<Id, K, E> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: HashMap::new(),
        }
    }

    /// Returns the number of currently bound scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Returns true if no scopes are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl<Id, K, E> ScopeManager<Id, K, E>
where
    Id: Eq + Hash,
    K: PartialEq,
{
    /// Rebinds scope `id` to `key`; see [`ScopeSlot::bind`] for semantics.
    ///
    /// Binding an unknown scope id creates it. Binding `None` cancels the
    /// scope's task and forgets the scope entirely, so a host cycling
    /// through many distinct ids never grows the registry; on an unknown id
    /// it is a no-op.
    pub fn bind<F>(&mut self, id: Id, key: Option<K>, factory: F) -> Option<TaskFuture>
    where
        F: FnOnce(&K) -> (TaskHandle<E>, TaskFuture),
    {
        match key {
            Some(key) => {
                debug!("binding scope");
                self.scopes
                    .entry(id)
                    .or_insert_with(ScopeSlot::new)
                    .bind(Some(key), factory)
            }
            None => {
                if let Some(mut slot) = self.scopes.remove(&id) {
                    debug!("unbinding scope");
                    slot.clear(CancelReason::scope_closed());
                }
                None
            }
        }
    }

    /// Tears down scope `id`: cancels its task with
    /// [`CancelReason::scope_closed`] and forgets the scope.
    pub fn teardown(&mut self, id: &Id) {
        if let Some(mut slot) = self.scopes.remove(id) {
            debug!("tearing down scope");
            slot.clear(CancelReason::scope_closed());
        }
    }

    /// Shuts the manager down: cancels every task with
    /// [`CancelReason::shutdown`] and forgets all scopes.
    pub fn shutdown(&mut self) {
        debug!(scopes = self.scopes.len(), "scope manager shutdown");
        for slot in self.scopes.values_mut() {
            slot.clear(CancelReason::shutdown());
        }
        self.scopes.clear();
    }

    /// Returns the handle of the task bound in scope `id`, if any.
    #[must_use]
    pub fn handle(&self, id: &Id) -> Option<&TaskHandle<E>> {
        self.scopes.get(id).and_then(ScopeSlot::handle)
    }

    /// Returns the key scope `id` is bound to, if any.
    #[must_use]
    pub fn key(&self, id: &Id) -> Option<&K> {
        self.scopes.get(id).and_then(ScopeSlot::key)
    }
}
