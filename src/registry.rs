//! Connection registry and broadcast
//!
//! The single shared map from identifier to connection handle. One mutex
//! covers lookups, inserts, removals and whole broadcast passes. The lock
//! is never held across an `.await`: enqueueing is `try_send`, so a slow
//! peer can never stall it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::ConnectionHandle;
use crate::config::DuplicateNames;
use crate::error::EnqueueError;
use crate::message::ServerMessage;
use crate::types::Identifier;

/// Per-call delivery counts from [`Registry::broadcast`]
///
/// Server-side bookkeeping only; nothing is reported to the sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Recipients whose queue accepted the message
    pub delivered: usize,
    /// Recipients whose queue was full or closed
    pub dropped: usize,
}

/// Shared directory of connected peers
#[derive(Debug)]
pub struct Registry {
    connections: Mutex<HashMap<Identifier, ConnectionHandle>>,
    duplicate_names: DuplicateNames,
}

impl Registry {
    pub fn new(duplicate_names: DuplicateNames) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            duplicate_names,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Identifier, ConnectionHandle>> {
        // Every critical section is a single insert/remove/iterate
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `handle` under `identifier`, replacing any existing entry
    ///
    /// No uniqueness check. The displaced handle, if any, is returned
    /// without being closed.
    pub fn register(&self, identifier: Identifier, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut connections = self.lock();
        let displaced = connections.insert(identifier, handle);
        debug!("Total connections: {}", connections.len());
        displaced
    }

    /// Register a new peer under `requested`, applying the duplicate policy
    ///
    /// `make_handle` receives the identifier actually assigned. Name
    /// selection and insertion happen under one lock acquisition.
    pub fn claim<F>(&self, requested: Identifier, make_handle: F) -> Identifier
    where
        F: FnOnce(Identifier) -> ConnectionHandle,
    {
        let mut connections = self.lock();

        let identifier = match self.duplicate_names {
            DuplicateNames::Overwrite => requested,
            DuplicateNames::Suffix => {
                let mut candidate = requested.clone();
                let mut n = 2;
                while connections.contains_key(&candidate) {
                    candidate = requested.with_suffix(n);
                    n += 1;
                }
                candidate
            }
        };

        let handle = make_handle(identifier.clone());
        if let Some(displaced) = connections.insert(identifier.clone(), handle) {
            warn!(
                identifier = %displaced.identifier,
                displaced = %displaced.id,
                "Duplicate name overwrote an existing connection"
            );
        }
        debug!("Total connections: {}", connections.len());

        identifier
    }

    /// Remove `identifier` and close its connection
    ///
    /// Returns `false` (and does nothing else) if it was not registered.
    pub fn unregister(&self, identifier: &Identifier) -> bool {
        let mut connections = self.lock();
        match connections.remove(identifier) {
            Some(handle) => {
                info!(identifier = %handle.identifier, conn = %handle.id, "Unregistered");
                handle.close();
                debug!("Total connections: {}", connections.len());
                true
            }
            None => false,
        }
    }

    /// Enqueue `msg` on every registered connection's outbound queue
    ///
    /// The entry for `origin` is skipped unless `include_origin` is set.
    /// Never waits: a full or closed queue drops the message for that
    /// recipient only.
    pub fn broadcast(&self, origin: &Identifier, msg: &ServerMessage, include_origin: bool) -> BroadcastOutcome {
        let connections = self.lock();
        let mut outcome = BroadcastOutcome::default();

        for (identifier, handle) in connections.iter() {
            if !include_origin && identifier == origin {
                continue;
            }
            match handle.try_enqueue(msg.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(EnqueueError::Full) => {
                    warn!(recipient = %identifier, "Dropping message (outbound queue full)");
                    outcome.dropped += 1;
                }
                Err(EnqueueError::Closed) => {
                    debug!(recipient = %identifier, "Dropping message (writer gone)");
                    outcome.dropped += 1;
                }
            }
        }

        outcome
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.lock().contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<Identifier> {
        let mut ids: Vec<Identifier> = self.lock().keys().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids
    }
}
