//! # Vault Service
//!
//! Single-writer, copy-on-write access to a [`Vault`] from many threads.
//!
//! Writers queue on one mutex. A command runs against a private clone of
//! the current vault; on success the clone is published as the new current
//! version, on failure it is dropped. Either the whole command lands or
//! nothing does.
//!
//! The request log, share balances, principal and asset ledger live in
//! persistent collections, so that clone shares their structure with the
//! published version and only the paths a command touches are copied.
//!
//! Readers take an `Arc` snapshot. A snapshot is a complete, consistent
//! vault and never changes under the reader, no matter how many commands
//! commit afterwards.

use std::sync::Arc;
use std::time::Instant;

use meridian_protocol::ledger::AssetLedger;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::VaultError;
use crate::events::VaultEvent;
use crate::vault::Vault;

/// Result of a committed command.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Whatever the command returned.
    pub value: T,
    /// Events the command emitted, in order.
    pub events: Vec<VaultEvent>,
    /// Version number of the vault after the commit.
    pub version: u64,
}

/// Thread-safe handle to a vault.
#[derive(Debug)]
pub struct VaultService<L> {
    current: RwLock<(u64, Arc<Vault<L>>)>,
    writer: Mutex<()>,
}

impl<L: AssetLedger + Clone> VaultService<L> {
    /// Wraps `vault` as version 0.
    pub fn new(vault: Vault<L>) -> Self {
        Self {
            current: RwLock::new((0, Arc::new(vault))),
            writer: Mutex::new(()),
        }
    }

    /// The current vault. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Vault<L>> {
        Arc::clone(&self.current.read().1)
    }

    /// Number of commands committed so far.
    pub fn version(&self) -> u64 {
        self.current.read().0
    }

    /// Runs `command` as one atomic step.
    ///
    /// # Errors
    ///
    /// Whatever `command` returns. The published vault is unchanged.
    pub fn execute<T, F>(&self, command: F) -> Result<Committed<T>, VaultError>
    where
        F: FnOnce(&mut Vault<L>) -> Result<T, VaultError>,
    {
        let _writer = self.writer.lock();
        let started = Instant::now();

        let (version, base) = {
            let guard = self.current.read();
            (guard.0, Arc::clone(&guard.1))
        };
        let mut next = Vault::clone(&base);
        // A previous command's events were drained on commit; anything left
        // belongs to nobody.
        next.drain_events();

        match command(&mut next) {
            Ok(value) => {
                let events = next.drain_events();
                let version = version + 1;
                *self.current.write() = (version, Arc::new(next));
                debug!(
                    version,
                    events = events.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "command committed"
                );
                Ok(Committed {
                    value,
                    events,
                    version,
                })
            }
            Err(err) => {
                debug!(error = %err, kind = %err.kind(), "command rejected");
                Err(err)
            }
        }
    }
}
