// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server process identity: the ownership token written into job claims.
//!
//! An identity is a random 128-bit value rendered as exactly 32 uppercase
//! hex characters. It can be persisted locally so a restarted instance
//! recognizes jobs it owned before the restart.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from identity generation or persistence. Fatal at startup: the
/// server cannot claim jobs without a usable identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity store i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// A server instance's ownership token: 32 uppercase hex characters
/// encoding a 128-bit value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    /// Mint a fresh random identity.
    pub fn generate() -> Self {
        Self(format!("{:032X}", uuid::Uuid::new_v4().as_u128()))
    }

    /// Parse a persisted identity, rejecting anything that is not exactly
    /// the canonical 32-uppercase-hex rendering.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// The 128-bit value this identity encodes.
    pub fn as_u128(&self) -> u128 {
        u128::from_str_radix(&self.0, 16).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local persistence surface for the current identity. Local to the
/// process's host, never distributed.
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, IdentityError>;
    fn store(&self, id: &ProcessId) -> Result<(), IdentityError>;
}

/// File-backed identity store: one trimmed line in a local file.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<String>, IdentityError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, id: &ProcessId) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(&self.path, id.as_str())?)
    }
}

/// Produces the process identity, optionally reusing a persisted one.
///
/// Safe to call from concurrent paths: generation and persistence happen
/// under one lock, so every caller observes the same persisted value.
pub struct IdentityProvider<S: IdentityStore> {
    store: S,
    lock: Mutex<()>,
}

impl<S: IdentityStore> IdentityProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store, lock: Mutex::new(()) }
    }

    /// With `reuse_existing`, return the persisted identity when present and
    /// well-formed; otherwise (or always, when `reuse_existing` is false)
    /// mint a new one and persist it, overwriting any prior value.
    pub fn get_or_create(&self, reuse_existing: bool) -> Result<ProcessId, IdentityError> {
        let _guard = self.lock.lock();

        if reuse_existing {
            if let Some(existing) = self.store.load()?.as_deref().and_then(ProcessId::parse) {
                return Ok(existing);
            }
        }

        let id = ProcessId::generate();
        self.store.store(&id)?;
        Ok(id)
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
