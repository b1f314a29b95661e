//! Outbound client identity (User-Agent) with rotation.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::seq::SliceRandom;
use tracing::debug;

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36",
];

/// The browser identity presented to the upstream.
///
/// Shared by the session manager and the fetch client so a rotation applies
/// to every subsequent request.
#[derive(Debug)]
pub struct ClientIdentity {
    pool: Vec<String>,
    current: RwLock<String>,
}

impl ClientIdentity {
    /// Identity drawn at random from [`USER_AGENTS`].
    pub fn new() -> Self {
        Self::from_pool(USER_AGENTS.iter().map(|s| s.to_string()).collect())
    }

    pub fn from_pool(pool: Vec<String>) -> Self {
        let current = pool
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();
        Self {
            pool,
            current: RwLock::new(current),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, String> {
        self.current.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, String> {
        self.current.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn user_agent(&self) -> String {
        self.read().clone()
    }

    /// Switch to a different identity from the pool, when one exists.
    pub fn rotate(&self) -> String {
        let mut current = self.write();
        let candidates: Vec<&String> = self.pool.iter().filter(|ua| **ua != *current).collect();
        if let Some(next) = candidates.choose(&mut rand::thread_rng()) {
            *current = (*next).clone();
            debug!("Rotated client identity");
        }
        current.clone()
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::new()
    }
}
