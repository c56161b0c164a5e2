//! Bounded resources that gate agents leaving the pen.
//!
//! Every pool is a pre-filled bounded channel of unit tokens: acquiring
//! receives a token with a deadline, and dropping a [`Token`] sends it back.
//! A token can only come out of its own pool and is returned exactly once,
//! so a pool never holds more than its capacity and never goes negative.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::config::SimConfig;

#[derive(Clone, Debug)]
pub struct ResourcePool {
    name: &'static str,
    capacity: usize,
    give: Sender<()>,
    take: Receiver<()>,
}

impl ResourcePool {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (give, take) = bounded(capacity);
        for _ in 0..capacity {
            let _ = give.try_send(());
        }
        Self {
            name,
            capacity,
            give,
            take,
        }
    }

    /// Waits at most `timeout` for a token.
    pub fn try_acquire(&self, timeout: Duration) -> Option<Token> {
        self.take.recv_timeout(timeout).ok().map(|()| Token {
            pool: self.name,
            release: self.give.clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.take.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

/// One unit of a [`ResourcePool`]; returned to the pool on drop.
#[derive(Debug)]
pub struct Token {
    pool: &'static str,
    release: Sender<()>,
}

impl Token {
    pub fn pool(&self) -> &'static str {
        self.pool
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        if self.release.try_send(()).is_err() {
            warn!(pool = self.pool, "token returned to a full pool");
        } else {
            trace!(pool = self.pool, "token released");
        }
    }
}

/// A key and an exit permit, always held together.
#[derive(Debug)]
pub struct PenPass {
    key: Token,
    permit: Token,
}

impl PenPass {
    pub fn key(&self) -> &Token {
        &self.key
    }

    pub fn permit(&self) -> &Token {
        &self.permit
    }
}

#[derive(Debug)]
pub struct BoostGrant {
    _token: Token,
    expires_at: Instant,
}

impl BoostGrant {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

#[derive(Clone, Debug)]
pub struct GhostHouse {
    keys: ResourcePool,
    permits: ResourcePool,
    boosts: ResourcePool,
}

impl GhostHouse {
    pub fn new(keys: usize, permits: usize, boosts: usize) -> Self {
        Self {
            keys: ResourcePool::new("key", keys),
            permits: ResourcePool::new("exit_permit", permits),
            boosts: ResourcePool::new("speed_boost", boosts),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.keys, config.exit_permits, config.speed_boosts)
    }

    /// Key first, then permit. If the permit times out the key goes straight
    /// back, so a caller ends up with both or neither.
    pub fn acquire_pass(&self, agent: usize, timeout: Duration) -> Option<PenPass> {
        let Some(key) = self.keys.try_acquire(timeout) else {
            trace!(agent, "no key available");
            return None;
        };
        let Some(permit) = self.permits.try_acquire(timeout) else {
            drop(key);
            debug!(agent, "exit permit timed out, key returned");
            return None;
        };
        debug!(
            agent,
            keys_left = self.keys.available(),
            permits_left = self.permits.available(),
            "pen pass acquired"
        );
        Some(PenPass { key, permit })
    }

    pub fn acquire_boost(
        &self,
        agent: usize,
        timeout: Duration,
        duration: Duration,
        now: Instant,
    ) -> Option<BoostGrant> {
        let token = self.boosts.try_acquire(timeout)?;
        debug!(agent, duration_ms = duration.as_millis() as u64, "speed boost acquired");
        Some(BoostGrant {
            _token: token,
            expires_at: now + duration,
        })
    }

    pub fn keys(&self) -> &ResourcePool {
        &self.keys
    }

    pub fn permits(&self) -> &ResourcePool {
        &self.permits
    }

    pub fn boosts(&self) -> &ResourcePool {
        &self.boosts
    }
}
