//! Path MTU Discovery cache (C6).
//!
//! Ground truth: `m46eapp_pmtudisc.c` (`m46e_path_mtu_set`, `m46e_path_mtu_get`,
//! `pmtud_timeout_cb`, `m46e_init_pmtud`/`m46e_restart_pmtud`).

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::PmtudType;

/// IPv6 minimum MTU; the floor for every non-sentinel cache entry.
pub const IPV6_MIN_MTU: u32 = 1280;

/// The key shared by TUNNEL-mode entries and HOST-mode fallback.
pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, Copy)]
pub struct PmtudConfig {
    pub kind: PmtudType,
    pub expire_time: Duration,
    pub default_mtu: u32,
}

struct Entry {
    mtu: u32,
    /// `None` for the default entry right after init/expiry, or whenever an
    /// entry has no active timer.
    timer: Option<JoinHandle<()>>,
    /// Mirrors `timer` for dump purposes; `JoinHandle` does not expose a deadline.
    expires_at: Option<Instant>,
}

impl Drop for Entry {
    fn drop(&mut self) {
        // Binding the timer handle to the entry means any removal path --
        // explicit del, expiry, or a `restart` rebuild -- cancels the timer for
        // free, rather than requiring a second, independently-tracked teardown.
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

struct Inner {
    table: HashMap<String, Entry>,
    config: PmtudConfig,
}

/// Mutex-guarded destination→MTU map with per-entry expiry timers.
pub struct PmtuCache {
    inner: Mutex<Inner>,
}

impl PmtuCache {
    pub fn new(config: PmtudConfig) -> Arc<Self> {
        let mut table = HashMap::new();
        table.insert(
            DEFAULT_KEY.to_string(),
            Entry {
                mtu: config.default_mtu,
                timer: None,
                expires_at: None,
            },
        );

        Arc::new(Self {
            inner: Mutex::new(Inner { table, config }),
        })
    }

    fn key_for(kind: PmtudType, dst: Option<&Ipv6Addr>) -> Option<String> {
        match kind {
            PmtudType::None => None,
            PmtudType::Tunnel => Some(DEFAULT_KEY.to_string()),
            PmtudType::Host => Some(dst.map(ToString::to_string).unwrap_or_else(|| DEFAULT_KEY.to_string())),
        }
    }

    /// Records a new observed path MTU for `dst` (or the shared default when
    /// `dst` is `None` / the configured type is TUNNEL). No-op when the
    /// configured type is NONE. Follows PMTU-D monotonicity: only a *decrease*
    /// updates the stored value.
    pub fn set(self: &Arc<Self>, dst: Option<Ipv6Addr>, pmtu: u32) {
        let key = {
            let guard = self.inner.lock().unwrap();
            match Self::key_for(guard.config.kind, dst.as_ref()) {
                Some(k) => k,
                None => return,
            }
        };

        let p = pmtu.max(IPV6_MIN_MTU);
        let mut guard = self.inner.lock().unwrap();
        let expire_time = guard.config.expire_time;

        let needs_rearm = match guard.table.get_mut(&key) {
            Some(entry) => {
                if p < entry.mtu {
                    entry.mtu = p;
                    true
                } else {
                    false
                }
            }
            None => {
                guard.table.insert(
                    key.clone(),
                    Entry {
                        mtu: p,
                        timer: None,
                        expires_at: None,
                    },
                );
                true
            }
        };

        if needs_rearm {
            self.rearm(&mut guard, key, expire_time);
        }
    }

    /// Looks up the effective path MTU for `dst`. HOST misses fall through to
    /// the default key; TUNNEL and absent-dst lookups always consult the
    /// default key. Returns `0` if nothing is cached (should not happen once
    /// init has seeded the default entry).
    pub fn get(&self, dst: Option<&Ipv6Addr>) -> u32 {
        let guard = self.inner.lock().unwrap();
        let key = match guard.config.kind {
            PmtudType::Host => dst.map(ToString::to_string),
            _ => None,
        };

        let found = key
            .and_then(|k| guard.table.get(&k))
            .or_else(|| guard.table.get(DEFAULT_KEY))
            .map(|e| e.mtu)
            .unwrap_or(0);

        if found > 0 {
            found.max(IPV6_MIN_MTU)
        } else {
            0
        }
    }

    /// Ends the timer subsystem, rebuilds the map re-seeded with the new
    /// default entry, and switches to `new_config`. The lock is held across the
    /// whole reconstruction.
    pub fn restart(self: &Arc<Self>, new_config: PmtudConfig) {
        let mut guard = self.inner.lock().unwrap();
        guard.table.clear(); // entries' Drop aborts their timers.
        guard.table.insert(
            DEFAULT_KEY.to_string(),
            Entry {
                mtu: new_config.default_mtu,
                timer: None,
                expires_at: None,
            },
        );
        guard.config = new_config;
    }

    /// Remaining seconds on `key`'s timer, or `-1` if none is armed. For dumps.
    pub fn remaining_secs(&self, key: &str) -> i64 {
        let guard = self.inner.lock().unwrap();
        match guard.table.get(key).and_then(|e| e.expires_at) {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .as_secs() as i64,
            None => -1,
        }
    }

    /// A point-in-time copy of `(key, mtu, remaining_secs)` triples, for dumps.
    pub fn snapshot(&self) -> Vec<(String, u32, i64)> {
        let guard = self.inner.lock().unwrap();
        let now = Instant::now();
        guard
            .table
            .iter()
            .map(|(k, e)| {
                let remaining = match e.expires_at {
                    Some(deadline) => deadline.saturating_duration_since(now).as_secs() as i64,
                    None => -1,
                };
                (k.clone(), e.mtu, remaining)
            })
            .collect()
    }

    fn rearm(self: &Arc<Self>, guard: &mut Inner, key: String, expire_time: Duration) {
        if let Some(entry) = guard.table.get_mut(&key) {
            if let Some(old) = entry.timer.take() {
                old.abort();
            }
            let cache = Arc::clone(self);
            let task_key = key.clone();
            entry.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(expire_time).await;
                cache.on_expire(task_key).await;
            }));
            entry.expires_at = Some(Instant::now() + expire_time);
        }
    }

    async fn on_expire(self: Arc<Self>, key: String) {
        let mut guard = self.inner.lock().unwrap();
        if key == DEFAULT_KEY {
            let default_mtu = guard.config.default_mtu;
            if let Some(entry) = guard.table.get_mut(&key) {
                debug!("pmtu default entry expired, resetting to configured default");
                entry.mtu = default_mtu;
                entry.timer = None;
                entry.expires_at = None;
            }
        } else {
            debug!(key = %key, "pmtu entry expired, removing");
            guard.table.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: PmtudType) -> PmtudConfig {
        PmtudConfig {
            kind,
            expire_time: Duration::from_secs(60),
            default_mtu: 1500,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn decrease_and_expiry_s5() {
        let cache = PmtuCache::new(config(PmtudType::Host));
        let dst: Ipv6Addr = "ff::1".parse().unwrap();

        cache.set(Some(dst), 1400);
        assert_eq!(cache.get(Some(&dst)), 1400);

        // PMTU-D monotonicity: an increase is ignored.
        cache.set(Some(dst), 1450);
        assert_eq!(cache.get(Some(&dst)), 1400);

        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(cache.get(Some(&dst)), 1500);

        let other: Ipv6Addr = "2001::9".parse().unwrap();
        assert_eq!(cache.get(Some(&other)), 1500);
    }

    #[tokio::test]
    async fn default_entry_never_disappears() {
        let cache = PmtuCache::new(config(PmtudType::Tunnel));
        assert_eq!(cache.get(None), 1500);
        cache.set(None, 1400);
        assert_eq!(cache.get(None), 1400);
    }

    #[test]
    fn none_type_is_a_no_op() {
        let cache = PmtuCache::new(config(PmtudType::None));
        let dst: Ipv6Addr = "ff::1".parse().unwrap();
        cache.set(Some(dst), 1000);
        assert_eq!(cache.get(Some(&dst)), 1500);
    }
}
