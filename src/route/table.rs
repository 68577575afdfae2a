//! The bounded, mutex-guarded route table (C1).

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::info;

use crate::error::RouteError;
use crate::route::entry::RouteEntry;

/// Per-family route table: a bounded `Vec` of entries plus the interest set that
/// governs which kernel routes this table mirrors.
///
/// Mutations and scans hold `inner`'s plain `Mutex` for their duration. The table
/// used to require a recursive mutex because `del_by_device` pushed to the peer
/// while still holding the lock; that call is now hoisted to the caller (see
/// [`RouteTable::del_by_device`]), so a plain mutex suffices.
#[derive(Debug)]
pub struct RouteTable<E: RouteEntry> {
    inner: Mutex<Inner<E>>,
}

#[derive(Debug)]
struct Inner<E: RouteEntry> {
    entries: Vec<E>,
    max: usize,
    interest: HashSet<u32>,
    tunnel_dev_idx: u32,
}

impl<E: RouteEntry> RouteTable<E> {
    pub fn new(max: usize, tunnel_dev_idx: u32) -> Result<Self, RouteError> {
        if max == 0 {
            return Err(RouteError::CapacityExceeded(0));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                entries: Vec::with_capacity(max),
                max,
                interest: HashSet::new(),
                tunnel_dev_idx,
            }),
        })
    }

    pub fn tunnel_dev_idx(&self) -> u32 {
        self.inner.lock().unwrap().tunnel_dev_idx
    }

    /// Replaces the interest set wholesale (used once at startup).
    pub fn set_interest<I: IntoIterator<Item = u32>>(&self, devices: I) {
        let mut guard = self.inner.lock().unwrap();
        guard.interest = devices.into_iter().collect();
    }

    pub fn add_interest(&self, ifindex: u32) {
        self.inner.lock().unwrap().interest.insert(ifindex);
    }

    pub fn remove_interest(&self, ifindex: u32) {
        self.inner.lock().unwrap().interest.remove(&ifindex);
    }

    /// True if `ifindex` is a managed device or the tunnel device itself.
    pub fn is_interesting(&self, ifindex: u32) -> bool {
        let guard = self.inner.lock().unwrap();
        ifindex == guard.tunnel_dev_idx || guard.interest.contains(&ifindex)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().max
    }

    /// A point-in-time copy of the table contents, for dumps and tests.
    pub fn snapshot(&self) -> Vec<E> {
        self.inner.lock().unwrap().entries.clone()
    }

    /// Linear scan on (dst, prefix_len, gateway); first match wins.
    pub fn search(&self, probe: &E) -> Option<usize> {
        let guard = self.inner.lock().unwrap();
        let key = probe.route_key();
        guard.entries.iter().position(|e| e.route_key() == key)
    }

    /// Count on (dst, prefix_len) only, ignoring gateway; used by the sync dedup rule.
    pub fn count_same_dest(&self, probe: &E) -> usize {
        let guard = self.inner.lock().unwrap();
        let key = probe.dest_key();
        guard.entries.iter().filter(|e| e.dest_key() == key).count()
    }

    /// Appends `entry`. Does not re-check for duplicates; callers are expected to
    /// have called `search` first.
    pub fn add(&self, entry: E) -> Result<usize, RouteError> {
        let mut guard = self.inner.lock().unwrap();
        if guard.entries.len() >= guard.max {
            info!(max = guard.max, "route table full, dropping entry");
            return Err(RouteError::CapacityExceeded(guard.max));
        }
        guard.entries.push(entry);
        Ok(guard.entries.len() - 1)
    }

    /// Removes the entry matching `probe` by (dst, prefix_len, gateway), shifting
    /// the tail left to keep `[0, num)` compact.
    pub fn del(&self, probe: &E) -> Result<E, RouteError> {
        let mut guard = self.inner.lock().unwrap();
        let key = probe.route_key();
        let idx = guard
            .entries
            .iter()
            .position(|e| e.route_key() == key)
            .ok_or_else(|| {
                info!("route not found on delete");
                RouteError::NotFound
            })?;
        Ok(guard.entries.remove(idx))
    }

    /// Removes every entry whose `out_if_index == devidx`, holding the lock for the
    /// entire sweep so external readers see a consistent batch. Returns the removed
    /// entries so the *caller* can push peer DELs for them once the lock is
    /// released — no peer I/O ever happens while this lock is held.
    pub fn del_by_device(&self, devidx: u32) -> Vec<E> {
        let mut guard = self.inner.lock().unwrap();
        let mut victims = Vec::new();
        let mut i = 0;
        while i < guard.entries.len() {
            if guard.entries[i].out_if_index() == devidx {
                victims.push(guard.entries.remove(i));
            } else {
                i += 1;
            }
        }
        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::entry::{RouteEntryV4, RouteKind};
    use std::net::Ipv4Addr;

    fn entry(dst: &str, prefix_len: u8, gw: &str, oif: u32) -> RouteEntryV4 {
        RouteEntryV4 {
            kind: RouteKind::Unicast,
            dst: dst.parse().unwrap(),
            prefix_len,
            src: Ipv4Addr::UNSPECIFIED,
            gateway: gw.parse().unwrap(),
            out_if_index: oif,
            priority: 0,
            sync: false,
        }
    }

    #[test]
    fn capacity_cap_preserves_order() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(2, 99).unwrap();
        let a = entry("10.0.0.0", 24, "0.0.0.0", 2);
        let b = entry("10.0.1.0", 24, "0.0.0.0", 2);
        let c = entry("10.0.2.0", 24, "0.0.0.0", 2);

        table.add(a.clone()).unwrap();
        table.add(b.clone()).unwrap();
        assert!(matches!(
            table.add(c),
            Err(RouteError::CapacityExceeded(2))
        ));

        let snap = table.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0], a);
        assert_eq!(snap[1], b);
    }

    #[test]
    fn gateway_dedup_counts_by_destination_only() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(8, 99).unwrap();
        let via1 = entry("10.0.0.0", 24, "192.168.1.1", 2);
        let via2 = entry("10.0.0.0", 24, "192.168.1.2", 2);
        table.add(via1.clone()).unwrap();
        table.add(via2.clone()).unwrap();

        table.del(&via1).unwrap();
        assert_eq!(table.count_same_dest(&via1), 1);

        table.del(&via2).unwrap();
        assert_eq!(table.count_same_dest(&via2), 0);
    }

    #[test]
    fn del_by_device_removes_exactly_matching_entries() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(8, 99).unwrap();
        let keep = entry("10.0.0.0", 24, "0.0.0.0", 3);
        let gone1 = entry("10.0.1.0", 24, "0.0.0.0", 4);
        let gone2 = entry("10.0.2.0", 24, "0.0.0.0", 4);
        table.add(keep.clone()).unwrap();
        table.add(gone1.clone()).unwrap();
        table.add(gone2.clone()).unwrap();

        let victims = table.del_by_device(4);
        assert_eq!(victims, vec![gone1, gone2]);
        assert_eq!(table.snapshot(), vec![keep]);
    }

    #[test]
    fn interest_set_includes_tunnel_device() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(8, 99).unwrap();
        table.set_interest([1, 2, 3]);
        assert!(table.is_interesting(1));
        assert!(table.is_interesting(99));
        assert!(!table.is_interesting(42));
    }
}
