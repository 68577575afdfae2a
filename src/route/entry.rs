//! Family-tagged route entry types.
//!
//! Replaces the original C implementation's single void-pointer-dispatched entry
//! struct with two concrete types sharing the [`RouteEntry`] trait, per the
//! "tagged variant" redesign in the design notes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Route type, mirrored from the `RTN_*` constants rtnetlink reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Unicast,
    Local,
    Broadcast,
    Anycast,
    Multicast,
    Unreachable,
    Other(u8),
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteKind::Unicast => write!(f, "RTN_UNICAST"),
            RouteKind::Local => write!(f, "RTN_LOCAL"),
            RouteKind::Broadcast => write!(f, "RTN_BROADCAST"),
            RouteKind::Anycast => write!(f, "RTN_ANYCAST"),
            RouteKind::Multicast => write!(f, "RTN_MULTICAST"),
            RouteKind::Unreachable => write!(f, "RTN_UNREACHABLE"),
            RouteKind::Other(n) => write!(f, "OTHER({n})"),
        }
    }
}

/// Common surface both family-specific entries implement, letting [`crate::route::table::RouteTable`]
/// stay generic over the address family instead of switching on it at runtime.
pub trait RouteEntry: Clone + std::fmt::Debug {
    /// `(dst, prefix_len, gateway)` — the full search/dedup key used by `search`.
    fn route_key(&self) -> (IpAddr, u8, IpAddr);

    /// `(dst, prefix_len)` only — used by `count_same_dest`.
    fn dest_key(&self) -> (IpAddr, u8) {
        let (dst, len, _) = self.route_key();
        (dst, len)
    }

    fn out_if_index(&self) -> u32;
    fn sync(&self) -> bool;
    fn set_sync(&mut self, sync: bool);
}

/// An IPv4 route table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntryV4 {
    pub kind: RouteKind,
    pub dst: Ipv4Addr,
    pub prefix_len: u8,
    pub src: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub out_if_index: u32,
    pub priority: u32,
    pub sync: bool,
}

impl RouteEntryV4 {
    pub const ANY: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
}

impl RouteEntry for RouteEntryV4 {
    fn route_key(&self) -> (IpAddr, u8, IpAddr) {
        (
            IpAddr::V4(self.dst),
            self.prefix_len,
            IpAddr::V4(self.gateway),
        )
    }

    fn out_if_index(&self) -> u32 {
        self.out_if_index
    }

    fn sync(&self) -> bool {
        self.sync
    }

    fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }
}

/// An IPv6 route table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntryV6 {
    pub kind: RouteKind,
    pub dst: Ipv6Addr,
    pub prefix_len: u8,
    pub src: Ipv6Addr,
    pub gateway: Ipv6Addr,
    pub out_if_index: u32,
    pub priority: u32,
    pub sync: bool,
}

impl RouteEntryV6 {
    pub const ANY: Ipv6Addr = Ipv6Addr::UNSPECIFIED;
}

impl RouteEntry for RouteEntryV6 {
    fn route_key(&self) -> (IpAddr, u8, IpAddr) {
        (
            IpAddr::V6(self.dst),
            self.prefix_len,
            IpAddr::V6(self.gateway),
        )
    }

    fn out_if_index(&self) -> u32 {
        self.out_if_index
    }

    fn sync(&self) -> bool {
        self.sync
    }

    fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }
}
