//! Typed error hierarchy, one enum per component boundary named in the design.

use thiserror::Error;

/// Errors raised by [`crate::route::table::RouteTable`] operations.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route table is full (max = {0})")]
    CapacityExceeded(usize),
    #[error("route entry already exists")]
    Duplicate,
    #[error("route entry not found")]
    NotFound,
}

/// Errors raised by [`crate::translate::Translator`].
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translated ipv4 destination is 0.0.0.0")]
    ZeroAddress,
    #[error("ipv6 prefix length {0} out of range for AS mode (expected 80..=112)")]
    AsMaskOutOfRange(u8),
    #[error("ipv6 prefix length {0} too short for normal mode (expected >= 96)")]
    NormalMaskOutOfRange(u8),
}

/// Errors raised while applying an inbound peer-sync command.
#[derive(Debug, Error)]
pub enum PeerSyncError {
    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),
    #[error("route already exists")]
    AlreadyExists,
    #[error("route does not exist")]
    NonExistent,
    #[error("route table rejected entry: {0}")]
    Table(#[from] RouteError),
    #[error("kernel fib error: {0}")]
    Kernel(#[from] NetlinkFibError),
    #[error("peer channel is closed")]
    ChannelClosed,
    #[error("route_sync is disabled")]
    SyncDisabled,
}

/// Errors raised while programming the kernel FIB via rtnetlink.
#[derive(Debug, Error)]
pub enum NetlinkFibError {
    #[error("rtnetlink: {0}")]
    RtNetlink(#[from] rtnetlink::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a FIB observer thread (`crate::observer`).
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("netlink socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rtnetlink: {0}")]
    RtNetlink(#[from] rtnetlink::Error),
}

/// Fatal startup errors (section 7's `ResourceError`).
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("route table capacity must be non-zero")]
    ZeroCapacity,
}
