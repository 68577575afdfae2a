//! Construction-time wiring of the per-family tables, translator, PMTU cache
//! and dispatcher into one bundle the daemon binary and C4/C5 tasks share.
//!
//! No global state: a caller builds a connection, gets back a handle, and
//! threads it through explicitly. `Handler` follows the same discipline for
//! this daemon's larger object graph: one `Arc` bundle built once at startup,
//! handed to every thread that needs it, rather than statics or a
//! service-locator pattern.

use std::net::Ipv6Addr;
use std::sync::Arc;

use rtnetlink::Handle;

use crate::config::GeneralConfig;
use crate::dispatch::PeerSyncDispatcher;
use crate::kernel::{KernelRouteProgrammer, RtnetlinkProgrammer};
use crate::peer::PeerChannel;
use crate::pmtu::{PmtuCache, PmtudConfig};
use crate::route::{RouteEntryV4, RouteEntryV6, RouteTable};
use crate::translate::Translator;

pub use crate::observer::StartupBarrier;

/// Everything a running daemon needs, built once from a [`GeneralConfig`] and
/// a pair of already-established rtnetlink handles (one per family, since
/// each FIB observer owns its own connection).
pub struct Handler {
    pub v4_table: Arc<RouteTable<RouteEntryV4>>,
    pub v6_table: Arc<RouteTable<RouteEntryV6>>,
    pub translator: Arc<Translator>,
    pub pmtu: Arc<PmtuCache>,
    pub dispatcher: Arc<PeerSyncDispatcher>,
}

impl Handler {
    /// Builds the full object graph. `kernel_v4`/`kernel_v6` let the daemon
    /// binary hand in real `rtnetlink::Handle`-backed programmers while tests
    /// substitute fakes.
    pub fn new(
        config: &GeneralConfig,
        stub_to_backbone: Box<dyn PeerChannel>,
        backbone_to_stub: Box<dyn PeerChannel>,
        kernel: Arc<dyn KernelRouteProgrammer>,
    ) -> Result<Self, crate::error::ResourceError> {
        let v4_table = Arc::new(
            RouteTable::new(config.route_entry_max, config.tunnel.ipv4_ifindex)
                .map_err(|_| crate::error::ResourceError::ZeroCapacity)?,
        );
        let v6_table = Arc::new(
            RouteTable::new(config.route_entry_max, config.tunnel.ipv6_ifindex)
                .map_err(|_| crate::error::ResourceError::ZeroCapacity)?,
        );

        let translator = Arc::new(Translator::new(
            config.tunnel_mode.into(),
            config.unicast_prefix,
            config.tunnel.ipv4_ifindex,
            config.tunnel.ipv6_ifindex,
        ));

        let pmtu = PmtuCache::new(PmtudConfig {
            kind: config.pmtud.kind,
            expire_time: std::time::Duration::from_secs(config.pmtud.expire_time_secs),
            default_mtu: config.pmtud.default_mtu,
        });

        let dispatcher = Arc::new(PeerSyncDispatcher::new(
            v4_table.clone(),
            v6_table.clone(),
            translator.clone(),
            config.route_sync,
            stub_to_backbone,
            backbone_to_stub,
            kernel,
        ));

        Ok(Self {
            v4_table,
            v6_table,
            translator,
            pmtu,
            dispatcher,
        })
    }

    pub fn unicast_prefix(&self) -> Ipv6Addr {
        self.translator.prefix
    }
}

/// Convenience constructor matching the daemon binary's needs: one
/// `rtnetlink::Handle` per family, used both for the FIB observers' own dumps
/// and for programming inbound peer routes.
pub fn kernel_programmer(handle: Handle) -> Arc<dyn KernelRouteProgrammer> {
    Arc::new(RtnetlinkProgrammer::new(handle))
}
