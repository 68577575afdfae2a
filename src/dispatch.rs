//! Peer Sync Dispatcher (C5): outbound gateway-dedup + transmit, inbound
//! translate + apply + program-kernel-FIB.
//!
//! Ground truth: `m46eapp_sync_com_route.c`'s `m46e_sync_route` (outbound) and
//! `m46e_rtsync_set_route` (inbound).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::PeerSyncError;
use crate::kernel::KernelRouteProgrammer;
use crate::peer::{Opcode, PeerChannel, RoutePayload, SyncCommand};
use crate::route::{RouteEntry, RouteEntryV4, RouteEntryV6, RouteTable};
use crate::translate::Translator;

pub struct PeerSyncDispatcher {
    v4_table: Arc<RouteTable<RouteEntryV4>>,
    v6_table: Arc<RouteTable<RouteEntryV6>>,
    translator: Arc<Translator>,
    route_sync: AtomicBool,
    stub_to_backbone: Box<dyn PeerChannel>,
    backbone_to_stub: Box<dyn PeerChannel>,
    kernel: Arc<dyn KernelRouteProgrammer>,
}

impl PeerSyncDispatcher {
    pub fn new(
        v4_table: Arc<RouteTable<RouteEntryV4>>,
        v6_table: Arc<RouteTable<RouteEntryV6>>,
        translator: Arc<Translator>,
        route_sync: bool,
        stub_to_backbone: Box<dyn PeerChannel>,
        backbone_to_stub: Box<dyn PeerChannel>,
        kernel: Arc<dyn KernelRouteProgrammer>,
    ) -> Self {
        Self {
            v4_table,
            v6_table,
            translator,
            route_sync: AtomicBool::new(route_sync),
            stub_to_backbone,
            backbone_to_stub,
            kernel,
        }
    }

    pub fn set_route_sync(&self, enabled: bool) {
        self.route_sync.store(enabled, Ordering::SeqCst);
    }

    /// Pushes a locally-observed IPv4 change to the peer (stub→backbone
    /// direction). For `Del`, applies the gateway-dedup rule: the caller must
    /// have already removed `entry` from `v4_table` before calling this.
    pub fn push_v4_change(&self, opcode: Opcode, entry: RouteEntryV4) {
        if !self.route_sync.load(Ordering::SeqCst) {
            return;
        }
        if opcode == Opcode::Del && self.v4_table.count_same_dest(&entry) >= 1 {
            info!("suppressing peer DEL, another route to the same destination remains");
            return;
        }
        self.stub_to_backbone.send(SyncCommand {
            opcode,
            payload: RoutePayload::V4(entry),
        });
    }

    /// Pushes a locally-observed IPv6 change to the peer (backbone→stub
    /// direction). Same dedup contract as [`Self::push_v4_change`].
    pub fn push_v6_change(&self, opcode: Opcode, entry: RouteEntryV6) {
        if !self.route_sync.load(Ordering::SeqCst) {
            return;
        }
        if opcode == Opcode::Del && self.v6_table.count_same_dest(&entry) >= 1 {
            info!("suppressing peer DEL, another route to the same destination remains");
            return;
        }
        self.backbone_to_stub.send(SyncCommand {
            opcode,
            payload: RoutePayload::V6(entry),
        });
    }

    /// Applies a command received from the peer: translate to the opposite
    /// family, search-then-add/del on that family's table, then program the
    /// kernel FIB. Does not roll back partial progress on failure — the local
    /// table remains the source of truth.
    pub async fn apply_inbound(&self, cmd: SyncCommand) -> Result<(), PeerSyncError> {
        match cmd.payload {
            RoutePayload::V4(v4_entry) => {
                let v6_entry = self.translator.v4_to_v6(&v4_entry)?;
                match cmd.opcode {
                    Opcode::Add => {
                        if self.v6_table.search(&v6_entry).is_some() {
                            warn!("inbound ADD rejected: route already exists");
                            return Err(PeerSyncError::AlreadyExists);
                        }
                        self.v6_table.add(v6_entry.clone())?;
                    }
                    Opcode::Del => {
                        if self.v6_table.search(&v6_entry).is_none() {
                            warn!("inbound DEL rejected: route does not exist");
                            return Err(PeerSyncError::NonExistent);
                        }
                        let _ = self.v6_table.del(&v6_entry);
                    }
                }
                if let Err(e) = self.kernel.program_v6(cmd.opcode, &v6_entry).await {
                    error!(error = %e, "failed to program kernel v6 FIB");
                    return Err(PeerSyncError::Kernel(e));
                }
            }
            RoutePayload::V6(v6_entry) => {
                let v4_entry = self.translator.v6_to_v4(&v6_entry)?;
                match cmd.opcode {
                    Opcode::Add => {
                        if self.v4_table.search(&v4_entry).is_some() {
                            warn!("inbound ADD rejected: route already exists");
                            return Err(PeerSyncError::AlreadyExists);
                        }
                        self.v4_table.add(v4_entry.clone())?;
                    }
                    Opcode::Del => {
                        if self.v4_table.search(&v4_entry).is_none() {
                            warn!("inbound DEL rejected: route does not exist");
                            return Err(PeerSyncError::NonExistent);
                        }
                        let _ = self.v4_table.del(&v4_entry);
                    }
                }
                if let Err(e) = self.kernel.program_v4(cmd.opcode, &v4_entry).await {
                    error!(error = %e, "failed to program kernel v4 FIB");
                    return Err(PeerSyncError::Kernel(e));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetlinkFibError;
    use crate::peer::LoopbackPeerChannel;
    use crate::route::RouteKind;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeKernel {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl KernelRouteProgrammer for FakeKernel {
        async fn program_v4(&self, opcode: Opcode, entry: &RouteEntryV4) -> Result<(), NetlinkFibError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("v4:{:?}:{}", opcode, entry.dst));
            Ok(())
        }
        async fn program_v6(&self, opcode: Opcode, entry: &RouteEntryV6) -> Result<(), NetlinkFibError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("v6:{:?}:{}", opcode, entry.dst));
            Ok(())
        }
    }

    fn v4(dst: &str, prefix_len: u8, gw: &str) -> RouteEntryV4 {
        RouteEntryV4 {
            kind: RouteKind::Unicast,
            dst: dst.parse().unwrap(),
            prefix_len,
            src: Ipv4Addr::UNSPECIFIED,
            gateway: gw.parse().unwrap(),
            out_if_index: 2,
            priority: 0,
            sync: false,
        }
    }

    fn dispatcher() -> (
        PeerSyncDispatcher,
        tokio::sync::mpsc::UnboundedReceiver<SyncCommand>,
        tokio::sync::mpsc::UnboundedReceiver<SyncCommand>,
        Arc<RouteTable<RouteEntryV4>>,
        Arc<RouteTable<RouteEntryV6>>,
    ) {
        let v4_table = Arc::new(RouteTable::new(8, 99).unwrap());
        let v6_table = Arc::new(RouteTable::new(8, 199).unwrap());
        let translator = Arc::new(Translator::new(
            crate::translate::TunnelMode::Normal,
            "2001:db8::".parse().unwrap(),
            99,
            199,
        ));
        let (s2b, s2b_rx) = LoopbackPeerChannel::pair();
        let (b2s, b2s_rx) = LoopbackPeerChannel::pair();
        let kernel = Arc::new(FakeKernel::default());
        let dispatcher = PeerSyncDispatcher::new(
            v4_table.clone(),
            v6_table.clone(),
            translator,
            true,
            Box::new(s2b),
            Box::new(b2s),
            kernel,
        );
        (dispatcher, s2b_rx, b2s_rx, v4_table, v6_table)
    }

    #[tokio::test]
    async fn gateway_dedup_suppresses_second_route_s3() {
        let (dispatcher, mut s2b_rx, _b2s_rx, v4_table, _v6_table) = dispatcher();
        let via1 = v4("10.0.0.0", 24, "192.168.1.1");
        let via2 = v4("10.0.0.0", 24, "192.168.1.2");
        v4_table.add(via1.clone()).unwrap();
        v4_table.add(via2.clone()).unwrap();

        v4_table.del(&via1).unwrap();
        dispatcher.push_v4_change(Opcode::Del, via1);
        assert!(s2b_rx.try_recv().is_err(), "dedup should suppress this DEL");

        v4_table.del(&via2).unwrap();
        dispatcher.push_v4_change(Opcode::Del, via2);
        assert!(s2b_rx.try_recv().is_ok(), "second delete should be forwarded");
    }

    #[tokio::test]
    async fn inbound_add_translates_and_programs_kernel() {
        let (dispatcher, _s2b_rx, _b2s_rx, _v4_table, v6_table) = dispatcher();
        let entry = v4("10.0.0.0", 24, "0.0.0.0");
        let cmd = SyncCommand {
            opcode: Opcode::Add,
            payload: RoutePayload::V4(entry),
        };
        dispatcher.apply_inbound(cmd).await.unwrap();
        assert_eq!(v6_table.len(), 1);
    }

    #[tokio::test]
    async fn disabled_route_sync_short_circuits_outbound() {
        let (dispatcher, mut s2b_rx, _b2s_rx, v4_table, _v6_table) = dispatcher();
        dispatcher.set_route_sync(false);
        let entry = v4("10.0.0.0", 24, "0.0.0.0");
        v4_table.add(entry.clone()).unwrap();
        dispatcher.push_v4_change(Opcode::Add, entry);
        assert!(s2b_rx.try_recv().is_err());
    }
}
