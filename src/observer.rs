//! FIB Observer (C4): one per family, each on its own OS thread driving a
//! dedicated single-threaded Tokio runtime, generalized from "wrap one async
//! call" to "drive an entire event loop".
//!
//! Ground truth: `m46eapp_sync_v4_route.c`'s `rtnetlink_rcv_v4_route_thread`
//! (interface info / socket open / init-complete signal / dump-with-retry /
//! infinite multicast loop) and `m46eapp_mng_com_route.c`'s
//! `m46e_update_route_info` (NEW/DEL dispatch, RTN_UNICAST/RT_TABLE_MAIN guard).

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use futures::stream::StreamExt;
use netlink_packet_core::NetlinkPayload;
use netlink_packet_route::route::{RouteMessage, RouteType};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_sys::{AsyncSocket, SocketAddr};
use rtnetlink::constants::{
    RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_IPV6_IFADDR, RTMGRP_IPV6_ROUTE, RTMGRP_LINK,
};
use rtnetlink::IpVersion;
use tracing::{debug, error, info};

use crate::config::GeneralConfig;
use crate::dispatch::PeerSyncDispatcher;
use crate::error::ObserverError;
use crate::kernel::RtnetlinkProgrammer;
use crate::peer::Opcode;
use crate::route::attr::{from_v4_message, from_v6_message};
use crate::route::{RouteEntry, RouteEntryV4, RouteEntryV6, RouteTable};
use crate::translate::Translator;

/// `RT_TABLE_MAIN` — the only table C4 mirrors.
const RT_TABLE_MAIN: u8 = 254;

/// Coordination barrier between the Stub (IPv4) and Backbone (IPv6) observer
/// threads: the Backbone observer waits for the Stub observer's "init
/// complete" signal before starting its own dump, so the Stub-side interest
/// set is stable once peer sync begins.
pub struct StartupBarrier {
    ready: Mutex<bool>,
    cv: Condvar,
}

impl StartupBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ready: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub fn signal(&self) {
        let mut guard = self.ready.lock().unwrap();
        *guard = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let mut guard = self.ready.lock().unwrap();
        while !*guard {
            guard = self.cv.wait(guard).unwrap();
        }
    }
}

/// Spawns the IPv4 ("Stub") FIB observer on its own OS thread.
pub fn spawn_stub_observer(
    config: Arc<GeneralConfig>,
    table: Arc<RouteTable<RouteEntryV4>>,
    dispatcher: Arc<PeerSyncDispatcher>,
    barrier: Arc<StartupBarrier>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("m46e-fib-v4".into())
        .spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build v4 observer runtime");
            if let Err(e) = rt.block_on(run_v4_observer(config, table, dispatcher, barrier)) {
                error!(error = %e, "v4 FIB observer terminated");
            }
        })
        .expect("failed to spawn v4 observer thread")
}

/// Spawns the IPv6 ("Backbone") FIB observer on its own OS thread.
pub fn spawn_backbone_observer(
    table: Arc<RouteTable<RouteEntryV6>>,
    translator: Arc<Translator>,
    dispatcher: Arc<PeerSyncDispatcher>,
    barrier: Arc<StartupBarrier>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("m46e-fib-v6".into())
        .spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build v6 observer runtime");
            if let Err(e) = rt.block_on(run_v6_observer(table, translator, dispatcher, barrier)) {
                error!(error = %e, "v6 FIB observer terminated");
            }
        })
        .expect("failed to spawn v6 observer thread")
}

async fn run_v4_observer(
    config: Arc<GeneralConfig>,
    table: Arc<RouteTable<RouteEntryV4>>,
    dispatcher: Arc<PeerSyncDispatcher>,
    barrier: Arc<StartupBarrier>,
) -> Result<(), ObserverError> {
    table.set_interest(config.macvlan_ifindices());

    let (mut connection, handle, mut messages) = rtnetlink::new_connection()?;
    let groups = RTMGRP_LINK | RTMGRP_IPV4_ROUTE | RTMGRP_IPV4_IFADDR;
    connection
        .socket_mut()
        .socket_mut()
        .bind(&SocketAddr::new(0, groups))?;
    tokio::spawn(connection);

    // Stub observer: signal readiness, Backbone will wait on this barrier.
    barrier.signal();

    let programmer = RtnetlinkProgrammer::new(handle);
    match programmer.dump(IpVersion::V4).await {
        Ok(routes) => {
            for rm in &routes {
                on_route_message_v4(&table, &dispatcher, true, rm);
            }
        }
        Err(e) => error!(error = %e, "initial v4 route dump failed after retry"),
    }

    while let Some((msg, _addr)) = messages.next().await {
        match msg.payload {
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewRoute(rm)) => {
                on_route_message_v4(&table, &dispatcher, true, &rm);
            }
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::DelRoute(rm)) => {
                on_route_message_v4(&table, &dispatcher, false, &rm);
            }
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::DelLink(lm)) => {
                let idx = lm.header.index;
                if table.is_interesting(idx) {
                    for victim in table.del_by_device(idx) {
                        dispatcher.push_v4_change(Opcode::Del, victim);
                    }
                    table.remove_interest(idx);
                }
            }
            _ => {}
        }
    }

    Ok(())
}

async fn run_v6_observer(
    table: Arc<RouteTable<RouteEntryV6>>,
    translator: Arc<Translator>,
    dispatcher: Arc<PeerSyncDispatcher>,
    barrier: Arc<StartupBarrier>,
) -> Result<(), ObserverError> {
    // Backbone observer: wait for the Stub observer's interest set to settle
    // before starting our own dump.
    barrier.wait();

    let (mut connection, handle, mut messages) = rtnetlink::new_connection()?;
    let groups = RTMGRP_LINK | RTMGRP_IPV6_ROUTE | RTMGRP_IPV6_IFADDR;
    connection
        .socket_mut()
        .socket_mut()
        .bind(&SocketAddr::new(0, groups))?;
    tokio::spawn(connection);

    let programmer = RtnetlinkProgrammer::new(handle);
    match programmer.dump(IpVersion::V6).await {
        Ok(routes) => {
            for rm in &routes {
                on_route_message_v6(&table, &translator, &dispatcher, true, rm);
            }
        }
        Err(e) => error!(error = %e, "initial v6 route dump failed after retry"),
    }

    while let Some((msg, _addr)) = messages.next().await {
        match msg.payload {
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewRoute(rm)) => {
                on_route_message_v6(&table, &translator, &dispatcher, true, &rm);
            }
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::DelRoute(rm)) => {
                on_route_message_v6(&table, &translator, &dispatcher, false, &rm);
            }
            _ => {}
        }
    }

    Ok(())
}

fn on_route_message_v4(
    table: &RouteTable<RouteEntryV4>,
    dispatcher: &PeerSyncDispatcher,
    is_new: bool,
    rm: &RouteMessage,
) {
    if rm.header.kind != RouteType::Unicast || rm.header.table != RT_TABLE_MAIN {
        return;
    }
    let entry = from_v4_message(rm);
    if !table.is_interesting(entry.out_if_index) {
        debug!(out_if_index = entry.out_if_index, "v4 route outside interest set, dropping");
        return;
    }
    let tunnel_idx = table.tunnel_dev_idx();
    handle_change(table, tunnel_idx, is_new, entry, |op, e| {
        dispatcher.push_v4_change(op, e)
    });
}

fn on_route_message_v6(
    table: &RouteTable<RouteEntryV6>,
    translator: &Translator,
    dispatcher: &PeerSyncDispatcher,
    is_new: bool,
    rm: &RouteMessage,
) {
    if rm.header.kind != RouteType::Unicast || rm.header.table != RT_TABLE_MAIN {
        return;
    }
    let entry = from_v6_message(rm);
    if !translator.prefix_matches(&entry.dst) {
        debug!("v6 route outside unicast prefix, dropping");
        return;
    }
    let tunnel_idx = table.tunnel_dev_idx();
    handle_change(table, tunnel_idx, is_new, entry, |op, e| {
        dispatcher.push_v6_change(op, e)
    });
}

/// Shared NEW/DEL dispatch: applies the table mutation and, unless the route
/// points at the tunnel device (our own peer-sync installation, pushing it
/// back would loop), notifies the peer via `push`.
fn handle_change<E, F>(table: &RouteTable<E>, tunnel_dev_idx: u32, is_new: bool, mut entry: E, push: F)
where
    E: RouteEntry + Clone,
    F: FnOnce(Opcode, E),
{
    if is_new {
        if table.search(&entry).is_some() {
            info!("route already present, ignoring NEW");
            return;
        }
        entry.set_sync(false);
        let out_if = entry.out_if_index();
        let for_peer = entry.clone();
        if table.add(entry).is_ok() && out_if != tunnel_dev_idx {
            push(Opcode::Add, for_peer);
        }
    } else {
        match table.del(&entry) {
            Ok(removed) => {
                if removed.out_if_index() != tunnel_dev_idx {
                    push(Opcode::Del, removed);
                }
            }
            Err(_) => info!("route not found, ignoring DEL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteEntryV4, RouteKind};
    use std::net::Ipv4Addr;
    use std::sync::Mutex as StdMutex;
    use std::thread;
    use std::time::Duration;

    fn entry(dst: &str, oif: u32) -> RouteEntryV4 {
        RouteEntryV4 {
            kind: RouteKind::Unicast,
            dst: dst.parse().unwrap(),
            prefix_len: 24,
            src: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            out_if_index: oif,
            priority: 0,
            sync: false,
        }
    }

    #[test]
    fn new_route_is_added_and_pushed_unless_on_tunnel_device() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(8, 99).unwrap();
        let pushed = StdMutex::new(Vec::new());

        handle_change(&table, 99, true, entry("10.0.0.0", 5), |op, e| {
            pushed.lock().unwrap().push((op, e))
        });
        assert_eq!(table.len(), 1);
        assert_eq!(pushed.lock().unwrap().len(), 1);

        handle_change(&table, 99, true, entry("10.0.1.0", 99), |op, e| {
            pushed.lock().unwrap().push((op, e))
        });
        assert_eq!(table.len(), 2, "tunnel-device route is still tracked");
        assert_eq!(
            pushed.lock().unwrap().len(),
            1,
            "tunnel-device route must not be echoed back to the peer"
        );
    }

    #[test]
    fn duplicate_new_route_is_not_re_added() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(8, 99).unwrap();
        table.add(entry("10.0.0.0", 5)).unwrap();

        handle_change(&table, 99, true, entry("10.0.0.0", 5), |_, _| {
            panic!("must not push a duplicate NEW");
        });
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn del_of_unknown_route_is_a_no_op() {
        let table: RouteTable<RouteEntryV4> = RouteTable::new(8, 99).unwrap();
        handle_change(&table, 99, false, entry("10.0.0.0", 5), |_, _| {
            panic!("must not push a DEL for a route never added");
        });
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn startup_barrier_blocks_until_signaled() {
        let barrier = StartupBarrier::new();
        let waiter = {
            let barrier = barrier.clone();
            thread::spawn(move || barrier.wait())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished(), "waiter must block before signal");

        barrier.signal();
        waiter.join().unwrap();
    }
}
