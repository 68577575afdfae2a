//! Daemon entrypoint: builds the object graph, spawns the two FIB observer
//! threads plus the inbound peer-sync tasks, and blocks until shutdown.
//!
//! Config loading and the real peer transport are out of scope; this binary
//! wires an in-memory [`GeneralConfig`] and a loopback
//! [`LoopbackPeerChannel`] pair so both tunnel ends can be demonstrated inside
//! one process, with the connection wired up directly rather than through a
//! config file.

use std::error::Error;
use std::sync::Arc;

use m46e_routed::config::{
    DeviceConfig, DeviceType, GeneralConfig, PmtudSettings, PmtudType, TunnelDeviceConfig,
    TunnelMode,
};
use m46e_routed::handler::{kernel_programmer, Handler, StartupBarrier};
use m46e_routed::observer::{spawn_backbone_observer, spawn_stub_observer};
use m46e_routed::peer::LoopbackPeerChannel;
use tracing::{info, warn};

fn demo_config() -> GeneralConfig {
    GeneralConfig {
        tunnel_mode: TunnelMode::Normal,
        route_sync: true,
        route_entry_max: 1024,
        unicast_prefix: "2001:db8::".parse().unwrap(),
        tunnel: TunnelDeviceConfig {
            ipv4_ifindex: 10,
            ipv6_ifindex: 20,
        },
        device_list: vec![DeviceConfig {
            name: "macvlan0".to_string(),
            kind: DeviceType::Macvlan,
            ifindex: 3,
        }],
        pmtud: PmtudSettings {
            kind: PmtudType::Tunnel,
            expire_time_secs: 600,
            default_mtu: 1500,
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = demo_config();

    let (stub_to_backbone, mut s2b_rx) = LoopbackPeerChannel::pair();
    let (backbone_to_stub, mut b2s_rx) = LoopbackPeerChannel::pair();

    // A single request/response connection, separate from each observer's own
    // multicast-subscribed connection, used only to program the kernel FIB
    // for peer-originated routes.
    let (conn, kernel_handle, _) = rtnetlink::new_connection()?;
    tokio::spawn(conn);
    let kernel = kernel_programmer(kernel_handle);

    let handler = Arc::new(Handler::new(
        &config,
        Box::new(stub_to_backbone),
        Box::new(backbone_to_stub),
        kernel,
    )?);

    info!(prefix = %handler.unicast_prefix(), "m46ed starting");

    let barrier = StartupBarrier::new();

    let _v4_thread = spawn_stub_observer(
        Arc::new(config.clone()),
        handler.v4_table.clone(),
        handler.dispatcher.clone(),
        barrier.clone(),
    );
    let _v6_thread = spawn_backbone_observer(
        handler.v6_table.clone(),
        handler.translator.clone(),
        handler.dispatcher.clone(),
        barrier,
    );

    // Drain each direction's loopback peer commands into the dispatcher's
    // inbound path; a real deployment replaces these with the peer transport.
    let inbound_from_stub = handler.dispatcher.clone();
    tokio::spawn(async move {
        while let Some(cmd) = s2b_rx.recv().await {
            if let Err(e) = inbound_from_stub.apply_inbound(cmd).await {
                warn!(error = %e, "inbound stub->backbone peer sync rejected");
            }
        }
    });
    let inbound_from_backbone = handler.dispatcher.clone();
    tokio::spawn(async move {
        while let Some(cmd) = b2s_rx.recv().await {
            if let Err(e) = inbound_from_backbone.apply_inbound(cmd).await {
                warn!(error = %e, "inbound backbone->stub peer sync rejected");
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("m46ed shutting down");

    Ok(())
}
