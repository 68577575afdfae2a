//! Peer sync command wire shape and the transport seam (C5's outbound side).
//!
//! The actual IPC to the peer daemon is out of scope; this
//! module only names the command and the interface a transport must satisfy,
//! plus an in-process loopback implementation for tests and single-process
//! demonstrations of both tunnel ends.

use tokio::sync::mpsc;

use crate::route::{RouteEntryV4, RouteEntryV6};

/// `ROUTE_ADD=0` / `ROUTE_DEL=1` in the original wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Del,
}

/// The payload of a `M46E_SYNC_ROUTE` command: a translated route plus which
/// family it describes.
#[derive(Debug, Clone)]
pub enum RoutePayload {
    V4(RouteEntryV4),
    V6(RouteEntryV6),
}

#[derive(Debug, Clone)]
pub struct SyncCommand {
    pub opcode: Opcode,
    pub payload: RoutePayload,
}

/// A transport capable of carrying [`SyncCommand`]s to the peer daemon. The
/// daemon's actual command channel is out of scope; this trait is the seam an
/// IPC transport would plug into.
pub trait PeerChannel: Send + Sync {
    fn send(&self, cmd: SyncCommand);
}

/// An in-process channel pairing two `PeerChannel` ends, useful for tests and
/// for running both sides of a tunnel inside one demonstration process.
pub struct LoopbackPeerChannel {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl LoopbackPeerChannel {
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<SyncCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PeerChannel for LoopbackPeerChannel {
    fn send(&self, cmd: SyncCommand) {
        // The receiving end may already be gone (e.g. in a unit test that only
        // checks what was sent); dropping the command is fine, there is no
        // retry semantics for peer sync.
        let _ = self.tx.send(cmd);
    }
}
