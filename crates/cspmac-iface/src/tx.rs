use std::sync::Arc;

use bytes::BytesMut;
use cspmac_frame::{check_mtu, encode_packet, Packet};
use tracing::{debug, warn};

use crate::error::Result;
use crate::iface::{Counters, Interface};

/// Transmit handler installed on an interface.
///
/// The router calls [`NextHop::transmit`] with the route it picked. The
/// handler takes ownership of the packet and releases it whatever the
/// outcome.
pub trait NextHop: Send + Sync {
    fn transmit(&self, route: &Route, packet: Packet) -> Result<()>;
}

/// Routing context for one transmission: the outgoing interface and an
/// optional next-hop address.
#[derive(Debug, Clone)]
pub struct Route {
    pub iface: Arc<Interface>,
    pub via: Option<u8>,
}

impl Route {
    pub fn new(iface: Arc<Interface>) -> Self {
        Self { iface, via: None }
    }

    pub fn via(mut self, addr: u8) -> Self {
        self.via = Some(addr);
        self
    }

    /// Hand `packet` to the interface's next-hop handler.
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.iface.nexthop().transmit(self, packet)
    }
}

/// The MAC transmit handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacTx;

impl NextHop for MacTx {
    fn transmit(&self, route: &Route, packet: Packet) -> Result<()> {
        transmit(route, packet)
    }
}

/// Frame `packet` and hand it to the interface's send primitive in one call.
///
/// A packet whose encoded length exceeds the interface MTU is rejected
/// before the send primitive sees anything. The packet is consumed, and its
/// buffer released, on every path.
pub fn transmit(route: &Route, packet: Packet) -> Result<()> {
    let iface = &route.iface;
    let counters = &iface.counters;

    let len = match check_mtu(&packet, iface.mtu()) {
        Ok(len) => len,
        Err(err) => {
            warn!(iface = %iface.name(), error = %err, "dropping oversize packet");
            Counters::bump(&counters.tx_error, 1);
            return Err(err.into());
        }
    };

    let mut frame = BytesMut::with_capacity(len);
    encode_packet(&packet, &mut frame);
    let id = packet.id();
    drop(packet);

    match iface.send_primitive().send(&frame) {
        Ok(()) => {
            debug!(iface = %iface.name(), id = %id, len, via = ?route.via, "frame sent");
            Counters::bump(&counters.tx, 1);
            Counters::bump(&counters.tx_bytes, len as u64);
            Ok(())
        }
        Err(err) => {
            warn!(iface = %iface.name(), error = %err, len, "send primitive failed");
            Counters::bump(&counters.tx_error, 1);
            Err(err.into())
        }
    }
}
