use std::sync::Arc;

use cspmac_frame::{decode_packet, BufferPool, PacketBuf, RxStep};
use tracing::{debug, warn};

use crate::dispatch::{InboundDispatch, WakeHint};
use crate::error::{IfaceError, Result};
use crate::iface::{Counters, Interface};

/// Feed one received byte to the interface's frame accumulator.
///
/// When the byte completes a frame it is decoded and delivered straight
/// away, so the returned step is [`RxStep::Complete`] only after the packet
/// has been handed to `dispatch`. Safe to call from an interrupt-like
/// context: it never blocks on anything but the accumulator lock.
///
/// A frame completed by shrinking the frame length with
/// [`Interface::set_rx_frame_len`] is delivered before `byte` starts the
/// next one.
pub fn rx_byte(
    iface: &Arc<Interface>,
    byte: u8,
    pool: &BufferPool,
    dispatch: &dyn InboundDispatch,
    hint: &WakeHint,
) -> RxStep {
    let pending = iface.rx_state().take_frame();
    if let Some((buf, len)) = pending {
        debug!(iface = %iface.name(), len, "delivering frame completed by frame length change");
        deliver_or_count(iface, buf, len, dispatch, hint);
    }

    let step = iface.rx_state().push(byte, pool);
    match step {
        RxStep::Dropped => Counters::bump(&iface.counters.drop, 1),
        RxStep::Complete => {
            let frame = iface.rx_state().take_frame();
            match frame {
                Some((buf, len)) => deliver_or_count(iface, buf, len, dispatch, hint),
                None => warn!(iface = %iface.name(), "completed frame vanished before assembly"),
            }
        }
        RxStep::Accumulating { .. } => {}
    }
    step
}

/// Turn the completed frame into a packet and hand it to `dispatch`.
///
/// The header is stripped, the identifier restored, and the payload length
/// reduced by the header size. Receive state returns to idle whatever the
/// outcome; a frame that fails to decode has its buffer released and is
/// counted as a receive error.
pub fn assemble(
    iface: &Arc<Interface>,
    dispatch: &dyn InboundDispatch,
    hint: &WakeHint,
) -> Result<()> {
    let (buf, len) = iface
        .rx_state()
        .take_frame()
        .ok_or(IfaceError::InvalidArgument("no completed frame"))?;
    deliver(iface, buf, len, dispatch, hint)
}

/// Byte-path delivery. Decode failures are already counted as receive errors.
fn deliver_or_count(
    iface: &Arc<Interface>,
    buf: PacketBuf,
    len: usize,
    dispatch: &dyn InboundDispatch,
    hint: &WakeHint,
) {
    match deliver(iface, buf, len, dispatch, hint) {
        Ok(()) | Err(IfaceError::Frame(_)) => {}
        Err(err) => warn!(iface = %iface.name(), error = %err, "frame delivery failed"),
    }
}

fn deliver(
    iface: &Arc<Interface>,
    buf: PacketBuf,
    len: usize,
    dispatch: &dyn InboundDispatch,
    hint: &WakeHint,
) -> Result<()> {
    let packet = match decode_packet(buf, len) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(iface = %iface.name(), error = %err, "discarding undecodable frame");
            Counters::bump(&iface.counters.rx_error, 1);
            return Err(err.into());
        }
    };

    debug!(iface = %iface.name(), id = %packet.id(), len = packet.len(), "frame received");
    Counters::bump(&iface.counters.rx, 1);
    Counters::bump(&iface.counters.rx_bytes, len as u64);
    dispatch.deliver(packet, iface, hint);
    Ok(())
}
