//! Two MAC interfaces joined by a TCP connection on localhost.
//!
//! Interface "TX" writes frames straight onto the socket through a
//! `StreamSend`; interface "RX" is fed from the other end of the socket by a
//! relay pump and hands each packet to a router queue.
//!
//! Run with:
//!   cargo run --example loopback

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use cspmac::frame::{CspId, Packet, HEADER_SIZE};
use cspmac::iface::{
    open_and_add_interface, register, InterfaceDescriptor, InterfaceRegistry, MacConfig, Route,
};
use cspmac::transport::{pump_reader, StreamSend};

const MESSAGES: [&str; 3] = ["ping", "pong", "ping"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let writer = TcpStream::connect(listener.local_addr()?)?;
    let (reader, _) = listener.accept()?;

    let registry = InterfaceRegistry::new();
    let frame_len = HEADER_SIZE + MESSAGES[0].len();

    let config = MacConfig::default()
        .with_name("RX")
        .with_rx_frame_len(frame_len);
    let router = Arc::new(config.dispatch());
    let rx = open_and_add_interface(&registry, &config, config.buffer_pool(), router.clone())?;
    let pump = pump_reader(reader, rx.inbound().clone())?;

    let tx = register(
        &registry,
        InterfaceDescriptor::new("TX", Arc::new(StreamSend::new(writer))),
    )?;
    let route = Route::new(Arc::clone(&tx));

    for (seq, text) in MESSAGES.iter().enumerate() {
        let id = CspId::new(2, 1, 2, 10, seq as u8, 0);
        route.send(Packet::new(id, text.as_bytes()))?;

        match router.recv_timeout(Duration::from_secs(2)) {
            Some(inbound) => eprintln!(
                "{} received {:?} from {}",
                inbound.iface.name(),
                String::from_utf8_lossy(inbound.packet.payload()),
                inbound.packet.id()
            ),
            None => eprintln!("packet {seq} was lost"),
        }
    }

    eprintln!("TX {:?}", tx.stats());
    eprintln!("RX {:?}", rx.iface().stats());

    rx.shutdown();
    drop(registry);
    drop(route);
    drop(tx);
    let _ = pump.join();
    Ok(())
}
