use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cspmac_frame::{Packet, HEADER_SIZE};
use cspmac_iface::{open_and_add_interface, InterfaceRegistry, MacConfig, MacHandle};
use cspmac_transport::bridge;
use tracing::{debug, info};

use crate::cmd::{parse_duration, LoopbackArgs};
use crate::exit::{iface_error, io_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_packet, print_stats, OutputFormat, PacketView};

/// Per-byte flow control on the simulated wire.
const WIRE_PACE: Duration = Duration::from_millis(50);

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let timeout = parse_duration(&args.timeout)?;
    let id = args.id.resolve()?;
    let payload = args.payload.resolve()?;

    let config = MacConfig::default()
        .with_mtu(args.mtu)
        .with_rx_frame_len(HEADER_SIZE + payload.len())
        .with_rx_queue_depth(args.queue_depth)
        .with_pool_size(args.pool_size);

    let registry = InterfaceRegistry::new();
    let (a, _rx_a) = open(&registry, &config, "A")?;
    let (b, rx_b) = open(&registry, &config, "B")?;

    let a_to_b = bridge(a.outbound().clone(), b.inbound().clone(), WIRE_PACE)
        .map_err(|err| io_error("failed to start relay", err))?;
    let b_to_a = bridge(b.outbound().clone(), a.inbound().clone(), WIRE_PACE)
        .map_err(|err| io_error("failed to start relay", err))?;

    let running = Arc::new(AtomicBool::new(true));
    if args.count.is_none() {
        install_ctrlc_handler(running.clone())?;
    }

    let result = exchange(&a, &rx_b, &running, &args, id, &payload, interval, timeout, format);

    let stats = [
        (a.iface().name().to_string(), a.iface().stats()),
        (b.iface().name().to_string(), b.iface().stats()),
    ];
    a.shutdown();
    b.shutdown();
    let a_bytes = a_to_b.join().unwrap_or(0);
    let b_bytes = b_to_a.join().unwrap_or(0);
    debug!(a_to_b = a_bytes, b_to_a = b_bytes, "relays stopped");

    let sent = result?;
    info!(sent, "loopback finished");

    if args.stats {
        let rows: Vec<(&str, _)> = stats.iter().map(|(name, s)| (name.as_str(), *s)).collect();
        print_stats(&rows, format);
    }
    Ok(SUCCESS)
}

fn open(
    registry: &InterfaceRegistry,
    config: &MacConfig,
    name: &str,
) -> CliResult<(MacHandle, Arc<cspmac_iface::QueueDispatch>)> {
    let dispatch = Arc::new(config.dispatch());
    let handle = open_and_add_interface(
        registry,
        &config.clone().with_name(name),
        config.buffer_pool(),
        dispatch.clone(),
    )
    .map_err(|err| iface_error(&format!("failed to open interface {name}"), err))?;
    Ok((handle, dispatch))
}

#[allow(clippy::too_many_arguments)]
fn exchange(
    from: &MacHandle,
    to: &cspmac_iface::QueueDispatch,
    running: &AtomicBool,
    args: &LoopbackArgs,
    id: cspmac_frame::CspId,
    payload: &[u8],
    interval: Duration,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<usize> {
    let mut sent = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| sent >= count) {
            break;
        }
        if sent > 0 {
            std::thread::sleep(interval);
        }

        from.send(Packet::new(id, payload))
            .map_err(|err| iface_error("send failed", err))?;
        sent += 1;

        let Some(arrived) = to.recv_timeout(timeout) else {
            return Err(CliError::new(
                TIMEOUT,
                format!("packet {sent} did not arrive within {timeout:?}"),
            ));
        };
        print_packet(
            &PacketView {
                id: arrived.packet.id(),
                payload: arrived.packet.payload(),
                frame: None,
                iface: Some(arrived.iface.name()),
            },
            format,
        );
    }
    Ok(sent)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
