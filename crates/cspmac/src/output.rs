use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use cspmac_frame::id::priority_name;
use cspmac_frame::CspId;
use cspmac_iface::InterfaceStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A packet as the CLI reports it. `frame` is set when the wire bytes are
/// known, `iface` when the packet arrived on an interface.
pub struct PacketView<'a> {
    pub id: CspId,
    pub payload: &'a [u8],
    pub frame: Option<&'a [u8]>,
    pub iface: Option<&'a str>,
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    id: String,
    priority: &'static str,
    src: u8,
    dst: u8,
    dport: u8,
    sport: u8,
    flags: u8,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iface: Option<&'a str>,
}

impl<'a> PacketOutput<'a> {
    fn from_view(view: &PacketView<'a>) -> Self {
        Self {
            id: format!("{:#010x}", view.id.ext()),
            priority: priority_name(view.id.pri()),
            src: view.id.src(),
            dst: view.id.dst(),
            dport: view.id.dport(),
            sport: view.id.sport(),
            flags: view.id.flags(),
            payload_size: view.payload.len(),
            payload: hex::encode(view.payload),
            frame: view.frame.map(hex::encode),
            iface: view.iface,
        }
    }
}

pub fn print_packet(view: &PacketView<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput::from_view(view);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let out = PacketOutput::from_view(view);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "PRI", "SRC", "DST", "DPORT", "SPORT", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    out.id,
                    out.priority.to_string(),
                    out.src.to_string(),
                    out.dst.to_string(),
                    out.dport.to_string(),
                    out.sport.to_string(),
                    out.payload_size.to_string(),
                    out.payload,
                ]);
            if let Some(frame) = out.frame {
                table.add_row(vec!["FRAME".to_string(), frame]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let iface = view.iface.map(|name| format!("{name}: ")).unwrap_or_default();
            println!(
                "{iface}{:#010x} {} size={} payload={}",
                view.id.ext(),
                view.id,
                view.payload.len(),
                payload_preview(view.payload)
            );
            if let Some(frame) = view.frame {
                println!("frame={}", hex::encode(frame));
            }
        }
        OutputFormat::Raw => print_raw(view.frame.unwrap_or(view.payload)),
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    iface: &'a str,
    #[serde(flatten)]
    stats: InterfaceStats,
}

pub fn print_stats(ifaces: &[(&str, InterfaceStats)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for (iface, stats) in ifaces {
                let out = StatsOutput {
                    iface,
                    stats: *stats,
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "IFACE", "TX", "RX", "TX_ERR", "RX_ERR", "DROP", "TX_BYTES", "RX_BYTES",
                ]);
            for (iface, stats) in ifaces {
                table.add_row(vec![
                    iface.to_string(),
                    stats.tx.to_string(),
                    stats.rx.to_string(),
                    stats.tx_error.to_string(),
                    stats.rx_error.to_string(),
                    stats.drop.to_string(),
                    stats.tx_bytes.to_string(),
                    stats.rx_bytes.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (iface, s) in ifaces {
                println!(
                    "{iface}: tx={} rx={} tx_error={} rx_error={} drop={} tx_bytes={} rx_bytes={}",
                    s.tx, s.rx, s.tx_error, s.rx_error, s.drop, s.tx_bytes, s.rx_bytes
                );
            }
        }
        // Raw output carries packet bytes only.
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => format!("{text:?}"),
        _ => hex::encode(payload),
    }
}
