use std::time::Duration;

use clap::{Args, Subcommand};
use cspmac_frame::{CspId, MAX_MTU};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod loopback;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a packet into a MAC frame.
    Encode(EncodeArgs),
    /// Decode a MAC frame into a packet.
    Decode(DecodeArgs),
    /// Run two MAC interfaces back to back and print what arrives.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Packet identifier, either raw or by field.
#[derive(Args, Debug, Default)]
pub struct IdArgs {
    /// Raw 32-bit extended identifier (decimal or 0x-prefixed hex).
    #[arg(long, conflicts_with_all = ["pri", "src", "dst", "dport", "sport", "flags"])]
    pub id: Option<String>,
    /// Priority (0-3).
    #[arg(long)]
    pub pri: Option<u8>,
    /// Source address (0-31).
    #[arg(long)]
    pub src: Option<u8>,
    /// Destination address (0-31).
    #[arg(long)]
    pub dst: Option<u8>,
    /// Destination port (0-63).
    #[arg(long)]
    pub dport: Option<u8>,
    /// Source port (0-63).
    #[arg(long)]
    pub sport: Option<u8>,
    /// Header flags.
    #[arg(long)]
    pub flags: Option<u8>,
}

impl IdArgs {
    pub fn resolve(&self) -> CliResult<CspId> {
        if let Some(raw) = &self.id {
            return parse_u32(raw).map(CspId::from_ext);
        }
        Ok(CspId::new(
            self.pri.unwrap_or(cspmac_frame::id::PRIO_NORM),
            self.src.unwrap_or(0),
            self.dst.unwrap_or(0),
            self.dport.unwrap_or(0),
            self.sport.unwrap_or(0),
            self.flags.unwrap_or(0),
        ))
    }
}

/// Packet payload, as text or hex.
#[derive(Args, Debug, Default)]
pub struct PayloadArgs {
    /// Text payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex payload.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(hex) = &self.hex {
            return parse_hex(hex);
        }
        Ok(self
            .data
            .as_deref()
            .map(|text| text.as_bytes().to_vec())
            .unwrap_or_default())
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub id: IdArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Interface MTU the frame must fit in.
    #[arg(long, default_value_t = MAX_MTU)]
    pub mtu: usize,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes in hex.
    pub frame: String,
    /// Declared frame length; defaults to the number of bytes given.
    #[arg(long)]
    pub len: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    #[command(flatten)]
    pub id: IdArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Number of packets to send; runs until interrupted when absent.
    #[arg(long)]
    pub count: Option<usize>,
    /// Delay between packets (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub interval: String,
    /// How long to wait for each packet to arrive (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Interface MTU; 0 means the maximum.
    #[arg(long, default_value_t = 0)]
    pub mtu: usize,
    /// Packet buffers per interface.
    #[arg(long, default_value_t = cspmac_frame::DEFAULT_POOL_SIZE)]
    pub pool_size: usize,
    /// Inbound relay queue depth, in bytes.
    #[arg(long, default_value_t = cspmac_transport::DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
    /// Print interface counters when done.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_u32(input: &str) -> CliResult<u32> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u32::from_str_radix(&digits.replace('_', ""), 16),
        None => input.replace('_', "").parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid identifier: {input}")))
}

pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::new(USAGE, format!("invalid hex {input:?}: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_parse_as_hex_or_decimal() {
        assert_eq!(parse_u32("0xAABBCCDD").unwrap(), 0xAABB_CCDD);
        assert_eq!(parse_u32("0xaabb_ccdd").unwrap(), 0xAABB_CCDD);
        assert_eq!(parse_u32("42").unwrap(), 42);
        assert!(parse_u32("0x1_0000_0000").is_err());
        assert!(parse_u32("abc").is_err());
    }

    #[test]
    fn hex_accepts_separators() {
        assert_eq!(parse_hex("aa bb:cc").unwrap(), vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(parse_hex("0x0102").unwrap(), vec![1, 2]);
        assert!(parse_hex("abc").is_err());
    }

    #[test]
    fn id_from_fields_defaults_to_normal_priority() {
        let args = IdArgs {
            dst: Some(3),
            dport: Some(10),
            ..IdArgs::default()
        };
        let id = args.resolve().unwrap();
        assert_eq!(id.pri(), 2);
        assert_eq!(id.dst(), 3);
        assert_eq!(id.dport(), 10);
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
        assert!(parse_duration("bad").is_err());
    }
}
