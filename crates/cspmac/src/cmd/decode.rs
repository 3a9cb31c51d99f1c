use cspmac_frame::{decode_packet, PacketBuf};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat, PacketView};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.frame)?;
    let len = args.len.unwrap_or(bytes.len());

    let mut buf = PacketBuf::unpooled(bytes.len());
    buf.extend_from_slice(&bytes);
    let packet = decode_packet(buf, len).map_err(|err| frame_error("decode failed", err))?;

    print_packet(
        &PacketView {
            id: packet.id(),
            payload: packet.payload(),
            frame: Some(&bytes[..len]),
            iface: None,
        },
        format,
    );
    Ok(SUCCESS)
}
