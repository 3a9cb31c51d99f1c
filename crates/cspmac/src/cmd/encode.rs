use cspmac_frame::{check_mtu, encode_packet, Packet};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat, PacketView};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let id = args.id.resolve()?;
    let payload = args.payload.resolve()?;

    let packet = Packet::new(id, &payload);
    let len = check_mtu(&packet, args.mtu).map_err(|err| frame_error("encode failed", err))?;
    let mut frame = Vec::with_capacity(len);
    encode_packet(&packet, &mut frame);

    print_packet(
        &PacketView {
            id,
            payload: packet.payload(),
            frame: Some(&frame),
            iface: None,
        },
        format,
    );
    Ok(SUCCESS)
}
