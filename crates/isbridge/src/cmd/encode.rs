use bytes::BytesMut;
use isbridge_frame::{encode_packet, DataId, PacketType};

use crate::cmd::{resolve_payload, EncodeArgs, FrameArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = encode_args(&args.frame)?;
    print_encoded(&wire, format);
    Ok(SUCCESS)
}

/// Build the wire bytes described by the frame arguments.
pub fn encode_args(args: &FrameArgs) -> CliResult<BytesMut> {
    let payload = resolve_payload(args)?;
    let packet_type = PacketType::from(args.packet_type);
    let mut wire = BytesMut::new();
    encode_packet(packet_type, DataId(args.did), args.offset, &payload, &mut wire)
        .map_err(|err| frame_error("encode failed", err))?;
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use isbridge_frame::{decode_frame, FRAME_OVERHEAD, PREAMBLE};

    use super::*;
    use crate::cmd::PacketTypeArg;
    use crate::exit::DATA_INVALID;

    fn args(packet_type: PacketTypeArg, data: Option<&str>) -> FrameArgs {
        FrameArgs {
            did: 3,
            offset: 12,
            packet_type,
            data: data.map(str::to_string),
            hex: None,
            file: None,
        }
    }

    #[test]
    fn encodes_the_requested_packet() {
        let wire = encode_args(&args(PacketTypeArg::SetData, Some("abc"))).unwrap();
        assert_eq!(&wire[..2], &PREAMBLE);
        assert_eq!(wire.len(), FRAME_OVERHEAD + 3);

        let decoded = decode_frame(&wire).unwrap();
        assert_eq!(decoded.packet_type, PacketType::SetData);
        assert_eq!(decoded.did, DataId(3));
        assert_eq!(decoded.offset, 12);
        assert_eq!(decoded.payload(), Some(&b"abc"[..]));
    }

    #[test]
    fn oversized_payload_is_invalid_data() {
        let mut big = args(PacketTypeArg::Data, None);
        big.hex = Some("00".repeat(u16::MAX as usize + 1));
        assert_eq!(encode_args(&big).unwrap_err().code, DATA_INVALID);
    }
}
