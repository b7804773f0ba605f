use bytes::BytesMut;
use isbridge_frame::{decode_frame, encode_frame, DataId, FrameError, FRAME_OVERHEAD};
use proptest::prelude::*;

const HEADER_END: usize = 8;

proptest! {
    #[test]
    fn prop_decode_inverts_encode(
        did in any::<u8>(),
        offset in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut wire = BytesMut::new();
        encode_frame(DataId(did), offset, &payload, &mut wire).unwrap();
        prop_assert_eq!(wire.len(), FRAME_OVERHEAD + payload.len());

        let decoded = decode_frame(&wire).unwrap();
        prop_assert_eq!(decoded.did, DataId(did));
        prop_assert_eq!(decoded.offset, offset);
        prop_assert_eq!(decoded.payload(), Some(payload.as_slice()));
    }

    #[test]
    fn prop_payload_bit_flip_is_detected(
        payload in proptest::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut wire = BytesMut::new();
        encode_frame(DataId::INS_1, 0, &payload, &mut wire).unwrap();

        let pos = HEADER_END + index.index(payload.len());
        wire[pos] ^= 1 << bit;

        let result = decode_frame(&wire);
        prop_assert!(
            matches!(result, Err(FrameError::ChecksumInvalid { .. })),
            "flip at {} bit {} gave {:?}", pos, bit, result
        );
    }

    #[test]
    fn prop_buffers_without_preamble_yield_no_frame(
        bytes in proptest::collection::vec(0u8..0xEF, 0..128),
    ) {
        prop_assert!(matches!(decode_frame(&bytes), Err(FrameError::NoFrame)));
    }
}
