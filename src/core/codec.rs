//! Frame codec for `tokio_util::codec` framing.
//!
//! `FrameCodec` is also what [`FrameReader`](crate::transport::reader::FrameReader)
//! drives over a blocking `Read`, so both paths share the same header parsing.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{Frame, HEADER_LEN};
use crate::error::{AdbError, Result};

/// Upper bound on what one `decode` call reserves for a partial payload.
pub const MAX_RESERVE: usize = 64 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    /// Total frame size announced by a buffered header, if the header is complete.
    pub fn pending_len(src: &[u8]) -> Option<usize> {
        if src.len() < HEADER_LEN {
            return None;
        }
        let mut length = &src[12..16];
        Some(HEADER_LEN + length.get_u32_le() as usize)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = AdbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let total = match Self::pending_len(src) {
            Some(total) => total,
            None => return Ok(None),
        };

        // The length is device-supplied; grow with the data, never ahead of it.
        if src.len() < total {
            src.reserve((total - src.len()).min(MAX_RESERVE));
            return Ok(None);
        }

        let mut buf = src.split_to(total);
        let command = buf.get_u32_le();
        let arg0 = buf.get_u32_le();
        let arg1 = buf.get_u32_le();
        let payload_length = buf.get_u32_le();
        let checksum = buf.get_u32_le();
        let magic = buf.get_u32_le();

        Ok(Some(Frame {
            command,
            arg0,
            arg1,
            payload_length,
            checksum,
            magic,
            payload: buf.freeze(),
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(AdbError::TruncatedFrame {
                expected: Self::pending_len(src).unwrap_or(HEADER_LEN),
                actual: src.len(),
            }),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = AdbError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.write_to(dst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::packet::command;

    #[test]
    fn test_partial_header_keeps_buffer() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&b"WRTE\x01\x00"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_partial_payload_keeps_buffer() {
        let mut codec = FrameCodec;
        let bytes = Frame::new(command::WRTE, 1, 2, vec![7u8; 32]).to_bytes();
        let mut buf = BytesMut::from(&bytes[..40]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 40);
        buf.extend_from_slice(&bytes[40..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 32);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_huge_declared_length_reserves_bounded() {
        let mut codec = FrameCodec;
        let mut bytes = Frame::new(command::WRTE, 1, 2, Vec::new()).to_bytes();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut buf = BytesMut::from(&bytes[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.capacity() <= HEADER_LEN + 2 * MAX_RESERVE);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(AdbError::TruncatedFrame { actual: HEADER_LEN, .. })
        ));
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(command::OKAY, 1, 2, Vec::new()), &mut buf)
            .unwrap();
        codec
            .encode(Frame::new(command::CLSE, 3, 4, Vec::new()), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.command, command::OKAY);
        assert_eq!(second.command, command::CLSE);
        assert_eq!(second.arg1, 4);
    }

    #[test]
    fn test_decode_eof_reports_truncation() {
        let mut codec = FrameCodec;
        let bytes = Frame::new(command::WRTE, 1, 2, vec![7u8; 8]).to_bytes();
        let mut buf = BytesMut::from(&bytes[..30]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            AdbError::TruncatedFrame {
                expected: 32,
                actual: 30
            }
        ));
    }
}
