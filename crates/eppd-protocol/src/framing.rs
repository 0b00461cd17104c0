//! EPP transport framing.
//!
//! ```text
//! +---------------------+------------------+
//! | length (3 or 4, BE) |  XML document    |
//! +---------------------+------------------+
//! ```
//!
//! RFC 5734 counts the header in the length. Some registries count the
//! document only. [`LengthMode::Either`] sends RFC frames and accepts both on
//! receive.

use eppd_core::{FramingSettings, HeaderWidth, LengthMode};

use crate::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Result of inspecting an accumulation buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// More bytes are needed.
    Incomplete,
    /// A whole frame is available.
    Complete {
        /// The document bytes, header stripped.
        payload: Vec<u8>,
        /// How many bytes of the buffer the frame occupied.
        consumed: usize,
    },
}

/// Encodes and decodes EPP frames for one registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCodec {
    length: LengthMode,
    header: HeaderWidth,
}

impl From<FramingSettings> for FrameCodec {
    fn from(settings: FramingSettings) -> Self {
        Self::new(settings.length, settings.header)
    }
}

impl FrameCodec {
    /// Creates a codec with explicit length semantics.
    pub fn new(length: LengthMode, header: HeaderWidth) -> Self {
        Self { length, header }
    }

    /// Returns the header width in bytes.
    pub fn header_len(&self) -> usize {
        self.header.bytes()
    }

    /// Frames a document.
    pub fn encode(&self, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        let width = self.header_len();
        let declared = match self.length {
            LengthMode::IncludesHeader | LengthMode::Either => payload.len() + width,
            LengthMode::ExcludesHeader => payload.len(),
        };

        let max = MAX_FRAME_SIZE.min(max_for_width(width));
        if declared > max {
            return Err(ProtocolError::MessageTooLarge {
                size: declared,
                max,
            });
        }

        let mut frame = Vec::with_capacity(width + payload.len());
        frame.extend_from_slice(&(declared as u32).to_be_bytes()[4 - width..]);
        frame.extend_from_slice(payload);
        Ok(frame)
    }

    /// Inspects `buf` and reports whether it starts with a complete frame.
    ///
    /// In [`LengthMode::Either`] a frame is complete when the buffer length
    /// equals the declared length (header counted) or the body length equals
    /// it (header not counted). A buffer longer than both is read as an RFC
    /// frame followed by leftover bytes.
    pub fn decode(&self, buf: &[u8]) -> ProtocolResult<FrameStatus> {
        let width = self.header_len();
        if buf.len() < width {
            return Ok(FrameStatus::Incomplete);
        }

        let declared = buf[..width]
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
        if declared > MAX_FRAME_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: declared,
                max: MAX_FRAME_SIZE,
            });
        }

        let end = match self.length {
            LengthMode::IncludesHeader => {
                if declared < width {
                    return Err(ProtocolError::InvalidFrameLength {
                        length: declared,
                        header: width,
                    });
                }
                (buf.len() >= declared).then_some(declared)
            }
            LengthMode::ExcludesHeader => {
                (buf.len() >= width + declared).then_some(width + declared)
            }
            LengthMode::Either => {
                if buf.len() == width + declared {
                    Some(width + declared)
                } else if declared >= width && (buf.len() == declared || buf.len() > width + declared)
                {
                    Some(declared)
                } else {
                    None
                }
            }
        };

        Ok(match end {
            Some(end) => FrameStatus::Complete {
                payload: buf[width..end].to_vec(),
                consumed: end,
            },
            None => FrameStatus::Incomplete,
        })
    }
}

fn max_for_width(width: usize) -> usize {
    if width >= 4 {
        u32::MAX as usize
    } else {
        (1usize << (8 * width)) - 1
    }
}

/// Accumulates bytes read from the connection until a frame is complete.
///
/// Partial frames stay buffered and are merged with later reads.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Removes and returns the first complete frame's document, if any.
    pub fn try_take(&mut self, codec: &FrameCodec) -> ProtocolResult<Option<Vec<u8>>> {
        match codec.decode(&self.buf)? {
            FrameStatus::Incomplete => Ok(None),
            FrameStatus::Complete { payload, consumed } => {
                self.buf.drain(..consumed);
                Ok(Some(payload))
            }
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drops any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codecs() -> Vec<FrameCodec> {
        let mut codecs = Vec::new();
        for length in [
            LengthMode::IncludesHeader,
            LengthMode::ExcludesHeader,
            LengthMode::Either,
        ] {
            for header in [HeaderWidth::Three, HeaderWidth::Four] {
                codecs.push(FrameCodec::new(length, header));
            }
        }
        codecs
    }

    fn payloads() -> Vec<Vec<u8>> {
        vec![
            Vec::new(),
            b"<epp/>".to_vec(),
            b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><epp><hello/></epp>".to_vec(),
            "<epp>r\u{e9}sum\u{e9}</epp>".as_bytes().to_vec(),
            vec![b'x'; 70_000],
        ]
    }

    #[test]
    fn default_codec_writes_rfc_header() {
        let frame = FrameCodec::default().encode(b"<epp/>").unwrap();
        assert_eq!(&frame[..4], &10u32.to_be_bytes());
        assert_eq!(&frame[4..], b"<epp/>");
    }

    #[test]
    fn excludes_header_counts_payload_only() {
        let codec = FrameCodec::new(LengthMode::ExcludesHeader, HeaderWidth::Four);
        let frame = codec.encode(b"<epp/>").unwrap();
        assert_eq!(&frame[..4], &6u32.to_be_bytes());
    }

    #[test]
    fn three_byte_header() {
        let codec = FrameCodec::new(LengthMode::IncludesHeader, HeaderWidth::Three);
        let frame = codec.encode(b"<epp/>").unwrap();
        assert_eq!(&frame[..3], &[0, 0, 9]);
        assert_eq!(frame.len(), 9);
    }

    #[test]
    fn frame_round_trip() {
        for codec in codecs() {
            for payload in payloads() {
                let frame = codec.encode(&payload).unwrap();
                match codec.decode(&frame).unwrap() {
                    FrameStatus::Complete {
                        payload: decoded,
                        consumed,
                    } => {
                        assert_eq!(decoded, payload, "{:?}", codec);
                        assert_eq!(consumed, frame.len());
                    }
                    FrameStatus::Incomplete => panic!("incomplete frame for {:?}", codec),
                }
            }
        }
    }

    #[test]
    fn every_prefix_is_incomplete() {
        for codec in codecs() {
            let frame = codec.encode(b"<epp><hello/></epp>").unwrap();
            for end in 0..frame.len() {
                assert_eq!(
                    codec.decode(&frame[..end]).unwrap(),
                    FrameStatus::Incomplete,
                    "{:?} prefix {}",
                    codec,
                    end
                );
            }
        }
    }

    #[test]
    fn either_mode_accepts_length_without_header() {
        let strict = FrameCodec::new(LengthMode::ExcludesHeader, HeaderWidth::Four);
        let frame = strict.encode(b"<epp><greeting/></epp>").unwrap();

        let lenient = FrameCodec::default();
        let FrameStatus::Complete { payload, .. } = lenient.decode(&frame).unwrap() else {
            panic!("expected a complete frame");
        };
        assert_eq!(payload, b"<epp><greeting/></epp>");
    }

    #[test]
    fn either_mode_can_cut_an_excluded_frame_short() {
        let strict = FrameCodec::new(LengthMode::ExcludesHeader, HeaderWidth::Four);
        let frame = strict.encode(b"<epp><greeting/></epp>").unwrap();
        let partial = &frame[..frame.len() - 4];

        let FrameStatus::Complete { payload, consumed } =
            FrameCodec::default().decode(partial).unwrap()
        else {
            panic!("expected a complete frame");
        };
        assert_eq!(payload, b"<epp><greeting/></");
        assert_eq!(consumed, partial.len());

        assert_eq!(strict.decode(partial).unwrap(), FrameStatus::Incomplete);
    }

    #[test]
    fn rejects_oversized_declared_length() {
        let mut frame = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(b"<epp/>");
        assert!(matches!(
            FrameCodec::default().decode(&frame),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_length_shorter_than_header() {
        let codec = FrameCodec::new(LengthMode::IncludesHeader, HeaderWidth::Four);
        let frame = [0, 0, 0, 2, b'x', b'y'];
        assert!(matches!(
            codec.decode(&frame),
            Err(ProtocolError::InvalidFrameLength { length: 2, header: 4 })
        ));
    }

    #[test]
    fn three_byte_header_limits_payload() {
        let codec = FrameCodec::new(LengthMode::ExcludesHeader, HeaderWidth::Three);
        let payload = vec![0u8; 1 << 24];
        assert!(codec.encode(&payload).is_err());
    }

    #[test]
    fn buffer_merges_partial_reads() {
        let codec = FrameCodec::default();
        let frame = codec.encode(b"<epp><response/></epp>").unwrap();

        let mut buffer = FrameBuffer::new();
        for chunk in frame.chunks(5) {
            assert!(buffer.try_take(&codec).unwrap().is_none());
            buffer.extend(chunk);
        }
        assert_eq!(
            buffer.try_take(&codec).unwrap().unwrap(),
            b"<epp><response/></epp>"
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn buffer_keeps_leftover_bytes() {
        let codec = FrameCodec::new(LengthMode::IncludesHeader, HeaderWidth::Four);
        let mut bytes = codec.encode(b"<a/>").unwrap();
        bytes.extend(codec.encode(b"<b/>").unwrap());

        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes);
        assert_eq!(buffer.try_take(&codec).unwrap().unwrap(), b"<a/>");
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.try_take(&codec).unwrap().unwrap(), b"<b/>");
    }
}
