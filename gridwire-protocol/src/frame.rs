//! Binary frame format.
//!
//! Frame layout (6 bytes header + content), little-endian:
//!
//! ```text
//! +---------+----------------+------------------------+
//! | flags   | content_len    | content                |
//! | 2 bytes | 4 bytes        | content_len bytes      |
//! +---------+----------------+------------------------+
//! ```

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes (2+4 = 6).
pub const FRAME_HEADER_SIZE: usize = 6;

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// First fragment of a fragmented message.
    pub const BEGIN_FRAGMENT: u16 = 1 << 15;
    /// Last fragment of a fragmented message.
    pub const END_FRAGMENT: u16 = 1 << 14;
    /// A message that travels as a single fragment.
    pub const UNFRAGMENTED: u16 = Self::BEGIN_FRAGMENT | Self::END_FRAGMENT;
    /// Last frame of a wire unit.
    pub const IS_FINAL: u16 = 1 << 13;
    /// Opens a composite value (list or nested record).
    pub const BEGIN_DATA_STRUCTURE: u16 = 1 << 12;
    /// Closes a composite value.
    pub const END_DATA_STRUCTURE: u16 = 1 << 11;
    /// Placeholder for a null variable-length value.
    pub const IS_NULL: u16 = 1 << 10;
    /// Message is a server-pushed event.
    pub const IS_EVENT: u16 = 1 << 9;
    /// Request expects backup acknowledgements.
    pub const BACKUP_AWARE: u16 = 1 << 8;
    /// Message is a backup acknowledgement event.
    pub const BACKUP_EVENT: u16 = 1 << 7;

    /// Valid flags mask for protocol version 1.
    const VALID_V1_MASK: u16 = 0xFF80;

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn unfragmented() -> Self {
        Self(Self::UNFRAGMENTED)
    }

    pub const fn with(self, bits: u16) -> Self {
        Self(self.0 | bits)
    }

    pub const fn without(self, bits: u16) -> Self {
        Self(self.0 & !bits)
    }

    pub const fn contains(&self, bits: u16) -> bool {
        self.0 & bits == bits
    }

    pub fn is_begin_fragment(&self) -> bool {
        self.contains(Self::BEGIN_FRAGMENT)
    }

    pub fn is_end_fragment(&self) -> bool {
        self.contains(Self::END_FRAGMENT)
    }

    pub fn is_unfragmented(&self) -> bool {
        self.contains(Self::UNFRAGMENTED)
    }

    pub fn is_final(&self) -> bool {
        self.contains(Self::IS_FINAL)
    }

    pub fn is_event(&self) -> bool {
        self.contains(Self::IS_EVENT)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_V1_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// A single protocol frame: flags plus raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame flags.
    pub flags: FrameFlags,
    /// Frame content.
    pub content: Bytes,
}

impl Frame {
    /// Creates a frame with no flags set.
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self::with_flags(content, FrameFlags::new())
    }

    pub fn with_flags(content: impl Into<Bytes>, flags: FrameFlags) -> Self {
        Self {
            flags,
            content: content.into(),
        }
    }

    /// Empty frame marking a null value.
    pub fn null() -> Self {
        Self::with_flags(Bytes::new(), FrameFlags::new().with(FrameFlags::IS_NULL))
    }

    /// Empty frame opening a composite value.
    pub fn begin() -> Self {
        Self::with_flags(
            Bytes::new(),
            FrameFlags::new().with(FrameFlags::BEGIN_DATA_STRUCTURE),
        )
    }

    /// Empty frame closing a composite value.
    pub fn end() -> Self {
        Self::with_flags(
            Bytes::new(),
            FrameFlags::new().with(FrameFlags::END_DATA_STRUCTURE),
        )
    }

    pub fn is_null_frame(&self) -> bool {
        self.flags.contains(FrameFlags::IS_NULL)
    }

    pub fn is_begin_frame(&self) -> bool {
        self.flags.contains(FrameFlags::BEGIN_DATA_STRUCTURE)
    }

    pub fn is_end_frame(&self) -> bool {
        self.flags.contains(FrameFlags::END_DATA_STRUCTURE)
    }

    /// Number of bytes this frame occupies on the wire.
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.content.len()
    }

    /// Appends the wire encoding of this frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.encode_with_flags(self.flags, buf)
    }

    pub(crate) fn encode_with_flags(
        &self,
        flags: FrameFlags,
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        let content_len =
            u32::try_from(self.content.len()).map_err(|_| ProtocolError::FrameTooLarge {
                size: u32::MAX,
                max: u32::MAX,
            })?;

        buf.reserve(self.wire_size());
        buf.put_u16_le(flags.bits());
        buf.put_u32_le(content_len);
        buf.put_slice(&self.content);
        Ok(())
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut, max_frame_size: u32) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Peek at header without consuming
        let flags_bits = u16::from_le_bytes([buf[0], buf[1]]);
        let flags = FrameFlags::from_bits(flags_bits)?;

        let content_len = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        if content_len > max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: content_len,
                max: max_frame_size,
            });
        }

        let total_len = FRAME_HEADER_SIZE + content_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let content = buf.split_to(content_len as usize).freeze();

        Ok(Some(Self { flags, content }))
    }
}
