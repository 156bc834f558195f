//! Messages as ordered frame chains.
//!
//! The first frame of every message is the *initial frame*. It starts with a
//! reserved prefix that lets a dispatcher route the message without knowing
//! the operation's full layout:
//!
//! ```text
//! +--------------+----------------+--------------+-------------------------+
//! | message_type | correlation_id | partition_id | operation fixed fields  |
//! | i32 @0       | i64 @4         | i32 @12      | @16..                   |
//! +--------------+----------------+--------------+-------------------------+
//! ```
//!
//! Responses additionally carry a `backup_acks` byte at offset 16.

use crate::cursor::FrameCursor;
use crate::error::ProtocolError;
use crate::fixed::{self, FixedSize, BYTE_SIZE, INT_SIZE, LONG_SIZE};
use crate::frame::{Frame, FrameFlags};
use bytes::BytesMut;

pub const TYPE_FIELD_OFFSET: usize = 0;
pub const CORRELATION_ID_FIELD_OFFSET: usize = TYPE_FIELD_OFFSET + INT_SIZE;
pub const PARTITION_ID_FIELD_OFFSET: usize = CORRELATION_ID_FIELD_OFFSET + LONG_SIZE;
/// Size of the reserved prefix shared by every initial frame.
pub const REQUEST_HEADER_SIZE: usize = PARTITION_ID_FIELD_OFFSET + INT_SIZE;
pub const RESPONSE_BACKUP_ACKS_FIELD_OFFSET: usize = REQUEST_HEADER_SIZE;
pub const RESPONSE_HEADER_SIZE: usize = RESPONSE_BACKUP_ACKS_FIELD_OFFSET + BYTE_SIZE;

/// One logical request, response or event.
///
/// Built by a single writer during encode and handed off by value; decoded
/// through a [`FrameCursor`] borrowed from an immutable message.
#[derive(Debug, Clone, Default)]
pub struct Message {
    frames: Vec<Frame>,
    retryable: bool,
    operation_name: Option<String>,
}

impl Message {
    /// Creates an empty message ready for encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps frames received from the wire.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Appends a frame. Frames are never modified once added, except the
    /// header fields of the initial frame before the message is handed off.
    pub fn add(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn initial_frame(&self) -> Result<&Frame, ProtocolError> {
        self.frames.first().ok_or(ProtocolError::TruncatedMessage {
            expected: "initial frame",
        })
    }

    /// Returns a cursor positioned at the initial frame.
    pub fn cursor(&self) -> FrameCursor<'_> {
        FrameCursor::new(&self.frames)
    }

    pub fn message_type(&self) -> Result<i32, ProtocolError> {
        self.read_header(TYPE_FIELD_OFFSET)
    }

    pub fn correlation_id(&self) -> Result<i64, ProtocolError> {
        self.read_header(CORRELATION_ID_FIELD_OFFSET)
    }

    pub fn partition_id(&self) -> Result<i32, ProtocolError> {
        self.read_header(PARTITION_ID_FIELD_OFFSET)
    }

    /// Stamps the correlation id. Assigned by the transport per in-flight
    /// request, never by operation codecs.
    pub fn set_correlation_id(&mut self, correlation_id: i64) -> Result<(), ProtocolError> {
        self.write_header(CORRELATION_ID_FIELD_OFFSET, correlation_id)
    }

    pub fn set_partition_id(&mut self, partition_id: i32) -> Result<(), ProtocolError> {
        self.write_header(PARTITION_ID_FIELD_OFFSET, partition_id)
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn set_retryable(&mut self, retryable: bool) {
        self.retryable = retryable;
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn set_operation_name(&mut self, name: impl Into<String>) {
        self.operation_name = Some(name.into());
    }

    /// Returns whether the initial frame marks a server-pushed event.
    pub fn is_event(&self) -> bool {
        self.frames.first().is_some_and(|f| f.flags.is_event())
    }

    /// Adds flags to the initial frame (e.g. [`FrameFlags::IS_EVENT`]).
    pub fn add_initial_flags(&mut self, bits: u16) -> Result<(), ProtocolError> {
        let frame = self.frames.first_mut().ok_or(ProtocolError::TruncatedMessage {
            expected: "initial frame",
        })?;
        frame.flags = frame.flags.with(bits);
        Ok(())
    }

    /// Sets `UNFRAGMENTED` on the initial frame. Every message carries it on
    /// the wire; receivers tell whole messages from fragment parts by it.
    pub(crate) fn mark_unfragmented(&mut self) {
        if let Some(frame) = self.frames.first_mut() {
            frame.flags = frame.flags.with(FrameFlags::UNFRAGMENTED);
        }
    }

    /// Total number of bytes the frames occupy on the wire.
    pub fn wire_size(&self) -> usize {
        self.frames.iter().map(Frame::wire_size).sum()
    }

    fn read_header<T: FixedSize>(&self, offset: usize) -> Result<T, ProtocolError> {
        fixed::decode(&self.initial_frame()?.content, offset)
    }

    fn write_header<T: FixedSize>(&mut self, offset: usize, value: T) -> Result<(), ProtocolError> {
        let frame = self.frames.first_mut().ok_or(ProtocolError::TruncatedMessage {
            expected: "initial frame",
        })?;
        let mut content = BytesMut::from(&frame.content[..]);
        fixed::encode(&mut content, offset, value)?;
        frame.content = content.freeze();
        Ok(())
    }
}

/// Allocates an initial frame of `size` bytes with the type id written and
/// the partition id set to [`crate::NO_PARTITION`].
pub fn initial_frame_buffer(size: usize, message_type: i32) -> Result<BytesMut, ProtocolError> {
    let mut content = BytesMut::zeroed(size);
    fixed::encode(&mut content, TYPE_FIELD_OFFSET, message_type)?;
    fixed::encode(&mut content, PARTITION_ID_FIELD_OFFSET, crate::NO_PARTITION)?;
    Ok(content)
}

/// Builds an initial frame with the unfragmented flags every fresh message
/// starts with.
pub fn initial_frame(content: BytesMut) -> Frame {
    Frame::with_flags(content.freeze(), FrameFlags::unfragmented())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sample() -> Message {
        let content = initial_frame_buffer(REQUEST_HEADER_SIZE, 0x1A0300).unwrap();
        let mut message = Message::new();
        message.add(initial_frame(content));
        message.add(Frame::new(Bytes::from_static(b"sched1")));
        message
    }

    #[test]
    fn test_header_fields() {
        let mut message = sample();
        assert_eq!(message.message_type().unwrap(), 0x1A0300);
        assert_eq!(message.correlation_id().unwrap(), 0);
        assert_eq!(message.partition_id().unwrap(), crate::NO_PARTITION);

        message.set_correlation_id(77).unwrap();
        message.set_partition_id(3).unwrap();
        assert_eq!(message.correlation_id().unwrap(), 77);
        assert_eq!(message.partition_id().unwrap(), 3);
        assert_eq!(message.message_type().unwrap(), 0x1A0300);
    }

    #[test]
    fn test_header_offsets() {
        assert_eq!(CORRELATION_ID_FIELD_OFFSET, 4);
        assert_eq!(PARTITION_ID_FIELD_OFFSET, 12);
        assert_eq!(REQUEST_HEADER_SIZE, 16);
        assert_eq!(RESPONSE_HEADER_SIZE, 17);
    }

    #[test]
    fn test_empty_message_has_no_header() {
        let mut message = Message::new();
        assert!(matches!(
            message.message_type(),
            Err(ProtocolError::TruncatedMessage { .. })
        ));
        assert!(message.set_correlation_id(1).is_err());
        assert!(!message.is_event());
    }

    #[test]
    fn test_short_initial_frame() {
        let message = Message::from_frames(vec![Frame::new(Bytes::from_static(&[1, 0, 0, 0]))]);
        assert_eq!(message.message_type().unwrap(), 1);
        assert!(matches!(
            message.correlation_id(),
            Err(ProtocolError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_metadata() {
        let mut message = sample();
        assert!(!message.is_retryable());
        assert_eq!(message.operation_name(), None);

        message.set_retryable(true);
        message.set_operation_name("ScheduledExecutor.SubmitToMember");
        assert!(message.is_retryable());
        assert_eq!(
            message.operation_name(),
            Some("ScheduledExecutor.SubmitToMember")
        );

        message.add_initial_flags(FrameFlags::IS_EVENT).unwrap();
        assert!(message.is_event());
        assert!(message.initial_frame().unwrap().flags.is_unfragmented());
    }

    #[test]
    fn test_wire_size() {
        let message = sample();
        assert_eq!(message.frame_count(), 2);
        assert_eq!(message.wire_size(), 6 + 16 + 6 + 6);
    }
}
