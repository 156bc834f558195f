//! Variable-length codecs.
//!
//! Variable-length values travel as frames appended after the initial frame:
//!
//! - strings and [`Data`] blobs: exactly one frame holding the raw bytes;
//! - `Option<T>`: a single empty `IS_NULL` frame for `None`, so the field
//!   keeps its position in the frame sequence;
//! - lists and nested records: a begin frame, the members, an end frame.

use crate::cursor::FrameCursor;
use crate::error::ProtocolError;
use crate::fixed::{self, FixedSize};
use crate::frame::Frame;
use crate::message::Message;
use bytes::{Bytes, BytesMut};

/// A value carried as one or more frames.
pub trait FrameCodec: Sized {
    /// Appends the frames for `self` to `message`.
    fn encode(&self, message: &mut Message);

    /// Consumes exactly the frames [`FrameCodec::encode`] produced.
    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError>;
}

/// Opaque serialized user payload. The protocol never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Data(Bytes);

impl Data {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

/// Appends `value` as a single string frame.
pub fn encode_str(message: &mut Message, value: &str) {
    message.add(Frame::new(Bytes::copy_from_slice(value.as_bytes())));
}

/// Consumes the next frame as a value frame; null and data-structure
/// markers are rejected.
fn value_frame<'a>(
    cursor: &mut FrameCursor<'a>,
    expected: &'static str,
) -> Result<&'a Frame, ProtocolError> {
    let frame = cursor.next_frame(expected)?;
    if frame.is_null_frame() || frame.is_begin_frame() || frame.is_end_frame() {
        return Err(ProtocolError::UnexpectedFrame {
            expected,
            flags: frame.flags.bits(),
        });
    }
    Ok(frame)
}

impl FrameCodec for String {
    fn encode(&self, message: &mut Message) {
        encode_str(message, self);
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        let frame = value_frame(cursor, "string")?;
        let text = std::str::from_utf8(&frame.content).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(text.to_owned())
    }
}

impl FrameCodec for Data {
    fn encode(&self, message: &mut Message) {
        message.add(Frame::new(self.0.clone()));
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        let frame = value_frame(cursor, "data")?;
        Ok(Self(frame.content.clone()))
    }
}

impl<T: FrameCodec> FrameCodec for Option<T> {
    fn encode(&self, message: &mut Message) {
        match self {
            Some(value) => value.encode(message),
            None => message.add(Frame::null()),
        }
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        if cursor.skip_null() {
            Ok(None)
        } else {
            T::decode(cursor).map(Some)
        }
    }
}

impl<T: FrameCodec> FrameCodec for Vec<T> {
    fn encode(&self, message: &mut Message) {
        message.add(Frame::begin());
        for item in self {
            item.encode(message);
        }
        message.add(Frame::end());
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        cursor.expect_begin("list")?;
        let mut items = Vec::new();
        while !cursor.next_is_end() {
            if !cursor.has_next() {
                return Err(ProtocolError::TruncatedMessage {
                    expected: "end of list",
                });
            }
            items.push(T::decode(cursor)?);
        }
        cursor.next_frame("end of list")?;
        Ok(items)
    }
}

/// Encodes a list of fixed-size scalars as a single frame of `n * WIDTH`
/// bytes.
pub fn encode_fixed_list<T: FixedSize>(message: &mut Message, items: &[T]) {
    let mut content = BytesMut::zeroed(items.len() * T::WIDTH);
    for (chunk, item) in content.chunks_exact_mut(T::WIDTH).zip(items) {
        item.write_le(chunk);
    }
    message.add(Frame::new(content.freeze()));
}

/// Decodes a list written by [`encode_fixed_list`].
pub fn decode_fixed_list<T: FixedSize>(
    cursor: &mut FrameCursor<'_>,
) -> Result<Vec<T>, ProtocolError> {
    let frame = cursor.next_frame("fixed-size list")?;
    let content = &frame.content;
    if content.len() % T::WIDTH != 0 {
        return Err(ProtocolError::BufferTooShort {
            offset: content.len() - content.len() % T::WIDTH,
            width: T::WIDTH,
            len: content.len(),
        });
    }
    (0..content.len() / T::WIDTH)
        .map(|i| fixed::decode(content, i * T::WIDTH))
        .collect()
}
