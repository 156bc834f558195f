//! Generic operation codec.
//!
//! Every operation is described by a [`FieldLayout`] per direction plus three
//! typed functions: one writing the fixed fields, one appending the
//! variable-length fields, one reading both back. [`MessageCodec`] owns the
//! parts shared by all operations: sizing and stamping the initial frame,
//! checking the mandatory prefix on decode and positioning the cursor.

use crate::cursor::FrameCursor;
use crate::error::ProtocolError;
use crate::fixed::{self, FixedSize};
use crate::layout::{FieldKind, FieldLayout, FixedField};
use crate::message::{self, Message, PARTITION_ID_FIELD_OFFSET, TYPE_FIELD_OFFSET};
use bytes::BytesMut;

const TYPE_FIELD: FixedField =
    FixedField::mandatory("message_type", FieldKind::Int, TYPE_FIELD_OFFSET);
const PARTITION_ID_FIELD: FixedField =
    FixedField::mandatory("partition_id", FieldKind::Int, PARTITION_ID_FIELD_OFFSET);

/// Writes fixed fields into an initial frame being built.
pub struct FixedWriter<'a> {
    content: &'a mut BytesMut,
}

impl FixedWriter<'_> {
    /// Writes `value` at the field's offset.
    pub fn put<T: FixedSize>(&mut self, field: &FixedField, value: T) {
        debug_assert_eq!(field.width(), T::WIDTH, "field {} width mismatch", field.name);
        let end = field.offset + T::WIDTH;
        if self.content.len() < end {
            self.content.resize(end, 0);
        }
        value.write_le(&mut self.content[field.offset..end]);
    }
}

/// Reads fixed fields out of a received initial frame.
#[derive(Debug, Clone, Copy)]
pub struct FixedReader<'a> {
    content: &'a [u8],
}

impl<'a> FixedReader<'a> {
    pub fn new(content: &'a [u8]) -> Self {
        Self { content }
    }

    /// Reads a mandatory field.
    pub fn get<T: FixedSize>(&self, field: &FixedField) -> Result<T, ProtocolError> {
        fixed::decode(self.content, field.offset)
    }

    /// Reads an optional field; `None` when the sender's version predates it.
    pub fn get_optional<T: FixedSize>(&self, field: &FixedField) -> Option<T> {
        fixed::decode_optional(self.content, field.offset)
    }

    pub fn content(&self) -> &'a [u8] {
        self.content
    }
}

/// Encoder/decoder pair for one direction of one operation.
pub struct MessageCodec<P> {
    pub layout: &'static FieldLayout,
    pub write_fixed: fn(&P, &mut FixedWriter<'_>),
    pub write_variable: fn(&P, &mut Message),
    pub read: fn(&FixedReader<'_>, &mut FrameCursor<'_>) -> Result<P, ProtocolError>,
}

impl<P> MessageCodec<P> {
    pub fn message_type(&self) -> i32 {
        self.layout.message_type
    }

    /// Builds the message for `params`. The correlation id is left at zero
    /// for the transport to stamp; the partition id defaults to
    /// [`crate::NO_PARTITION`].
    pub fn encode(&self, params: &P) -> Message {
        let mut content = BytesMut::zeroed(self.layout.initial_frame_size());
        let mut writer = FixedWriter {
            content: &mut content,
        };
        (self.write_fixed)(params, &mut writer);
        // Header last so operation writers cannot clobber it.
        writer.put(&TYPE_FIELD, self.layout.message_type);
        writer.put(&PARTITION_ID_FIELD, crate::NO_PARTITION);

        let mut message = Message::new();
        message.add(message::initial_frame(content));
        (self.write_variable)(params, &mut message);
        message
    }

    /// Decodes `message`, which must carry this codec's message type and an
    /// initial frame at least as long as the layout's mandatory prefix.
    /// Bytes past the fields this version knows are ignored.
    pub fn decode(&self, message: &Message) -> Result<P, ProtocolError> {
        let actual = message.message_type()?;
        if actual != self.layout.message_type {
            return Err(ProtocolError::MessageTypeMismatch {
                expected: self.layout.message_type,
                actual,
            });
        }

        let mut cursor = message.cursor();
        let initial = cursor.next_frame("initial frame")?;
        let required = self.layout.mandatory_size();
        if initial.content.len() < required {
            return Err(ProtocolError::InitialFrameTooShort {
                message_type: actual,
                len: initial.content.len(),
                required,
            });
        }

        (self.read)(&FixedReader::new(&initial.content), &mut cursor)
    }
}

/// Request and response codecs of one operation, registered under the
/// request and response message type ids.
pub struct OperationCodec<Req, Resp> {
    pub name: &'static str,
    pub retryable: bool,
    pub request: MessageCodec<Req>,
    pub response: MessageCodec<Resp>,
}

impl<Req, Resp> OperationCodec<Req, Resp> {
    pub fn request_type(&self) -> i32 {
        self.request.message_type()
    }

    pub fn response_type(&self) -> i32 {
        self.response.message_type()
    }

    pub fn encode_request(&self, params: &Req) -> Message {
        let mut message = self.request.encode(params);
        message.set_retryable(self.retryable);
        message.set_operation_name(self.name);
        message
    }

    pub fn decode_request(&self, message: &Message) -> Result<Req, ProtocolError> {
        self.request.decode(message)
    }

    pub fn encode_response(&self, params: &Resp) -> Message {
        self.response.encode(params)
    }

    pub fn decode_response(&self, message: &Message) -> Result<Resp, ProtocolError> {
        self.response.decode(message)
    }
}

/// Writer for messages without fixed fields.
pub fn no_fixed<P>(_: &P, _: &mut FixedWriter<'_>) {}

/// Writer for messages without variable-length fields.
pub fn no_variable<P>(_: &P, _: &mut Message) {}

/// Reader for messages that carry nothing past the header.
pub fn read_nothing(_: &FixedReader<'_>, _: &mut FrameCursor<'_>) -> Result<(), ProtocolError> {
    Ok(())
}
