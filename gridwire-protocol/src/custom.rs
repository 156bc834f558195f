//! Nested record types and their codecs.
//!
//! A record is bracketed by begin/end frames. Inside, an initial frame holds
//! its fixed-size members followed by one frame group per variable-length
//! member. Decoders skip anything left before the end frame, which is where a
//! newer peer appends members this version does not know.

use crate::builtin::FrameCodec;
use crate::cursor::FrameCursor;
use crate::error::{ErrorCode, ProtocolError};
use crate::fixed::{self, INT_SIZE, UUID_SIZE};
use crate::frame::Frame;
use crate::message::Message;
use bytes::BytesMut;
use uuid::Uuid;

fn encode_record_header(message: &mut Message, fixed_part: BytesMut) {
    message.add(Frame::begin());
    message.add(Frame::new(fixed_part.freeze()));
}

// Fixed members are appended in offset order on encode.

/// Handle identifying a scheduled task on the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskHandler {
    pub uuid: Uuid,
    pub partition_id: i32,
    pub scheduler_name: String,
    pub task_name: String,
}

const HANDLER_UUID_OFFSET: usize = 0;
const HANDLER_PARTITION_ID_OFFSET: usize = HANDLER_UUID_OFFSET + UUID_SIZE;
const HANDLER_INITIAL_FRAME_SIZE: usize = HANDLER_PARTITION_ID_OFFSET + INT_SIZE;

impl FrameCodec for ScheduledTaskHandler {
    fn encode(&self, message: &mut Message) {
        let mut content = BytesMut::with_capacity(HANDLER_INITIAL_FRAME_SIZE);
        fixed::put(&mut content, self.uuid);
        fixed::put(&mut content, self.partition_id);
        encode_record_header(message, content);

        self.scheduler_name.encode(message);
        self.task_name.encode(message);
        message.add(Frame::end());
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        cursor.expect_begin("scheduled task handler")?;
        let initial = cursor.next_frame("scheduled task handler fields")?;
        let uuid = fixed::decode(&initial.content, HANDLER_UUID_OFFSET)?;
        let partition_id = fixed::decode(&initial.content, HANDLER_PARTITION_ID_OFFSET)?;

        let scheduler_name = String::decode(cursor)?;
        let task_name = String::decode(cursor)?;
        cursor.fast_forward_to_end_frame()?;

        Ok(Self {
            uuid,
            partition_id,
            scheduler_name,
            task_name,
        })
    }
}

/// One element of a remote stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTraceElement {
    pub class_name: String,
    pub method_name: String,
    pub file_name: Option<String>,
    pub line_number: i32,
}

const STACK_LINE_NUMBER_OFFSET: usize = 0;
const STACK_INITIAL_FRAME_SIZE: usize = STACK_LINE_NUMBER_OFFSET + INT_SIZE;

impl FrameCodec for StackTraceElement {
    fn encode(&self, message: &mut Message) {
        let mut content = BytesMut::with_capacity(STACK_INITIAL_FRAME_SIZE);
        fixed::put(&mut content, self.line_number);
        encode_record_header(message, content);

        self.class_name.encode(message);
        self.method_name.encode(message);
        self.file_name.encode(message);
        message.add(Frame::end());
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        cursor.expect_begin("stack trace element")?;
        let initial = cursor.next_frame("stack trace element fields")?;
        let line_number = fixed::decode(&initial.content, STACK_LINE_NUMBER_OFFSET)?;

        let class_name = String::decode(cursor)?;
        let method_name = String::decode(cursor)?;
        let file_name = Option::<String>::decode(cursor)?;
        cursor.fast_forward_to_end_frame()?;

        Ok(Self {
            class_name,
            method_name,
            file_name,
            line_number,
        })
    }
}

/// A server-side failure as carried by an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHolder {
    pub error_code: i32,
    pub class_name: String,
    pub message: Option<String>,
    pub stack_trace: Vec<StackTraceElement>,
}

impl ErrorHolder {
    pub fn new(code: ErrorCode, class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            error_code: code.code(),
            class_name: class_name.into(),
            message,
            stack_trace: Vec::new(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_code(self.error_code)
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

const ERROR_CODE_OFFSET: usize = 0;
const ERROR_INITIAL_FRAME_SIZE: usize = ERROR_CODE_OFFSET + INT_SIZE;

impl FrameCodec for ErrorHolder {
    fn encode(&self, message: &mut Message) {
        let mut content = BytesMut::with_capacity(ERROR_INITIAL_FRAME_SIZE);
        fixed::put(&mut content, self.error_code);
        encode_record_header(message, content);

        self.class_name.encode(message);
        self.message.encode(message);
        self.stack_trace.encode(message);
        message.add(Frame::end());
    }

    fn decode(cursor: &mut FrameCursor<'_>) -> Result<Self, ProtocolError> {
        cursor.expect_begin("error holder")?;
        let initial = cursor.next_frame("error holder fields")?;
        let error_code = fixed::decode(&initial.content, ERROR_CODE_OFFSET)?;

        let class_name = String::decode(cursor)?;
        let message = Option::<String>::decode(cursor)?;
        let stack_trace = Vec::<StackTraceElement>::decode(cursor)?;
        cursor.fast_forward_to_end_frame()?;

        Ok(Self {
            error_code,
            class_name,
            message,
            stack_trace,
        })
    }
}
