//! Client-level operations: keep-alive and the error response.

use crate::builtin::FrameCodec;
use crate::custom::ErrorHolder;
use crate::cursor::FrameCursor;
use crate::error::ProtocolError;
use crate::layout::{FieldKind, FieldLayout, Role, VarField};
use crate::message::Message;
use crate::operation::{
    no_fixed, no_variable, read_nothing, FixedReader, MessageCodec, OperationCodec,
};

pub const PING_REQUEST_TYPE: i32 = 0x000B00;
pub const PING_RESPONSE_TYPE: i32 = 0x000B01;

/// Message type of the error response. Sent in place of an operation's
/// regular response when the operation failed on the cluster.
pub const ERRORS_RESPONSE_TYPE: i32 = 0x000000;

const PING_REQUEST_LAYOUT: FieldLayout = FieldLayout {
    message_type: PING_REQUEST_TYPE,
    role: Role::Request,
    fixed: &[],
    variable: &[],
};

const PING_RESPONSE_LAYOUT: FieldLayout = FieldLayout {
    message_type: PING_RESPONSE_TYPE,
    role: Role::Response,
    fixed: &[],
    variable: &[],
};

pub static PING: OperationCodec<(), ()> = OperationCodec {
    name: "Client.Ping",
    retryable: true,
    request: MessageCodec {
        layout: &PING_REQUEST_LAYOUT,
        write_fixed: no_fixed,
        write_variable: no_variable,
        read: read_nothing,
    },
    response: MessageCodec {
        layout: &PING_RESPONSE_LAYOUT,
        write_fixed: no_fixed,
        write_variable: no_variable,
        read: read_nothing,
    },
};

/// Error response: the failure and its causes, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorsResponse {
    pub errors: Vec<ErrorHolder>,
}

const ERRORS_LAYOUT: FieldLayout = FieldLayout {
    message_type: ERRORS_RESPONSE_TYPE,
    role: Role::Response,
    fixed: &[],
    variable: &[VarField::new("errors", FieldKind::List)],
};

fn write_errors(params: &ErrorsResponse, message: &mut Message) {
    params.errors.encode(message);
}

fn read_errors(
    _: &FixedReader<'_>,
    cursor: &mut FrameCursor<'_>,
) -> Result<ErrorsResponse, ProtocolError> {
    Ok(ErrorsResponse {
        errors: Vec::decode(cursor)?,
    })
}

pub static ERRORS: MessageCodec<ErrorsResponse> = MessageCodec {
    layout: &ERRORS_LAYOUT,
    write_fixed: no_fixed,
    write_variable: write_errors,
    read: read_errors,
};
