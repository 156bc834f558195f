//! Protocol error types and error codes.

use std::fmt;
use thiserror::Error;

/// Protocol-level errors raised while framing, encoding, decoding or
/// reassembling messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A fixed-size field does not fit in the buffer. Local to field access;
    /// optional fields turn it into an "absent" marker instead of surfacing it.
    #[error("buffer too short: {width} bytes at offset {offset}, buffer is {len} bytes")]
    BufferTooShort {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("truncated message: no frame left for {expected}")]
    TruncatedMessage { expected: &'static str },

    #[error("unknown message type: {0:#08x}")]
    UnknownMessageType(i32),

    #[error("fragmentation protocol violation for id {id}: {reason}")]
    FragmentationProtocolViolation { id: u64, reason: &'static str },

    #[error("reassembled message {id} too large: {size} bytes (max {max})")]
    MessageTooLarge { id: u64, size: usize, max: usize },

    #[error("too many in-flight assemblies: limit is {max}")]
    TooManyAssemblies { max: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("invalid frame flags: {0:#x}")]
    InvalidFlags(u16),

    #[error("invalid UTF-8 in string frame")]
    InvalidUtf8,

    #[error("initial frame of message type {message_type:#08x} is {len} bytes, mandatory prefix is {required}")]
    InitialFrameTooShort {
        message_type: i32,
        len: usize,
        required: usize,
    },

    #[error("message type mismatch: expected {expected:#08x}, got {actual:#08x}")]
    MessageTypeMismatch { expected: i32, actual: i32 },

    #[error("unexpected frame: expected {expected}, got flags {flags:#06x}")]
    UnexpectedFrame { expected: &'static str, flags: u16 },

    #[error("message type {0:#08x} is already registered")]
    DuplicateMessageType(i32),

    #[error("invalid layout for message type {message_type:#08x}: {reason}")]
    InvalidLayout {
        message_type: i32,
        reason: &'static str,
    },

    #[error("invalid fragment partition: {0}")]
    InvalidPartition(&'static str),
}

/// Stable error codes carried by error responses.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Undefined = 1,
    IllegalArgument = 2,
    Authentication = 3,
    Serialization = 4,
    UnknownMessageType = 5,
    ProtocolViolation = 6,
    TargetNotMember = 7,
    InstanceNotActive = 8,
    Overload = 9,
    OperationTimeout = 10,
    RetryableIo = 11,
    PartitionMigrating = 12,
    DistributedObjectDestroyed = 13,
    RejectedExecution = 14,
    StaleTaskId = 15,
    DuplicateTask = 16,
}

impl ErrorCode {
    /// Returns the numeric code written to the wire.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Maps a wire code back to a known error code. Unknown codes from newer
    /// peers collapse to [`ErrorCode::Undefined`].
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => ErrorCode::IllegalArgument,
            3 => ErrorCode::Authentication,
            4 => ErrorCode::Serialization,
            5 => ErrorCode::UnknownMessageType,
            6 => ErrorCode::ProtocolViolation,
            7 => ErrorCode::TargetNotMember,
            8 => ErrorCode::InstanceNotActive,
            9 => ErrorCode::Overload,
            10 => ErrorCode::OperationTimeout,
            11 => ErrorCode::RetryableIo,
            12 => ErrorCode::PartitionMigrating,
            13 => ErrorCode::DistributedObjectDestroyed,
            14 => ErrorCode::RejectedExecution,
            15 => ErrorCode::StaleTaskId,
            16 => ErrorCode::DuplicateTask,
            _ => ErrorCode::Undefined,
        }
    }

    /// Returns whether an invocation failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::TargetNotMember
                | ErrorCode::Overload
                | ErrorCode::RetryableIo
                | ErrorCode::PartitionMigrating
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Undefined => write!(f, "UNDEFINED"),
            ErrorCode::IllegalArgument => write!(f, "ILLEGAL_ARGUMENT"),
            ErrorCode::Authentication => write!(f, "AUTHENTICATION"),
            ErrorCode::Serialization => write!(f, "SERIALIZATION"),
            ErrorCode::UnknownMessageType => write!(f, "UNKNOWN_MESSAGE_TYPE"),
            ErrorCode::ProtocolViolation => write!(f, "PROTOCOL_VIOLATION"),
            ErrorCode::TargetNotMember => write!(f, "TARGET_NOT_MEMBER"),
            ErrorCode::InstanceNotActive => write!(f, "INSTANCE_NOT_ACTIVE"),
            ErrorCode::Overload => write!(f, "OVERLOAD"),
            ErrorCode::OperationTimeout => write!(f, "OPERATION_TIMEOUT"),
            ErrorCode::RetryableIo => write!(f, "RETRYABLE_IO"),
            ErrorCode::PartitionMigrating => write!(f, "PARTITION_MIGRATING"),
            ErrorCode::DistributedObjectDestroyed => write!(f, "DISTRIBUTED_OBJECT_DESTROYED"),
            ErrorCode::RejectedExecution => write!(f, "REJECTED_EXECUTION"),
            ErrorCode::StaleTaskId => write!(f, "STALE_TASK_ID"),
            ErrorCode::DuplicateTask => write!(f, "DUPLICATE_TASK"),
        }
    }
}

impl From<&ProtocolError> for ErrorCode {
    fn from(err: &ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownMessageType(_) => ErrorCode::UnknownMessageType,
            ProtocolError::InvalidUtf8 => ErrorCode::Serialization,
            ProtocolError::DuplicateMessageType(_)
            | ProtocolError::InvalidLayout { .. }
            | ProtocolError::InvalidPartition(_) => ErrorCode::IllegalArgument,
            _ => ErrorCode::ProtocolViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_retryable() {
        assert!(ErrorCode::TargetNotMember.is_retryable());
        assert!(ErrorCode::Overload.is_retryable());
        assert!(ErrorCode::RetryableIo.is_retryable());
        assert!(ErrorCode::PartitionMigrating.is_retryable());

        assert!(!ErrorCode::Undefined.is_retryable());
        assert!(!ErrorCode::IllegalArgument.is_retryable());
        assert!(!ErrorCode::ProtocolViolation.is_retryable());
        assert!(!ErrorCode::StaleTaskId.is_retryable());
    }

    #[test]
    fn test_error_code_wire_roundtrip() {
        for code in 1..=16 {
            assert_eq!(ErrorCode::from_code(code).code(), code);
        }
        assert_eq!(ErrorCode::from_code(0), ErrorCode::Undefined);
        assert_eq!(ErrorCode::from_code(9999), ErrorCode::Undefined);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::Undefined), "UNDEFINED");
        assert_eq!(
            format!("{}", ErrorCode::TargetNotMember),
            "TARGET_NOT_MEMBER"
        );
        assert_eq!(
            format!("{}", ErrorCode::DistributedObjectDestroyed),
            "DISTRIBUTED_OBJECT_DESTROYED"
        );
    }

    #[test]
    fn test_error_code_from_protocol_error() {
        let err = ProtocolError::UnknownMessageType(0x1A0300);
        assert_eq!(ErrorCode::from(&err), ErrorCode::UnknownMessageType);

        let err = ProtocolError::TruncatedMessage { expected: "string" };
        assert_eq!(ErrorCode::from(&err), ErrorCode::ProtocolViolation);

        assert_eq!(
            ErrorCode::from(&ProtocolError::InvalidUtf8),
            ErrorCode::Serialization
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::BufferTooShort {
            offset: 49,
            width: 1,
            len: 49,
        };
        assert!(err.to_string().contains("49"));

        let err = ProtocolError::UnknownMessageType(0x1A0300);
        assert!(err.to_string().contains("1a0300"));

        let err = ProtocolError::FragmentationProtocolViolation {
            id: 7,
            reason: "end fragment for unknown id",
        };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("unknown id"));

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::InvalidFlags(0x3F);
        assert!(err.to_string().contains("3f"));

        let err = ProtocolError::TruncatedMessage { expected: "task" };
        assert!(err.to_string().contains("task"));
    }
}
