//! # gridwire-protocol
//!
//! Client-cluster wire protocol for gridwire.
//!
//! This crate provides:
//! - Flagged binary frames with a content-length prefix
//! - Fixed-size and variable-length field codecs
//! - Messages as ordered frame chains, decoded with a forward-only cursor
//! - Per-operation field layouts and the generic operation codec
//! - Fragmentation and per-connection reassembly
//! - The message-type registry used for dispatch

pub mod builtin;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod custom;
pub mod error;
pub mod fixed;
pub mod fragment;
pub mod frame;
pub mod layout;
pub mod message;
pub mod operation;
pub mod ops;
pub mod registry;

pub use builtin::{Data, FrameCodec};
pub use codec::{Decoder, Encoder, MessageReader, MessageWriter};
pub use config::{Config, ConfigError, FragmentationConfig, WireConfig};
pub use cursor::FrameCursor;
pub use error::{ErrorCode, ProtocolError};
pub use fragment::{Fragment, FragmentPosition, FragmentationId, Fragmenter, Reassembler};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE};
pub use layout::{FieldKind, FieldLayout, FixedField, Role, VarField};
pub use message::Message;
pub use operation::{FixedReader, FixedWriter, MessageCodec, OperationCodec};
pub use registry::{Decoded, Params, Registry, RegistryEntry};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default maximum content length accepted for a single frame (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Partition id stamped on requests that are not bound to a partition.
pub const NO_PARTITION: i32 = -1;
