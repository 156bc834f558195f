//! Operation definitions.
//!
//! Each operation is a `pub static` [`OperationCodec`](crate::OperationCodec)
//! built from `const` field layouts, so the tables are available at compile
//! time to both the codecs and the registry.

pub mod client;
pub mod scheduled_executor;

pub use client::{ErrorsResponse, ERRORS, PING};
pub use scheduled_executor::{
    GetAllScheduledFuturesRequest, GetAllScheduledFuturesResponse, SubmitToMemberRequest,
    SubmitToPartitionRequest, GET_ALL_SCHEDULED_FUTURES, SUBMIT_TO_MEMBER, SUBMIT_TO_PARTITION,
};
