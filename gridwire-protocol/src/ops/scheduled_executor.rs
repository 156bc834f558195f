//! Scheduled executor operations.
//!
//! Both submit variants share their fixed tail and variable fields; the
//! member variant prefixes the target member's uuid. `auto_disposable` was
//! added after the first release, so it is optional on the wire and decoders
//! report whether the sender wrote it.

use crate::builtin::{self, Data, FrameCodec};
use crate::custom::ScheduledTaskHandler;
use crate::cursor::FrameCursor;
use crate::error::ProtocolError;
use crate::layout::{FieldKind, FieldLayout, FixedField, Role, VarField};
use crate::message::{Message, REQUEST_HEADER_SIZE};
use crate::operation::{
    no_fixed, no_variable, read_nothing, FixedReader, FixedWriter, MessageCodec, OperationCodec,
};
use uuid::Uuid;

pub const SUBMIT_TO_PARTITION_REQUEST_TYPE: i32 = 0x1A0200;
pub const SUBMIT_TO_PARTITION_RESPONSE_TYPE: i32 = 0x1A0201;
pub const SUBMIT_TO_MEMBER_REQUEST_TYPE: i32 = 0x1A0300;
pub const SUBMIT_TO_MEMBER_RESPONSE_TYPE: i32 = 0x1A0301;
pub const GET_ALL_SCHEDULED_FUTURES_REQUEST_TYPE: i32 = 0x1A0400;
pub const GET_ALL_SCHEDULED_FUTURES_RESPONSE_TYPE: i32 = 0x1A0401;

const TASK_FIELDS: &[VarField] = &[
    VarField::new("scheduler_name", FieldKind::String),
    VarField::new("task_name", FieldKind::String),
    VarField::new("task", FieldKind::Data),
];

// ---------------------------------------------------------------------------
// SubmitToPartition
// ---------------------------------------------------------------------------

/// Schedules a task on the partition owning the task name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitToPartitionRequest {
    pub scheduler_name: String,
    pub task_type: u8,
    pub task_name: String,
    pub task: Data,
    pub initial_delay_in_millis: i64,
    pub period_in_millis: i64,
    pub auto_disposable: bool,
    /// `false` when the sender predates `auto_disposable`; the field then
    /// holds `false`.
    pub is_auto_disposable_exists: bool,
}

const PARTITION_TYPE: FixedField =
    FixedField::mandatory("type", FieldKind::Byte, REQUEST_HEADER_SIZE);
const PARTITION_INITIAL_DELAY: FixedField =
    FixedField::mandatory("initial_delay_in_millis", FieldKind::Long, PARTITION_TYPE.end());
const PARTITION_PERIOD: FixedField = FixedField::mandatory(
    "period_in_millis",
    FieldKind::Long,
    PARTITION_INITIAL_DELAY.end(),
);
const PARTITION_AUTO_DISPOSABLE: FixedField =
    FixedField::optional("auto_disposable", FieldKind::Boolean, PARTITION_PERIOD.end());

const SUBMIT_TO_PARTITION_REQUEST_LAYOUT: FieldLayout = FieldLayout {
    message_type: SUBMIT_TO_PARTITION_REQUEST_TYPE,
    role: Role::Request,
    fixed: &[
        PARTITION_TYPE,
        PARTITION_INITIAL_DELAY,
        PARTITION_PERIOD,
        PARTITION_AUTO_DISPOSABLE,
    ],
    variable: TASK_FIELDS,
};

const SUBMIT_TO_PARTITION_RESPONSE_LAYOUT: FieldLayout = FieldLayout {
    message_type: SUBMIT_TO_PARTITION_RESPONSE_TYPE,
    role: Role::Response,
    fixed: &[],
    variable: &[],
};

fn write_task(scheduler_name: &str, task_name: &str, task: &Data, message: &mut Message) {
    builtin::encode_str(message, scheduler_name);
    builtin::encode_str(message, task_name);
    task.encode(message);
}

fn read_task(cursor: &mut FrameCursor<'_>) -> Result<(String, String, Data), ProtocolError> {
    let scheduler_name = String::decode(cursor)?;
    let task_name = String::decode(cursor)?;
    let task = Data::decode(cursor)?;
    Ok((scheduler_name, task_name, task))
}

fn write_partition_fixed(p: &SubmitToPartitionRequest, w: &mut FixedWriter<'_>) {
    w.put(&PARTITION_TYPE, p.task_type);
    w.put(&PARTITION_INITIAL_DELAY, p.initial_delay_in_millis);
    w.put(&PARTITION_PERIOD, p.period_in_millis);
    w.put(&PARTITION_AUTO_DISPOSABLE, p.auto_disposable);
}

fn write_partition_variable(p: &SubmitToPartitionRequest, message: &mut Message) {
    write_task(&p.scheduler_name, &p.task_name, &p.task, message);
}

fn read_partition(
    r: &FixedReader<'_>,
    cursor: &mut FrameCursor<'_>,
) -> Result<SubmitToPartitionRequest, ProtocolError> {
    let task_type = r.get(&PARTITION_TYPE)?;
    let initial_delay_in_millis = r.get(&PARTITION_INITIAL_DELAY)?;
    let period_in_millis = r.get(&PARTITION_PERIOD)?;
    let auto_disposable = r.get_optional::<bool>(&PARTITION_AUTO_DISPOSABLE);
    let (scheduler_name, task_name, task) = read_task(cursor)?;

    Ok(SubmitToPartitionRequest {
        scheduler_name,
        task_type,
        task_name,
        task,
        initial_delay_in_millis,
        period_in_millis,
        auto_disposable: auto_disposable.unwrap_or(false),
        is_auto_disposable_exists: auto_disposable.is_some(),
    })
}

pub static SUBMIT_TO_PARTITION: OperationCodec<SubmitToPartitionRequest, ()> = OperationCodec {
    name: "ScheduledExecutor.SubmitToPartition",
    retryable: true,
    request: MessageCodec {
        layout: &SUBMIT_TO_PARTITION_REQUEST_LAYOUT,
        write_fixed: write_partition_fixed,
        write_variable: write_partition_variable,
        read: read_partition,
    },
    response: MessageCodec {
        layout: &SUBMIT_TO_PARTITION_RESPONSE_LAYOUT,
        write_fixed: no_fixed,
        write_variable: no_variable,
        read: read_nothing,
    },
};

// ---------------------------------------------------------------------------
// SubmitToMember
// ---------------------------------------------------------------------------

/// Schedules a task on a specific member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitToMemberRequest {
    pub scheduler_name: String,
    pub member_uuid: Uuid,
    pub task_type: u8,
    pub task_name: String,
    pub task: Data,
    pub initial_delay_in_millis: i64,
    pub period_in_millis: i64,
    pub auto_disposable: bool,
    pub is_auto_disposable_exists: bool,
}

const MEMBER_UUID: FixedField =
    FixedField::mandatory("member_uuid", FieldKind::Uuid, REQUEST_HEADER_SIZE);
const MEMBER_TYPE: FixedField = FixedField::mandatory("type", FieldKind::Byte, MEMBER_UUID.end());
const MEMBER_INITIAL_DELAY: FixedField =
    FixedField::mandatory("initial_delay_in_millis", FieldKind::Long, MEMBER_TYPE.end());
const MEMBER_PERIOD: FixedField =
    FixedField::mandatory("period_in_millis", FieldKind::Long, MEMBER_INITIAL_DELAY.end());
const MEMBER_AUTO_DISPOSABLE: FixedField =
    FixedField::optional("auto_disposable", FieldKind::Boolean, MEMBER_PERIOD.end());

const SUBMIT_TO_MEMBER_REQUEST_LAYOUT: FieldLayout = FieldLayout {
    message_type: SUBMIT_TO_MEMBER_REQUEST_TYPE,
    role: Role::Request,
    fixed: &[
        MEMBER_UUID,
        MEMBER_TYPE,
        MEMBER_INITIAL_DELAY,
        MEMBER_PERIOD,
        MEMBER_AUTO_DISPOSABLE,
    ],
    variable: TASK_FIELDS,
};

const SUBMIT_TO_MEMBER_RESPONSE_LAYOUT: FieldLayout = FieldLayout {
    message_type: SUBMIT_TO_MEMBER_RESPONSE_TYPE,
    role: Role::Response,
    fixed: &[],
    variable: &[],
};

fn write_member_fixed(p: &SubmitToMemberRequest, w: &mut FixedWriter<'_>) {
    w.put(&MEMBER_UUID, p.member_uuid);
    w.put(&MEMBER_TYPE, p.task_type);
    w.put(&MEMBER_INITIAL_DELAY, p.initial_delay_in_millis);
    w.put(&MEMBER_PERIOD, p.period_in_millis);
    w.put(&MEMBER_AUTO_DISPOSABLE, p.auto_disposable);
}

fn write_member_variable(p: &SubmitToMemberRequest, message: &mut Message) {
    write_task(&p.scheduler_name, &p.task_name, &p.task, message);
}

fn read_member(
    r: &FixedReader<'_>,
    cursor: &mut FrameCursor<'_>,
) -> Result<SubmitToMemberRequest, ProtocolError> {
    let member_uuid = r.get(&MEMBER_UUID)?;
    let task_type = r.get(&MEMBER_TYPE)?;
    let initial_delay_in_millis = r.get(&MEMBER_INITIAL_DELAY)?;
    let period_in_millis = r.get(&MEMBER_PERIOD)?;
    let auto_disposable = r.get_optional::<bool>(&MEMBER_AUTO_DISPOSABLE);
    let (scheduler_name, task_name, task) = read_task(cursor)?;

    Ok(SubmitToMemberRequest {
        scheduler_name,
        member_uuid,
        task_type,
        task_name,
        task,
        initial_delay_in_millis,
        period_in_millis,
        auto_disposable: auto_disposable.unwrap_or(false),
        is_auto_disposable_exists: auto_disposable.is_some(),
    })
}

pub static SUBMIT_TO_MEMBER: OperationCodec<SubmitToMemberRequest, ()> = OperationCodec {
    name: "ScheduledExecutor.SubmitToMember",
    retryable: true,
    request: MessageCodec {
        layout: &SUBMIT_TO_MEMBER_REQUEST_LAYOUT,
        write_fixed: write_member_fixed,
        write_variable: write_member_variable,
        read: read_member,
    },
    response: MessageCodec {
        layout: &SUBMIT_TO_MEMBER_RESPONSE_LAYOUT,
        write_fixed: no_fixed,
        write_variable: no_variable,
        read: read_nothing,
    },
};

// ---------------------------------------------------------------------------
// GetAllScheduledFutures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAllScheduledFuturesRequest {
    pub scheduler_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetAllScheduledFuturesResponse {
    pub handlers: Vec<ScheduledTaskHandler>,
}

const GET_ALL_REQUEST_LAYOUT: FieldLayout = FieldLayout {
    message_type: GET_ALL_SCHEDULED_FUTURES_REQUEST_TYPE,
    role: Role::Request,
    fixed: &[],
    variable: &[VarField::new("scheduler_name", FieldKind::String)],
};

const GET_ALL_RESPONSE_LAYOUT: FieldLayout = FieldLayout {
    message_type: GET_ALL_SCHEDULED_FUTURES_RESPONSE_TYPE,
    role: Role::Response,
    fixed: &[],
    variable: &[VarField::new("handlers", FieldKind::List)],
};

fn write_get_all_request(p: &GetAllScheduledFuturesRequest, message: &mut Message) {
    p.scheduler_name.encode(message);
}

fn read_get_all_request(
    _: &FixedReader<'_>,
    cursor: &mut FrameCursor<'_>,
) -> Result<GetAllScheduledFuturesRequest, ProtocolError> {
    Ok(GetAllScheduledFuturesRequest {
        scheduler_name: String::decode(cursor)?,
    })
}

fn write_get_all_response(p: &GetAllScheduledFuturesResponse, message: &mut Message) {
    p.handlers.encode(message);
}

fn read_get_all_response(
    _: &FixedReader<'_>,
    cursor: &mut FrameCursor<'_>,
) -> Result<GetAllScheduledFuturesResponse, ProtocolError> {
    Ok(GetAllScheduledFuturesResponse {
        handlers: Vec::decode(cursor)?,
    })
}

pub static GET_ALL_SCHEDULED_FUTURES: OperationCodec<
    GetAllScheduledFuturesRequest,
    GetAllScheduledFuturesResponse,
> = OperationCodec {
    name: "ScheduledExecutor.GetAllScheduledFutures",
    retryable: true,
    request: MessageCodec {
        layout: &GET_ALL_REQUEST_LAYOUT,
        write_fixed: no_fixed,
        write_variable: write_get_all_request,
        read: read_get_all_request,
    },
    response: MessageCodec {
        layout: &GET_ALL_RESPONSE_LAYOUT,
        write_fixed: no_fixed,
        write_variable: write_get_all_response,
        read: read_get_all_response,
    },
};
