//! End-to-end wire scenarios: typed request, encoder, byte stream, decoder,
//! reassembler, registry.

use bytes::{Bytes, BytesMut};
use gridwire_protocol::ops::{SubmitToMemberRequest, SUBMIT_TO_MEMBER};
use gridwire_protocol::{
    builtin, Config, Data, FieldKind, FieldLayout, FixedField, FixedReader, FixedWriter,
    FrameCodec, FrameCursor, Fragmenter, Message, MessageCodec, MessageReader, MessageWriter,
    ProtocolError, Registry, Role, VarField,
};
use uuid::Uuid;

fn sched1() -> SubmitToMemberRequest {
    SubmitToMemberRequest {
        scheduler_name: "sched1".to_string(),
        member_uuid: Uuid::from_u64_pair(0, 42),
        task_type: 1,
        task_name: "task1".to_string(),
        task: Data::from(vec![0x01, 0x02]),
        initial_delay_in_millis: 1000,
        period_in_millis: 5000,
        auto_disposable: true,
        is_auto_disposable_exists: true,
    }
}

fn transmit(writer: &MessageWriter, messages: Vec<Message>) -> Vec<Message> {
    let mut wire = BytesMut::new();
    for message in messages {
        writer.write(message, &mut wire).unwrap();
    }

    let mut reader = MessageReader::from_config(&Config::default());
    // deliver in uneven chunks, as a socket would
    for chunk in wire.chunks(7) {
        reader.extend(chunk);
    }
    let mut received = Vec::new();
    while let Some(message) = reader.next_message().unwrap() {
        received.push(message);
    }
    assert_eq!(reader.pending_assemblies(), 0);
    received
}

#[test]
fn submit_to_member_survives_the_wire() {
    let registry = Registry::with_builtin();
    let mut message = SUBMIT_TO_MEMBER.encode_request(&sched1());
    message.set_correlation_id(99).unwrap();

    for fragment_size in [64 * 1024, 64, 24] {
        let writer = MessageWriter::new(Fragmenter::new(fragment_size));
        let received = transmit(&writer, vec![message.clone()]);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].frames(), message.frames());

        let decoded = registry.decode(&received[0]).unwrap();
        assert_eq!(decoded.operation, "ScheduledExecutor.SubmitToMember");
        assert_eq!(decoded.role, Role::Request);
        assert_eq!(decoded.correlation_id, 99);
        assert_eq!(
            decoded.downcast_ref::<SubmitToMemberRequest>(),
            Some(&sched1())
        );
    }
}

#[test]
fn interleaved_messages_keep_their_order() {
    let writer = MessageWriter::new(Fragmenter::new(40));
    let messages: Vec<Message> = (0..5)
        .map(|i| {
            let mut request = sched1();
            request.task_name = format!("task{}", i);
            let mut message = SUBMIT_TO_MEMBER.encode_request(&request);
            message.set_correlation_id(i).unwrap();
            message
        })
        .collect();

    let received = transmit(&writer, messages.clone());
    assert_eq!(received.len(), messages.len());
    for (sent, got) in messages.iter().zip(&received) {
        assert_eq!(sent.frames(), got.frames());
    }
}

#[test]
fn truncated_auto_disposable_reads_as_absent() {
    let message = SUBMIT_TO_MEMBER.encode_request(&sched1());
    let mut frames = message.into_frames();
    frames[0].content = frames[0].content.slice(..49);
    let message = Message::from_frames(frames);

    let writer = MessageWriter::new(Fragmenter::new(1024));
    let received = transmit(&writer, vec![message]);
    let decoded = SUBMIT_TO_MEMBER.decode_request(&received[0]).unwrap();
    assert!(!decoded.is_auto_disposable_exists);
    assert!(!decoded.auto_disposable);
    assert_eq!(decoded.task_name, "task1");
}

#[test]
fn fragment_boundaries_are_invisible_to_the_receiver() {
    let message = SUBMIT_TO_MEMBER.encode_request(&sched1());
    let writer = MessageWriter::new(Fragmenter::new(1024));

    let mut results = Vec::new();
    for counts in [&[4][..], &[1, 1, 1, 1], &[1, 3], &[2, 2]] {
        let mut wire = BytesMut::new();
        let units = writer
            .write_partitioned(message.clone(), counts, &mut wire)
            .unwrap();
        assert_eq!(units, counts.len());

        let mut reader = MessageReader::from_config(&Config::default());
        reader.extend(&wire);
        results.push(reader.next_message().unwrap().unwrap());
        assert!(reader.next_message().unwrap().is_none());
    }

    for received in &results {
        assert_eq!(received.frames(), message.frames());
    }
}

#[test]
fn bad_partition_is_rejected() {
    let writer = MessageWriter::new(Fragmenter::new(1024));
    let mut wire = BytesMut::new();
    let message = SUBMIT_TO_MEMBER.encode_request(&sched1());
    assert!(matches!(
        writer.write_partitioned(message, &[1, 1], &mut wire),
        Err(ProtocolError::InvalidPartition(_))
    ));
    assert!(wire.is_empty());
}

// A later revision of SubmitToMember: one more optional fixed field after
// auto_disposable and one more variable field after the task.

#[derive(Debug, Clone, PartialEq, Eq)]
struct SubmitToMemberV2 {
    base: SubmitToMemberRequest,
    priority: Option<i32>,
    owner: Option<String>,
}

const PRIORITY: FixedField = FixedField::optional("priority", FieldKind::Int, 50);

const SUBMIT_TO_MEMBER_V2_LAYOUT: FieldLayout = FieldLayout {
    message_type: 0x1A0300,
    role: Role::Request,
    fixed: &[
        FixedField::mandatory("member_uuid", FieldKind::Uuid, 16),
        FixedField::mandatory("type", FieldKind::Byte, 32),
        FixedField::mandatory("initial_delay_in_millis", FieldKind::Long, 33),
        FixedField::mandatory("period_in_millis", FieldKind::Long, 41),
        FixedField::optional("auto_disposable", FieldKind::Boolean, 49),
        PRIORITY,
    ],
    variable: &[
        VarField::new("scheduler_name", FieldKind::String),
        VarField::new("task_name", FieldKind::String),
        VarField::new("task", FieldKind::Data),
        VarField::nullable("owner", FieldKind::String),
    ],
};

fn write_v2_fixed(p: &SubmitToMemberV2, w: &mut FixedWriter<'_>) {
    (SUBMIT_TO_MEMBER.request.write_fixed)(&p.base, w);
    if let Some(priority) = p.priority {
        w.put(&PRIORITY, priority);
    }
}

fn write_v2_variable(p: &SubmitToMemberV2, message: &mut Message) {
    (SUBMIT_TO_MEMBER.request.write_variable)(&p.base, message);
    match &p.owner {
        Some(owner) => builtin::encode_str(message, owner),
        None => None::<String>.encode(message),
    }
}

fn read_v2(
    r: &FixedReader<'_>,
    cursor: &mut FrameCursor<'_>,
) -> Result<SubmitToMemberV2, ProtocolError> {
    let base = (SUBMIT_TO_MEMBER.request.read)(r, cursor)?;
    let priority = r.get_optional(&PRIORITY);
    let owner = if cursor.has_next() {
        Option::<String>::decode(cursor)?
    } else {
        None
    };
    Ok(SubmitToMemberV2 {
        base,
        priority,
        owner,
    })
}

static SUBMIT_TO_MEMBER_V2: MessageCodec<SubmitToMemberV2> = MessageCodec {
    layout: &SUBMIT_TO_MEMBER_V2_LAYOUT,
    write_fixed: write_v2_fixed,
    write_variable: write_v2_variable,
    read: read_v2,
};

#[test]
fn newer_sender_is_readable_by_current_receiver() {
    SUBMIT_TO_MEMBER_V2_LAYOUT.validate().unwrap();
    let v2 = SubmitToMemberV2 {
        base: sched1(),
        priority: Some(7),
        owner: Some("ops".to_string()),
    };
    let message = SUBMIT_TO_MEMBER_V2.encode(&v2);
    assert_eq!(message.frames()[0].content.len(), 54);
    assert_eq!(message.frame_count(), 5);

    let writer = MessageWriter::new(Fragmenter::new(48));
    let received = transmit(&writer, vec![message]);

    let registry = Registry::with_builtin();
    let decoded = registry.decode(&received[0]).unwrap();
    assert_eq!(
        decoded.downcast_ref::<SubmitToMemberRequest>(),
        Some(&sched1())
    );
}

#[test]
fn current_sender_is_readable_by_newer_receiver() {
    let message = SUBMIT_TO_MEMBER.encode_request(&sched1());
    let decoded = SUBMIT_TO_MEMBER_V2.decode(&message).unwrap();
    assert_eq!(decoded.base, sched1());
    assert_eq!(decoded.priority, None);
    assert_eq!(decoded.owner, None);
}

#[test]
fn unknown_message_type_is_reported() {
    let registry = Registry::with_builtin();
    let mut message = SUBMIT_TO_MEMBER.encode_request(&sched1());
    let mut frames = message.into_frames();
    let mut content = BytesMut::from(&frames[0].content[..]);
    content[..4].copy_from_slice(&0x7F0000i32.to_le_bytes());
    frames[0].content = content.freeze();
    message = Message::from_frames(frames);

    assert!(matches!(
        registry.decode(&message),
        Err(ProtocolError::UnknownMessageType(0x7F0000))
    ));

    // the same bytes still travel fine; only interpretation fails
    let writer = MessageWriter::new(Fragmenter::new(1024));
    let received = transmit(&writer, vec![message.clone()]);
    assert_eq!(received[0].frames(), message.frames());
    assert_eq!(
        received[0].frames()[1].content,
        Bytes::from_static(b"sched1")
    );
}
