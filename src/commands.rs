//! Command execution.

use crate::Commands;
use colored::Colorize;
use gridwire_protocol::ops::{SubmitToMemberRequest, SUBMIT_TO_MEMBER};
use gridwire_protocol::{
    Config, Data, Encoder, FieldLayout, Fragmenter, Message, MessageReader, Registry,
};
use std::io::Read;
use uuid::Uuid;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub fn execute(registry: &Registry, config: &Config, cmd: Commands) -> CommandResult {
    match cmd {
        Commands::Layouts { json } => {
            if json {
                Ok(serde_json::to_string_pretty(&registry.entries())?)
            } else {
                Ok(format_layouts(registry))
            }
        }

        Commands::Sample {
            correlation_id,
            fragment_size,
        } => {
            let fragment_size =
                fragment_size.unwrap_or(config.fragmentation.max_fragment_size);
            sample(correlation_id, fragment_size)
        }

        Commands::Inspect { file } => {
            let input = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut input = String::new();
                    std::io::stdin().read_to_string(&mut input)?;
                    input
                }
            };
            inspect(registry, config, &input)
        }
    }
}

fn format_layouts(registry: &Registry) -> String {
    let mut out = Vec::new();
    for entry in registry.entries() {
        out.push(format!(
            "{} {} ({:?})",
            format!("{:#08x}", entry.layout.message_type).yellow(),
            entry.operation.cyan().bold(),
            entry.layout.role
        ));
        out.push(format_layout(entry.layout));
    }
    out.join("\n")
}

fn format_layout(layout: &FieldLayout) -> String {
    let mut lines = vec![format!(
        "  {:>4}  {:<24} header",
        "@0",
        format!("[{} bytes]", layout.header_size())
    )];

    for field in layout.fixed {
        let marker = if field.optional { " (optional)" } else { "" };
        lines.push(format!(
            "  {:>4}  {:<24} {:?}{}",
            format!("@{}", field.offset),
            field.name,
            field.kind,
            marker.dimmed()
        ));
    }
    for field in layout.variable {
        let marker = if field.nullable { " (nullable)" } else { "" };
        lines.push(format!(
            "  {:>4}  {:<24} {:?}{}",
            "+",
            field.name,
            field.kind,
            marker.dimmed()
        ));
    }
    lines.push(format!(
        "  initial frame: {} bytes, mandatory prefix: {} bytes",
        layout.initial_frame_size(),
        layout.mandatory_size()
    ));
    lines.join("\n")
}

/// The request used by `gridwire sample`.
pub fn sample_request() -> SubmitToMemberRequest {
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

/// Encodes the sample request, one hex line per wire unit.
fn sample(correlation_id: i64, fragment_size: usize) -> CommandResult {
    let mut message = SUBMIT_TO_MEMBER.encode_request(&sample_request());
    message.set_correlation_id(correlation_id)?;

    let fragmenter = Fragmenter::new(fragment_size);
    let mut lines = Vec::new();
    for fragment in fragmenter.fragment(message) {
        let mut buf = bytes::BytesMut::new();
        Encoder::encode_fragment(&fragment, &mut buf)?;
        lines.push(hex::encode(&buf));
    }
    Ok(lines.join("\n"))
}

/// Decodes hex wire bytes through the reassembler and the registry.
fn inspect(registry: &Registry, config: &Config, input: &str) -> CommandResult {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(cleaned)?;

    let mut reader = MessageReader::from_config(config);
    reader.extend(&bytes);

    let mut out = Vec::new();
    while let Some(message) = reader.next_message()? {
        out.push(describe(registry, &message));
    }
    if reader.pending_assemblies() > 0 {
        out.push(format!(
            "{}: {} incomplete fragmented message(s)",
            "Warning".yellow(),
            reader.pending_assemblies()
        ));
    }
    if out.is_empty() {
        out.push("No complete messages".dimmed().to_string());
    }
    Ok(out.join("\n"))
}

fn describe(registry: &Registry, message: &Message) -> String {
    match registry.decode(message) {
        Ok(decoded) => format!(
            "{} {:?} type={:#08x} correlation_id={} frames={}\n{:#?}",
            decoded.operation.cyan().bold(),
            decoded.role,
            decoded.message_type,
            decoded.correlation_id,
            message.frame_count(),
            decoded.params
        ),
        Err(e) => format!(
            "{}: {} ({} frames)",
            "Undecodable message".red(),
            e,
            message.frame_count()
        ),
    }
}
