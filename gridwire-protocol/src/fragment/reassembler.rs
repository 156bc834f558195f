//! Inbound side: stitching fragments back into messages.
//!
//! One [`Reassembler`] belongs to one connection's receive path. Partial
//! messages are keyed by fragmentation id; a protocol violation or a limit
//! breach discards the offending assembly and leaves the others untouched.

use super::{Fragment, FragmentPosition, FragmentationId};
use crate::config::FragmentationConfig;
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::Message;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct PartialMessage {
    frames: Vec<Frame>,
    size: usize,
    started_at: Instant,
}

fn wire_size(frames: &[Frame]) -> usize {
    frames.iter().map(Frame::wire_size).sum()
}

fn violation(id: FragmentationId, reason: &'static str) -> ProtocolError {
    tracing::warn!("Fragmentation protocol violation for {}: {}", id, reason);
    ProtocolError::FragmentationProtocolViolation {
        id: id.get(),
        reason,
    }
}

/// Per-connection fragment reassembler.
#[derive(Debug)]
pub struct Reassembler {
    max_message_size: usize,
    max_pending: usize,
    timeout: Duration,
    buffers: HashMap<FragmentationId, PartialMessage>,
}

impl Reassembler {
    pub fn new(max_message_size: usize, max_pending: usize, timeout: Duration) -> Self {
        Self {
            max_message_size,
            max_pending,
            timeout,
            buffers: HashMap::new(),
        }
    }

    pub fn from_config(config: &FragmentationConfig) -> Self {
        Self::new(
            config.max_message_size,
            config.max_pending,
            config.assembly_timeout(),
        )
    }

    /// Feeds one received wire unit.
    ///
    /// Returns `Ok(Some(message))` when the unit completes a message and
    /// `Ok(None)` while more fragments are needed.
    pub fn push(&mut self, fragment: Fragment) -> Result<Option<Message>, ProtocolError> {
        self.push_at(fragment, Instant::now())
    }

    /// Same as [`Reassembler::push`] with an explicit clock reading.
    pub fn push_at(
        &mut self,
        fragment: Fragment,
        now: Instant,
    ) -> Result<Option<Message>, ProtocolError> {
        self.purge_expired_at(now);

        let (id, position, frames) = match fragment {
            Fragment::Whole(message) => return Ok(Some(message)),
            Fragment::Part {
                id,
                position,
                frames,
            } => (id, position, frames),
        };

        if frames.is_empty() {
            self.buffers.remove(&id);
            return Err(violation(id, "fragment carries no frames"));
        }

        let size = wire_size(&frames);
        let pending = self.buffers.len();
        match (position, self.buffers.entry(id)) {
            (FragmentPosition::Begin, Entry::Occupied(occupied)) => {
                occupied.remove();
                Err(violation(id, "begin fragment for an assembly in progress"))
            }
            (FragmentPosition::Begin, Entry::Vacant(vacant)) => {
                if size > self.max_message_size {
                    return Err(ProtocolError::MessageTooLarge {
                        id: id.get(),
                        size,
                        max: self.max_message_size,
                    });
                }
                if pending >= self.max_pending {
                    tracing::warn!(
                        "Rejecting fragmented message {}: {} assemblies pending",
                        id,
                        pending
                    );
                    return Err(ProtocolError::TooManyAssemblies {
                        max: self.max_pending,
                    });
                }
                tracing::debug!("Assembly {} started", id);
                vacant.insert(PartialMessage {
                    frames,
                    size,
                    started_at: now,
                });
                Ok(None)
            }
            (_, Entry::Vacant(_)) => Err(violation(id, "continuation fragment for unknown id")),
            (position, Entry::Occupied(mut occupied)) => {
                let total = occupied.get().size.saturating_add(size);
                if total > self.max_message_size {
                    occupied.remove();
                    tracing::warn!("Discarding assembly {}: {} bytes exceeds limit", id, total);
                    return Err(ProtocolError::MessageTooLarge {
                        id: id.get(),
                        size: total,
                        max: self.max_message_size,
                    });
                }

                let partial = occupied.get_mut();
                partial.frames.extend(frames);
                partial.size = total;

                if position == FragmentPosition::End {
                    let partial = occupied.remove();
                    tracing::debug!(
                        "Assembly {} complete: {} frames, {} bytes",
                        id,
                        partial.frames.len(),
                        partial.size
                    );
                    Ok(Some(Message::from_frames(partial.frames)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Drops partial messages older than the assembly timeout and returns
    /// their ids.
    pub fn purge_expired(&mut self) -> Vec<FragmentationId> {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<FragmentationId> {
        let mut evicted = Vec::new();
        let timeout = self.timeout;

        self.buffers.retain(|id, partial| {
            let expired = now.saturating_duration_since(partial.started_at) >= timeout;
            if expired {
                tracing::warn!("Assembly {} expired with {} frames", id, partial.frames.len());
                evicted.push(*id);
            }
            !expired
        });

        evicted
    }

    /// Drops the partial message for `id`, if any.
    pub fn discard(&mut self, id: FragmentationId) -> bool {
        self.buffers.remove(&id).is_some()
    }

    /// Drops every partial message; called when the connection closes.
    pub fn clear(&mut self) {
        if !self.buffers.is_empty() {
            tracing::debug!("Discarding {} incomplete assemblies", self.buffers.len());
        }
        self.buffers.clear();
    }

    /// Number of partial messages currently buffered.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_pending(&self, id: FragmentationId) -> bool {
        self.buffers.contains_key(&id)
    }
}

impl Drop for Reassembler {
    fn drop(&mut self) {
        self.clear();
    }
}
