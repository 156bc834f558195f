//! Outbound side: splitting messages into fragments.

use super::{Fragment, FragmentPosition, FragmentationId, FRAGMENT_HEADER_OVERHEAD};
use crate::config::FragmentationConfig;
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::Message;
use std::sync::atomic::{AtomicU64, Ordering};

/// Splits messages into fragments of at most `max_fragment_size` wire bytes.
///
/// Safe to share between writers; each fragmented message draws a fresh id.
#[derive(Debug)]
pub struct Fragmenter {
    max_fragment_size: usize,
    next_id: AtomicU64,
}

impl Fragmenter {
    pub fn new(max_fragment_size: usize) -> Self {
        Self {
            max_fragment_size,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &FragmentationConfig) -> Self {
        Self::new(config.max_fragment_size)
    }

    pub fn max_fragment_size(&self) -> usize {
        self.max_fragment_size
    }

    fn next_id(&self) -> FragmentationId {
        FragmentationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Fragments `message`, packing as many whole frames into each fragment
    /// as fit. A frame larger than the fragment size travels alone in an
    /// oversized fragment. The initial frame is marked `UNFRAGMENTED` first,
    /// so the receiver sees the same message whichever way it travels.
    pub fn fragment(&self, mut message: Message) -> Vec<Fragment> {
        message.mark_unfragmented();
        if message.wire_size() <= self.max_fragment_size {
            return vec![Fragment::Whole(message)];
        }

        let mut groups: Vec<Vec<Frame>> = Vec::new();
        let mut current = Vec::new();
        let mut current_size = FRAGMENT_HEADER_OVERHEAD;
        for frame in message.into_frames() {
            let size = frame.wire_size();
            if !current.is_empty() && current_size + size > self.max_fragment_size {
                groups.push(std::mem::take(&mut current));
                current_size = FRAGMENT_HEADER_OVERHEAD;
            }
            current_size += size;
            current.push(frame);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        self.build_parts(groups)
    }

    /// Fragments `message` with the given number of frames per fragment.
    ///
    /// `counts` must be non-zero and add up to the message's frame count. A
    /// single count sends the message whole.
    pub fn fragment_partitioned(
        &self,
        mut message: Message,
        counts: &[usize],
    ) -> Result<Vec<Fragment>, ProtocolError> {
        if counts.is_empty() || counts.contains(&0) {
            return Err(ProtocolError::InvalidPartition("fragments must carry frames"));
        }
        if counts.iter().sum::<usize>() != message.frame_count() {
            return Err(ProtocolError::InvalidPartition(
                "counts do not cover the message",
            ));
        }
        message.mark_unfragmented();
        if counts.len() == 1 {
            return Ok(vec![Fragment::Whole(message)]);
        }

        let mut frames = message.into_frames().into_iter();
        let groups = counts
            .iter()
            .map(|&n| frames.by_ref().take(n).collect())
            .collect();
        Ok(self.build_parts(groups))
    }

    fn build_parts(&self, groups: Vec<Vec<Frame>>) -> Vec<Fragment> {
        if groups.len() == 1 {
            // A single oversized frame cannot be split further.
            let frames = groups.into_iter().flatten().collect();
            return vec![Fragment::Whole(Message::from_frames(frames))];
        }

        let id = self.next_id();
        let last = groups.len() - 1;
        tracing::debug!("Fragmenting message {} into {} fragments", id, groups.len());
        groups
            .into_iter()
            .enumerate()
            .map(|(i, frames)| Fragment::Part {
                id,
                position: match i {
                    0 => FragmentPosition::Begin,
                    i if i == last => FragmentPosition::End,
                    _ => FragmentPosition::Middle,
                },
                frames,
            })
            .collect()
    }
}
