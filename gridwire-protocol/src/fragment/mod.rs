//! Message fragmentation.
//!
//! A message larger than the connection's fragment size travels as several
//! fragments. Each fragment part is a header frame followed by a run of the
//! message's own frames:
//!
//! ```text
//! +----------------------------+---------+---------+-----
//! | header frame               | frame i | frame j | ...
//! | flags: BEGIN / - / END     |         |         |
//! | content: fragmentation id  |         |         |
//! |          (u64 LE)          |         |         |
//! +----------------------------+---------+---------+-----
//! ```
//!
//! Frames are never split, so fragment boundaries carry no meaning: the
//! [`Reassembler`] concatenates the runs in arrival order and gets back the
//! original frame sequence. A message that fits in one fragment is sent whole,
//! its initial frame carrying `UNFRAGMENTED`.

mod fragmenter;
mod reassembler;

pub use fragmenter::Fragmenter;
pub use reassembler::Reassembler;

use crate::error::ProtocolError;
use crate::fixed::{self, LONG_SIZE};
use crate::frame::{Frame, FrameFlags, FRAME_HEADER_SIZE};
use crate::message::Message;
use bytes::BytesMut;
use std::fmt;

/// Width of the fragmentation id carried by a fragment header frame.
pub const FRAGMENTATION_ID_SIZE: usize = LONG_SIZE;

/// Wire overhead of one fragment part on top of the frames it carries.
pub const FRAGMENT_HEADER_OVERHEAD: usize = FRAME_HEADER_SIZE + FRAGMENTATION_ID_SIZE;

/// Identifier shared by every fragment of one message, unique per sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentationId(pub u64);

impl FragmentationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FragmentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a fragment part sits in its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentPosition {
    Begin,
    Middle,
    End,
}

impl FragmentPosition {
    fn flags(self) -> FrameFlags {
        match self {
            FragmentPosition::Begin => FrameFlags::new().with(FrameFlags::BEGIN_FRAGMENT),
            FragmentPosition::Middle => FrameFlags::new(),
            FragmentPosition::End => FrameFlags::new().with(FrameFlags::END_FRAGMENT),
        }
    }

    fn from_flags(flags: FrameFlags) -> Self {
        if flags.is_begin_fragment() {
            FragmentPosition::Begin
        } else if flags.is_end_fragment() {
            FragmentPosition::End
        } else {
            FragmentPosition::Middle
        }
    }
}

/// Builds the frame that opens a fragment part.
pub(crate) fn header_frame(id: FragmentationId, position: FragmentPosition) -> Frame {
    let mut content = BytesMut::with_capacity(FRAGMENTATION_ID_SIZE);
    fixed::put(&mut content, id.get());
    Frame::with_flags(content.freeze(), position.flags())
}

/// One wire unit: a whole message or one part of a fragmented message.
#[derive(Debug, Clone)]
pub enum Fragment {
    Whole(Message),
    Part {
        id: FragmentationId,
        position: FragmentPosition,
        frames: Vec<Frame>,
    },
}

impl Fragment {
    pub fn id(&self) -> Option<FragmentationId> {
        match self {
            Fragment::Whole(_) => None,
            Fragment::Part { id, .. } => Some(*id),
        }
    }

    /// Bytes this fragment occupies on the wire.
    pub fn wire_size(&self) -> usize {
        match self {
            Fragment::Whole(message) => message.wire_size(),
            Fragment::Part { frames, .. } => {
                FRAGMENT_HEADER_OVERHEAD + frames.iter().map(Frame::wire_size).sum::<usize>()
            }
        }
    }

    /// Flattens the fragment into the frames written to the wire.
    pub fn into_frames(self) -> Vec<Frame> {
        match self {
            Fragment::Whole(message) => message.into_frames(),
            Fragment::Part {
                id,
                position,
                frames,
            } => {
                let mut out = Vec::with_capacity(frames.len() + 1);
                out.push(header_frame(id, position));
                out.extend(frames);
                out
            }
        }
    }

    /// Classifies the frames of one received wire unit.
    ///
    /// A unit whose first frame carries both fragment flags is a whole
    /// message; anything else must start with a fragment header frame.
    pub fn from_frames(mut frames: Vec<Frame>) -> Result<Self, ProtocolError> {
        let Some(first) = frames.first() else {
            return Err(ProtocolError::TruncatedMessage {
                expected: "fragment",
            });
        };
        if first.flags.is_unfragmented() {
            return Ok(Fragment::Whole(Message::from_frames(frames)));
        }

        let header = frames.remove(0);
        if header.content.len() != FRAGMENTATION_ID_SIZE {
            return Err(ProtocolError::FragmentationProtocolViolation {
                id: 0,
                reason: "malformed fragment header",
            });
        }
        // An empty part is left for the reassembler, which drops the
        // assembly it belongs to.
        let id = FragmentationId(fixed::decode(&header.content, 0)?);
        Ok(Fragment::Part {
            id,
            position: FragmentPosition::from_flags(header.flags),
            frames,
        })
    }
}
