//! Forward-only cursor over a message's frames.

use crate::error::ProtocolError;
use crate::frame::Frame;

/// Walks a frame chain in encode order.
///
/// The cursor never rewinds: every field is read exactly once, in the order
/// it was encoded. It borrows the message immutably, so several decoded
/// messages can be walked concurrently while each cursor stays on one thread.
#[derive(Debug, Clone)]
pub struct FrameCursor<'a> {
    frames: &'a [Frame],
    position: usize,
}

impl<'a> FrameCursor<'a> {
    pub fn new(frames: &'a [Frame]) -> Self {
        Self {
            frames,
            position: 0,
        }
    }

    /// Consumes the next frame. `expected` names the field being read and
    /// ends up in the [`ProtocolError::TruncatedMessage`] raised when the
    /// chain is exhausted.
    pub fn next_frame(&mut self, expected: &'static str) -> Result<&'a Frame, ProtocolError> {
        let frame = self
            .frames
            .get(self.position)
            .ok_or(ProtocolError::TruncatedMessage { expected })?;
        self.position += 1;
        Ok(frame)
    }

    pub fn peek(&self) -> Option<&'a Frame> {
        self.frames.get(self.position)
    }

    pub fn has_next(&self) -> bool {
        self.position < self.frames.len()
    }

    pub fn next_is_null(&self) -> bool {
        self.peek().is_some_and(Frame::is_null_frame)
    }

    pub fn next_is_end(&self) -> bool {
        self.peek().is_some_and(Frame::is_end_frame)
    }

    /// Consumes the next frame if it is a null marker.
    pub fn skip_null(&mut self) -> bool {
        if self.next_is_null() {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consumes a begin-structure frame or fails with `UnexpectedFrame`.
    pub fn expect_begin(&mut self, expected: &'static str) -> Result<(), ProtocolError> {
        let frame = self.next_frame(expected)?;
        if !frame.is_begin_frame() {
            return Err(ProtocolError::UnexpectedFrame {
                expected,
                flags: frame.flags.bits(),
            });
        }
        Ok(())
    }

    /// Skips everything up to and including the end frame closing the
    /// structure the cursor is currently inside, honouring nested structures.
    ///
    /// Decoders of nested records call this after reading the members they
    /// know, so members appended by newer peers are ignored.
    pub fn fast_forward_to_end_frame(&mut self) -> Result<(), ProtocolError> {
        let mut depth = 1usize;
        while depth > 0 {
            let frame = self.next_frame("end of data structure")?;
            if frame.is_end_frame() {
                depth -= 1;
            } else if frame.is_begin_frame() {
                depth += 1;
            }
        }
        Ok(())
    }

    /// Number of frames consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frames() -> Vec<Frame> {
        vec![
            Frame::new(Bytes::from_static(b"initial")),
            Frame::null(),
            Frame::begin(),
            Frame::new(Bytes::from_static(b"a")),
            Frame::begin(),
            Frame::new(Bytes::from_static(b"b")),
            Frame::end(),
            Frame::end(),
            Frame::new(Bytes::from_static(b"tail")),
        ]
    }

    #[test]
    fn test_forward_only() {
        let frames = frames();
        let mut cursor = FrameCursor::new(&frames);

        assert_eq!(cursor.next_frame("initial").unwrap().content, "initial");
        assert!(cursor.next_is_null());
        assert!(cursor.skip_null());
        assert!(!cursor.skip_null());
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.remaining(), 7);
    }

    #[test]
    fn test_fast_forward_skips_nested_structures() {
        let frames = frames();
        let mut cursor = FrameCursor::new(&frames);
        cursor.next_frame("initial").unwrap();
        cursor.skip_null();
        cursor.expect_begin("outer").unwrap();

        cursor.fast_forward_to_end_frame().unwrap();
        assert_eq!(cursor.next_frame("tail").unwrap().content, "tail");
        assert!(!cursor.has_next());
    }

    #[test]
    fn test_truncated_message() {
        let frames = vec![Frame::new(Bytes::from_static(b"only"))];
        let mut cursor = FrameCursor::new(&frames);
        cursor.next_frame("initial").unwrap();

        let err = cursor.next_frame("scheduler_name").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TruncatedMessage {
                expected: "scheduler_name"
            }
        ));
    }

    #[test]
    fn test_fast_forward_without_end_is_truncated() {
        let frames = vec![Frame::begin(), Frame::new(Bytes::from_static(b"x"))];
        let mut cursor = FrameCursor::new(&frames);
        cursor.expect_begin("list").unwrap();
        assert!(matches!(
            cursor.fast_forward_to_end_frame(),
            Err(ProtocolError::TruncatedMessage { .. })
        ));
    }

    #[test]
    fn test_expect_begin_rejects_other_frames() {
        let frames = vec![Frame::new(Bytes::from_static(b"x"))];
        let mut cursor = FrameCursor::new(&frames);
        assert!(matches!(
            cursor.expect_begin("list"),
            Err(ProtocolError::UnexpectedFrame { expected: "list", .. })
        ));
    }
}
