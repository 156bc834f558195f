//! Encoder and decoder for wire units.
//!
//! A wire unit is the frame run of one whole message or one fragment part.
//! The last frame of every unit carries `IS_FINAL`; the decoder uses it to
//! find unit boundaries in the byte stream and strips it again, so frames
//! come out exactly as they went in.

use crate::config::Config;
use crate::error::ProtocolError;
use crate::fragment::{self, Fragment, Fragmenter, Reassembler};
use crate::frame::{Frame, FrameFlags};
use crate::message::Message;
use bytes::{Bytes, BytesMut};

/// Encodes messages and fragments into wire bytes.
///
/// The initial frame of a whole message always goes out with
/// `UNFRAGMENTED` set, whatever flags the caller built it with.
#[derive(Debug, Clone, Copy)]
pub struct Encoder;

impl Encoder {
    /// Encodes an unfragmented message.
    pub fn encode_message(message: &Message) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(message.wire_size());
        Self::encode_unit(message.frames().iter(), FrameFlags::UNFRAGMENTED, &mut buf)?;
        Ok(buf)
    }

    /// Appends one fragment to `buf`.
    pub fn encode_fragment(fragment: &Fragment, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match fragment {
            Fragment::Whole(message) => {
                Self::encode_unit(message.frames().iter(), FrameFlags::UNFRAGMENTED, buf)
            }
            Fragment::Part {
                id,
                position,
                frames,
            } => {
                let header = fragment::header_frame(*id, *position);
                Self::encode_unit(std::iter::once(&header).chain(frames.iter()), 0, buf)
            }
        }
    }

    fn encode_unit<'a>(
        frames: impl Iterator<Item = &'a Frame>,
        initial_flags: u16,
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        let mut frames = frames.enumerate().peekable();
        if frames.peek().is_none() {
            return Err(ProtocolError::TruncatedMessage {
                expected: "initial frame",
            });
        }

        while let Some((i, frame)) = frames.next() {
            let mut flags = if frames.peek().is_none() {
                frame.flags.with(FrameFlags::IS_FINAL)
            } else {
                frame.flags.without(FrameFlags::IS_FINAL)
            };
            if i == 0 {
                flags = flags.with(initial_flags);
            }
            frame.encode_with_flags(flags, buf)?;
        }
        Ok(())
    }
}

/// Splits a byte stream into wire units.
#[derive(Debug)]
pub struct Decoder {
    buffer: BytesMut,
    max_frame_size: u32,
    unit: Vec<Frame>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(crate::MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_size,
            unit: Vec::new(),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to decode the next frame from the buffer, flags untouched.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer, self.max_frame_size)
    }

    /// Attempts to decode the next complete wire unit.
    ///
    /// Frames of an incomplete unit stay buffered across calls.
    pub fn decode_unit(&mut self) -> Result<Option<Vec<Frame>>, ProtocolError> {
        while let Some(mut frame) = self.decode_frame()? {
            let is_final = frame.flags.is_final();
            frame.flags = frame.flags.without(FrameFlags::IS_FINAL);
            self.unit.push(frame);
            if is_final {
                return Ok(Some(std::mem::take(&mut self.unit)));
            }
        }
        Ok(None)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer and any partial unit.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.unit.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound pipeline of one connection: fragmenter plus encoder.
#[derive(Debug)]
pub struct MessageWriter {
    fragmenter: Fragmenter,
}

impl MessageWriter {
    pub fn new(fragmenter: Fragmenter) -> Self {
        Self { fragmenter }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Fragmenter::from_config(&config.fragmentation))
    }

    /// Encodes `message` into `buf`, fragmenting it when it exceeds the
    /// fragment size. Returns the number of wire units written.
    pub fn write(&self, message: Message, buf: &mut BytesMut) -> Result<usize, ProtocolError> {
        let fragments = self.fragmenter.fragment(message);
        for fragment in &fragments {
            Encoder::encode_fragment(fragment, buf)?;
        }
        Ok(fragments.len())
    }

    /// Encodes `message` with an explicit fragment partition.
    pub fn write_partitioned(
        &self,
        message: Message,
        counts: &[usize],
        buf: &mut BytesMut,
    ) -> Result<usize, ProtocolError> {
        let fragments = self.fragmenter.fragment_partitioned(message, counts)?;
        for fragment in &fragments {
            Encoder::encode_fragment(fragment, buf)?;
        }
        Ok(fragments.len())
    }
}

/// Inbound pipeline of one connection: decoder plus reassembler.
#[derive(Debug)]
pub struct MessageReader {
    decoder: Decoder,
    reassembler: Reassembler,
}

impl MessageReader {
    pub fn new(decoder: Decoder, reassembler: Reassembler) -> Self {
        Self {
            decoder,
            reassembler,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Decoder::with_max_frame_size(config.wire.max_frame_size),
            Reassembler::from_config(&config.fragmentation),
        )
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.decoder.extend(data);
    }

    /// Returns the next complete message, or `None` once the buffered bytes
    /// are exhausted.
    pub fn next_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        while let Some(frames) = self.decoder.decode_unit()? {
            let fragment = Fragment::from_frames(frames)?;
            if let Some(message) = self.reassembler.push(fragment)? {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }

    /// Number of partially reassembled messages.
    pub fn pending_assemblies(&self) -> usize {
        self.reassembler.pending()
    }

    pub fn purge_expired(&mut self) -> usize {
        self.reassembler.purge_expired().len()
    }

    /// Releases every buffer; call when the connection closes.
    pub fn close(&mut self) {
        self.decoder.clear();
        self.reassembler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FragmentPosition;
    use crate::message;

    fn three_frame_message() -> Message {
        let mut content = message::initial_frame_buffer(16, 0x1A0300).unwrap();
        content[4] = 7;
        let mut message = Message::new();
        message.add(message::initial_frame(content));
        message.add(Frame::new(Bytes::from_static(b"sched1")));
        message.add(Frame::null());
        message
    }

    fn read_all(reader: &mut MessageReader) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(message) = reader.next_message().unwrap() {
            out.push(message);
        }
        out
    }

    fn reader() -> MessageReader {
        MessageReader::from_config(&Config::default())
    }

    #[test]
    fn test_final_flag_on_last_frame_only() {
        let encoded = Encoder::encode_message(&three_frame_message()).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);
        let mut raw = Vec::new();
        while let Some(frame) = decoder.decode_frame().unwrap() {
            raw.push(frame);
        }
        assert_eq!(raw.len(), 3);
        assert!(!raw[0].flags.is_final());
        assert!(!raw[1].flags.is_final());
        assert!(raw[2].flags.is_final());
        assert!(raw[2].is_null_frame());
    }

    #[test]
    fn test_decode_unit_strips_final_flag() {
        let message = three_frame_message();
        let encoded = Encoder::encode_message(&message).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);
        let unit = decoder.decode_unit().unwrap().unwrap();
        assert_eq!(unit, message.frames());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_unit_decoding() {
        let message = three_frame_message();
        let encoded = Encoder::encode_message(&message).unwrap();

        let mut decoder = Decoder::new();
        for byte in &encoded[..encoded.len() - 1] {
            decoder.extend(&[*byte]);
            assert!(decoder.decode_unit().unwrap().is_none());
        }
        decoder.extend(&encoded[encoded.len() - 1..]);
        assert_eq!(decoder.decode_unit().unwrap().unwrap(), message.frames());
    }

    #[test]
    fn test_empty_message_is_rejected() {
        assert!(matches!(
            Encoder::encode_message(&Message::new()),
            Err(ProtocolError::TruncatedMessage { .. })
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let encoded = Encoder::encode_message(&three_frame_message()).unwrap();
        let mut decoder = Decoder::with_max_frame_size(8);
        decoder.extend(&encoded);
        assert!(matches!(
            decoder.decode_unit(),
            Err(ProtocolError::FrameTooLarge { size: 16, max: 8 })
        ));
    }

    #[test]
    fn test_fragmentation_is_transparent() {
        let writer = MessageWriter::new(Fragmenter::new(1024));

        let mut whole = BytesMut::new();
        assert_eq!(
            writer
                .write_partitioned(three_frame_message(), &[3], &mut whole)
                .unwrap(),
            1
        );
        let mut split = BytesMut::new();
        assert_eq!(
            writer
                .write_partitioned(three_frame_message(), &[1, 1, 1], &mut split)
                .unwrap(),
            3
        );

        let mut reader = reader();
        reader.extend(&whole);
        let from_whole = read_all(&mut reader);

        reader.extend(&split);
        let from_split = read_all(&mut reader);

        assert_eq!(from_whole.len(), 1);
        assert_eq!(from_split.len(), 1);
        assert_eq!(from_whole[0].frames(), from_split[0].frames());
        assert_eq!(from_split[0].frames(), three_frame_message().frames());
        assert_eq!(reader.pending_assemblies(), 0);
    }

    #[test]
    fn test_writer_fragments_large_messages() {
        let mut message = three_frame_message();
        message.add(Frame::new(Bytes::from(vec![0x5A; 300])));

        let writer = MessageWriter::new(Fragmenter::new(128));
        let mut buf = BytesMut::new();
        assert!(writer.write(message.clone(), &mut buf).unwrap() > 1);
        writer.write(three_frame_message(), &mut buf).unwrap();

        let mut reader = reader();
        reader.extend(&buf);
        let messages = read_all(&mut reader);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].frames(), message.frames());
        assert_eq!(messages[1].frames(), three_frame_message().frames());
    }

    #[test]
    fn test_message_without_unfragmented_flag_survives_the_wire() {
        for initial_len in [16, 8] {
            let frames = vec![
                Frame::new(Bytes::from(vec![7u8; initial_len])),
                Frame::new(Bytes::from_static(b"payload")),
            ];
            let writer = MessageWriter::new(Fragmenter::new(1024));
            let mut buf = BytesMut::new();
            writer
                .write(Message::from_frames(frames.clone()), &mut buf)
                .unwrap();

            let mut reader = reader();
            reader.extend(&buf);
            let received = reader.next_message().unwrap().unwrap();
            assert_eq!(received.frame_count(), 2);
            assert!(received.frames()[0].flags.is_unfragmented());
            assert_eq!(received.frames()[0].content, frames[0].content);
            assert_eq!(received.frames()[1], frames[1]);
        }
    }

    #[test]
    fn test_unmarked_message_is_the_same_whole_or_fragmented() {
        let frames = vec![
            Frame::new(Bytes::from(vec![1u8; 16])),
            Frame::new(Bytes::from_static(b"a")),
            Frame::new(Bytes::from_static(b"b")),
        ];
        let writer = MessageWriter::new(Fragmenter::new(1024));
        let mut buf = BytesMut::new();
        writer
            .write_partitioned(Message::from_frames(frames.clone()), &[3], &mut buf)
            .unwrap();
        writer
            .write_partitioned(Message::from_frames(frames), &[1, 1, 1], &mut buf)
            .unwrap();

        let mut reader = reader();
        reader.extend(&buf);
        let messages = read_all(&mut reader);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].frames(), messages[1].frames());
    }

    #[test]
    fn test_header_only_part_discards_assembly() {
        let writer = MessageWriter::new(Fragmenter::new(1024));
        let mut buf = BytesMut::new();
        writer
            .write_partitioned(three_frame_message(), &[1, 2], &mut buf)
            .unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&buf);
        let begin = Fragment::from_frames(decoder.decode_unit().unwrap().unwrap()).unwrap();
        let id = begin.id().unwrap();

        let mut wire = BytesMut::new();
        Encoder::encode_fragment(&begin, &mut wire).unwrap();
        let empty = Fragment::Part {
            id,
            position: FragmentPosition::Middle,
            frames: Vec::new(),
        };
        Encoder::encode_fragment(&empty, &mut wire).unwrap();

        let mut reader = reader();
        reader.extend(&wire);
        assert!(matches!(
            reader.next_message(),
            Err(ProtocolError::FragmentationProtocolViolation { .. })
        ));
        assert_eq!(reader.pending_assemblies(), 0);
    }

    #[test]
    fn test_close_releases_partial_assemblies() {
        let writer = MessageWriter::new(Fragmenter::new(1024));
        let mut buf = BytesMut::new();
        writer
            .write_partitioned(three_frame_message(), &[1, 2], &mut buf)
            .unwrap();

        // deliver only the first fragment
        let mut decoder = Decoder::new();
        decoder.extend(&buf);
        let first = decoder.decode_unit().unwrap().unwrap();
        let mut first_bytes = BytesMut::new();
        Encoder::encode_fragment(&Fragment::from_frames(first).unwrap(), &mut first_bytes)
            .unwrap();

        let mut reader = reader();
        reader.extend(&first_bytes);
        assert!(reader.next_message().unwrap().is_none());
        assert_eq!(reader.pending_assemblies(), 1);

        reader.close();
        assert_eq!(reader.pending_assemblies(), 0);
    }
}
