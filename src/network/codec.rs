//! Line framing for the chat protocol.
//!
//! Input is split on `\n` with an optional trailing `\r`. Bytes that are not
//! UTF-8 are replaced rather than rejected, and a line longer than the limit
//! is reported once and then skipped up to its newline, so neither ends the
//! stream.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// One decoded input frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// A line exceeded the limit; the rest of it is being discarded.
    TooLong,
}

/// Newline-delimited text codec that never fails on content.
#[derive(Debug, Clone)]
pub struct ChatCodec {
    max_length: usize,
    /// Where to resume the newline search in the buffer.
    next_index: usize,
    discarding: bool,
}

impl ChatCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

fn to_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for ChatCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        loop {
            let read_to = self.max_length.saturating_add(1).min(buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let raw = buf.split_to(end + 1);
                    return Ok(Some(Frame::Line(to_line(&raw[..end]))));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                    return Ok(Some(Frame::TooLong));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        // Unterminated last line.
        if self.discarding || buf.is_empty() {
            buf.clear();
            return Ok(None);
        }
        self.next_index = 0;
        let raw = buf.split();
        Ok(Some(Frame::Line(to_line(&raw))))
    }
}

impl Encoder<String> for ChatCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Option<Frame> {
        Some(Frame::Line(s.to_string()))
    }

    #[test]
    fn test_decode_lf_and_crlf() {
        let mut codec = ChatCodec::new(64);
        let mut buf = BytesMut::from("hello\nworld\r\n\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), line("hello"));
        assert_eq!(codec.decode(&mut buf).unwrap(), line("world"));
        assert_eq!(codec.decode(&mut buf).unwrap(), line(""));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut codec = ChatCodec::new(64);
        let mut buf = BytesMut::from(&b"caf\xe9\r\nnext\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), line("caf\u{fffd}"));
        assert_eq!(codec.decode(&mut buf).unwrap(), line("next"));
    }

    #[test]
    fn test_long_line_is_skipped() {
        let mut codec = ChatCodec::new(5);
        let mut buf = BytesMut::from("toolong");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::TooLong));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        // The rest of the line arrives later and is dropped too.
        buf.extend_from_slice(b"stillgoing\nok\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), line("ok"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_partial_line_waits() {
        let mut codec = ChatCodec::new(64);
        let mut buf = BytesMut::from("hel");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"lo\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), line("hello"));
    }

    #[test]
    fn test_eof_flushes_unterminated_line() {
        let mut codec = ChatCodec::new(64);
        let mut buf = BytesMut::from("bye");
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), line("bye"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = ChatCodec::new(64);
        let mut buf = BytesMut::new();
        codec.encode("hello".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"hello\n");
    }
}
