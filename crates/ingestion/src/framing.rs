//! Line framing
//!
//! Splits a byte stream into frames on `\n` or `\0`. A frame that grows past the
//! configured limit is discarded up to its delimiter and reported once.

use bytes::{Bytes, BytesMut};

/// Framer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Complete frame, delimiter stripped, never empty
    Complete(Bytes),
    /// Frame above the limit; carries the number of bytes thrown away
    Oversized(usize),
}

#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    max_frame_len: usize,
    /// Bytes dropped from the frame currently being discarded
    discarding: Option<usize>,
}

impl LineFramer {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_len,
            discarding: None,
        }
    }

    /// Feed bytes, returning every frame they complete
    pub fn push(&mut self, mut data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        while !data.is_empty() {
            let delimiter = data.iter().position(|b| *b == b'\n' || *b == 0);
            let (chunk, rest) = match delimiter {
                Some(pos) => (&data[..pos], Some(&data[pos + 1..])),
                None => (data, None),
            };
            self.extend(chunk);
            match rest {
                Some(rest) => {
                    if let Some(frame) = self.complete() {
                        frames.push(frame);
                    }
                    data = rest;
                }
                None => break,
            }
        }
        frames
    }

    /// Emit whatever is buffered as a final frame (end of stream)
    pub fn finish(&mut self) -> Option<Frame> {
        self.complete()
    }

    /// Bytes waiting for a delimiter
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn extend(&mut self, chunk: &[u8]) {
        if let Some(dropped) = self.discarding.as_mut() {
            *dropped += chunk.len();
            return;
        }
        if self.buffer.len() + chunk.len() > self.max_frame_len {
            self.discarding = Some(self.buffer.len() + chunk.len());
            self.buffer.clear();
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    fn complete(&mut self) -> Option<Frame> {
        if let Some(dropped) = self.discarding.take() {
            return Some(Frame::Oversized(dropped));
        }
        let frame = self.buffer.split().freeze();
        let start = frame.iter().position(|b| !b.is_ascii_whitespace())?;
        let end = frame.iter().rposition(|b| !b.is_ascii_whitespace())? + 1;
        Some(Frame::Complete(frame.slice(start..end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(s: &str) -> Frame {
        Frame::Complete(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn test_split_on_newline_and_nul() {
        let mut framer = LineFramer::new(1024);
        let frames = framer.push(b"{\"a\":1}\n{\"b\":2}\0{\"c\":3}\r\n");
        assert_eq!(
            frames,
            vec![complete("{\"a\":1}"), complete("{\"b\":2}"), complete("{\"c\":3}")]
        );
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_frames_span_reads() {
        let mut framer = LineFramer::new(1024);
        assert!(framer.push(b"{\"name\": \"vehic").is_empty());
        assert_eq!(framer.buffered(), 15);
        let frames = framer.push(b"le_speed\"}\n");
        assert_eq!(frames, vec![complete("{\"name\": \"vehicle_speed\"}")]);
    }

    #[test]
    fn test_empty_frames_skipped() {
        let mut framer = LineFramer::new(1024);
        assert!(framer.push(b"\n\n\0  \n").is_empty());
    }

    #[test]
    fn test_oversized_frame_discarded_once() {
        let mut framer = LineFramer::new(8);
        let mut frames = framer.push(b"0123456789");
        frames.extend(framer.push(b"abcdef\nok\n"));
        assert_eq!(frames, vec![Frame::Oversized(16), complete("ok")]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut framer = LineFramer::new(64);
        assert!(framer.push(b"{\"x\":1}").is_empty());
        assert_eq!(framer.finish(), Some(complete("{\"x\":1}")));
        assert_eq!(framer.finish(), None);
    }
}
