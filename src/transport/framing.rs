//! Length-prefixed framing: a 4-byte big-endian `u32` length followed by
//! exactly that many payload bytes. Used in both directions.

use std::io::{ErrorKind, Read, Write};

use anyhow::{anyhow, Context, Result};

pub const HEADER_LEN: usize = 4;

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| anyhow!("payload of {} bytes does not fit a frame", payload.len()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).context("write frame")?;
    writer.flush().context("flush frame")?;
    Ok(())
}

/// Read one frame from a blocking reader.
///
/// Returns `Ok(None)` if the stream ends cleanly before a header starts. A
/// stream that ends anywhere inside a frame is an error.
pub fn read_frame<R: Read>(reader: &mut R, max_len: u32) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(anyhow!("stream closed inside frame header")),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("read frame header"),
        }
    }

    let len = u32::from_be_bytes(header);
    if len > max_len {
        return Err(anyhow!("frame of {} bytes exceeds limit of {}", len, max_len));
    }
    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .context("stream closed inside frame payload")?;
    Ok(Some(payload))
}

/// Incremental decoder for bytes arriving from a non-blocking socket.
///
/// Never holds more than one maximum-size frame: callers ask `room()` how
/// much to read before calling `extend`.
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Start of the unconsumed bytes in `buf`.
    pos: usize,
    max_len: u32,
}

impl FrameDecoder {
    pub fn new(max_len: u32) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            max_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Unconsumed bytes currently held.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Upper bound on buffered bytes: one header plus the largest payload.
    pub fn capacity(&self) -> usize {
        HEADER_LEN + self.max_len as usize
    }

    /// Bytes that may still be read without exceeding `capacity()`.
    pub fn room(&self) -> usize {
        self.capacity().saturating_sub(self.buffered())
    }

    /// Whether a complete frame is already buffered (or the header is bad).
    pub fn has_frame(&self) -> bool {
        match self.declared_len() {
            Some(len) if len > self.max_len => true,
            Some(len) => self.buffered() >= HEADER_LEN + len as usize,
            None => false,
        }
    }

    /// Pop the next complete payload, if one has fully arrived.
    ///
    /// Errors when the declared length exceeds the limit; the stream cannot
    /// be resynchronised after that.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(len) = self.declared_len() else {
            return Ok(None);
        };
        if len > self.max_len {
            return Err(anyhow!(
                "frame of {} bytes exceeds limit of {}",
                len,
                self.max_len
            ));
        }
        let end = self.pos + HEADER_LEN + len as usize;
        if self.buf.len() < end {
            return Ok(None);
        }
        let payload = self.buf[self.pos + HEADER_LEN..end].to_vec();
        self.pos = end;
        self.compact();
        Ok(Some(payload))
    }

    /// Bytes of an incomplete frame are buffered.
    pub fn has_partial(&self) -> bool {
        self.buffered() > 0
    }

    fn declared_len(&self) -> Option<u32> {
        let header: [u8; HEADER_LEN] = self
            .buf
            .get(self.pos..self.pos + HEADER_LEN)?
            .try_into()
            .ok()?;
        Some(u32::from_be_bytes(header))
    }

    /// Drop consumed bytes once they outweigh the pending ones.
    fn compact(&mut self) {
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos >= self.buffered() {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip_over_reader() -> Result<()> {
        for len in [0usize, 1, 3, 4, 5, 1024, 70_000, 1 << 20] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut wire = Vec::new();
            write_frame(&mut wire, &payload)?;
            assert_eq!(&wire[..HEADER_LEN], &(len as u32).to_be_bytes());
            assert_eq!(wire.len(), HEADER_LEN + len);

            let mut reader = Cursor::new(wire);
            let back = read_frame(&mut reader, u32::MAX)?.expect("one frame");
            assert_eq!(back, payload);
            assert!(read_frame(&mut reader, u32::MAX)?.is_none());
        }
        Ok(())
    }

    #[test]
    fn truncated_frames_are_errors() -> Result<()> {
        let wire = encode_frame(b"hello")?;
        let mut short_payload = Cursor::new(wire[..7].to_vec());
        assert!(read_frame(&mut short_payload, 1024).is_err());

        let mut short_header = Cursor::new(wire[..2].to_vec());
        assert!(read_frame(&mut short_header, 1024).is_err());
        Ok(())
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut wire = Cursor::new(100u32.to_be_bytes().to_vec());
        let err = read_frame(&mut wire, 10).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn decoder_handles_byte_at_a_time_delivery() -> Result<()> {
        let mut wire = encode_frame(b"first")?;
        wire.extend(encode_frame(b"")?);
        wire.extend(encode_frame(b"third")?);

        let mut decoder = FrameDecoder::new(64);
        let mut frames = Vec::new();
        for byte in wire {
            decoder.extend(&[byte]);
            while let Some(frame) = decoder.next_frame()? {
                frames.push(frame);
            }
        }
        assert_eq!(
            frames,
            vec![b"first".to_vec(), Vec::new(), b"third".to_vec()]
        );
        assert!(!decoder.has_partial());
        Ok(())
    }

    #[test]
    fn decoder_reports_partial_frames() -> Result<()> {
        let wire = encode_frame(b"payload")?;
        let mut decoder = FrameDecoder::new(64);
        decoder.extend(&wire[..6]);
        assert!(decoder.next_frame()?.is_none());
        assert!(decoder.has_partial());

        let mut big = FrameDecoder::new(4);
        big.extend(&wire);
        assert!(big.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn decoder_tracks_room_and_complete_frames() -> Result<()> {
        let mut wire = Vec::new();
        for _ in 0..3 {
            wire.extend(encode_frame(b"abcd")?);
        }
        let mut decoder = FrameDecoder::new(8);
        assert_eq!(decoder.capacity(), HEADER_LEN + 8);

        decoder.extend(&wire[..decoder.room()]);
        assert_eq!(decoder.buffered(), 12);
        assert_eq!(decoder.room(), 0);
        assert!(decoder.has_frame());

        assert_eq!(decoder.next_frame()?, Some(b"abcd".to_vec()));
        assert_eq!(decoder.buffered(), 4);
        assert!(!decoder.has_frame());

        decoder.extend(&wire[12..]);
        assert_eq!(decoder.next_frame()?, Some(b"abcd".to_vec()));
        assert_eq!(decoder.next_frame()?, Some(b"abcd".to_vec()));
        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.next_frame()?.is_none());
        Ok(())
    }
}
