//! Length-prefixed framing for exchanging serialized messages over a stream.
//!
//! Each frame is a 4-byte little-endian length followed by that many bytes.
//! End of input before the first length byte is a clean shutdown; any other
//! short read is an error.

use crate::error::{Error, Result};
use std::io::{self, Read, Write};
use tracing::trace;

/// Configuration for framed streams
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest frame body accepted or written, in bytes
    pub max_frame_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 64 * 1024 * 1024,
        }
    }
}

impl FrameConfig {
    /// Creates a new frame config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest frame body accepted or written
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

/// Reads length-prefixed frames
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    config: FrameConfig,
}

impl<R: Read> FrameReader<R> {
    /// Creates a reader with the default configuration
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Creates a reader with a custom configuration
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Reads the next frame body, or `None` once the stream has ended cleanly
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > self.config.max_frame_len {
            return Err(Error::FrameTooLarge {
                len,
                max: self.config.max_frame_len,
            });
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;
        trace!(len, "read frame");
        Ok(Some(body))
    }

    /// Returns the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes length-prefixed frames
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    config: FrameConfig,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a writer with the default configuration
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Creates a writer with a custom configuration
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Writes one frame and flushes the underlying writer
    pub fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        let max = self.config.max_frame_len.min(u32::MAX as usize);
        if body.len() > max {
            return Err(Error::FrameTooLarge {
                len: body.len(),
                max,
            });
        }
        self.inner.write_all(&(body.len() as u32).to_le_bytes())?;
        self.inner.write_all(body)?;
        self.inner.flush()?;
        trace!(len = body.len(), "wrote frame");
        Ok(())
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(b"hello").unwrap();
        writer.write_frame(b"").unwrap();
        let bytes = writer.into_inner();
        assert_eq!(&bytes[..4], &5u32.to_le_bytes());

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(reader.read_frame().unwrap().as_deref(), Some(&b""[..]));
        assert_eq!(reader.read_frame().unwrap(), None);
    }

    #[test]
    fn test_short_header_is_error() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x05, 0x00]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_short_body_is_error() {
        let mut data = 4u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"ab");
        let mut reader = FrameReader::new(Cursor::new(data));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_frame_too_large() {
        let data = 100u32.to_le_bytes().to_vec();
        let config = FrameConfig::new().max_frame_len(10);
        let mut reader = FrameReader::with_config(Cursor::new(data), config.clone());
        assert!(matches!(
            reader.read_frame(),
            Err(Error::FrameTooLarge { len: 100, max: 10 })
        ));

        let mut writer = FrameWriter::with_config(Vec::new(), config);
        assert!(writer.write_frame(&[0; 11]).is_err());
        assert!(writer.into_inner().is_empty());
    }
}
