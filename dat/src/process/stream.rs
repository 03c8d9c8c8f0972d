use std::io::{ErrorKind, Read};

use anyhow::{Context, Result, bail};

use crate::structs::frame::{FRAME_SIZE, FrameBuf};
use crate::utils::errors::StreamError;

/// Reads whole frames from a byte source.
///
/// A read that ends exactly on a frame boundary is a clean end of input.
/// Anything shorter is a truncated capture and is reported as an error.
///
/// # Example
///
/// ```rust,no_run
/// use dat::process::stream::FrameReader;
///
/// let file = std::fs::File::open("tape.dat")?;
/// for frame in FrameReader::new(file) {
///     let frame = frame?;
///     println!("main-id {:02X?}", &frame[5820..]);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    frames_read: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fills as much of `buf` as the source provides, retrying interrupted reads.
    ///
    /// Returns the number of bytes read; less than a frame means end of input.
    pub fn fill(&mut self, buf: &mut FrameBuf) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < FRAME_SIZE {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == FRAME_SIZE {
            self.frames_read += 1;
        }
        Ok(filled)
    }

    /// Reads the next frame into `buf`, returning `false` at a clean end of input.
    pub fn read_frame(&mut self, buf: &mut FrameBuf) -> Result<bool> {
        let read = self
            .fill(buf)
            .with_context(|| format!("read failed after {} frames", self.frames_read))?;

        match read {
            0 => Ok(false),
            FRAME_SIZE => Ok(true),
            read => bail!(StreamError::PartialFrame {
                read,
                expected: FRAME_SIZE,
            }),
        }
    }

    /// Reads and drops `count` frames; used when the source cannot seek.
    pub fn discard_frames(&mut self, count: u64) -> Result<()> {
        let mut scratch = [0; FRAME_SIZE];
        for _ in 0..count {
            if !self.read_frame(&mut scratch)? {
                bail!(StreamError::NoFrames);
            }
        }
        Ok(())
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<FrameBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut frame = [0; FRAME_SIZE];
        match self.read_frame(&mut frame) {
            Ok(true) => Some(Ok(frame)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Source that returns at most `chunk` bytes and is interrupted once.
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
        interrupted: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = buf.len().min(self.chunk);
            self.data.read(&mut buf[..n])
        }
    }

    #[test]
    fn reads_whole_frames_then_eof() -> Result<()> {
        let mut data = vec![1; FRAME_SIZE];
        data.extend(vec![2; FRAME_SIZE]);
        let mut reader = FrameReader::new(Trickle {
            data: Cursor::new(data),
            chunk: 1000,
            interrupted: false,
        });

        let mut frame = [0; FRAME_SIZE];
        assert!(reader.read_frame(&mut frame)?);
        assert_eq!(frame[FRAME_SIZE - 1], 1);
        assert!(reader.read_frame(&mut frame)?);
        assert_eq!(frame[0], 2);
        assert!(!reader.read_frame(&mut frame)?);
        assert_eq!(reader.frames_read(), 2);
        Ok(())
    }

    #[test]
    fn partial_frame_is_an_error() {
        let reader = FrameReader::new(Cursor::new(vec![0; FRAME_SIZE + 100]));
        let results: Vec<_> = reader.collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StreamError>(),
            Some(StreamError::PartialFrame { read: 100, .. })
        ));
    }

    #[test]
    fn discard_past_end_fails() {
        let mut reader = FrameReader::new(Cursor::new(vec![0; FRAME_SIZE * 2]));
        assert!(reader.discard_frames(2).is_ok());

        let mut reader = FrameReader::new(Cursor::new(vec![0; FRAME_SIZE * 2]));
        assert!(reader.discard_frames(3).is_err());
    }
}
