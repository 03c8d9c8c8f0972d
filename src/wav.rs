use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use readdat_macros::{ToBytes, riff_chunk};

use crate::join_bytes_le;

/// Size of the RIFF, fmt and data headers preceding the samples.
pub const WAV_HEADER_SIZE: usize = 44;

const BYTES_PER_SAMPLE: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const WAVE_FORMAT_PCM: u16 = 1;

pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    fn write_all<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let chunk_data = self.chunk_data();
        writer.write_all(self.chunk_id())?;
        writer.write_all(&(chunk_data.len() as u32).to_le_bytes())?;
        writer.write_all(&chunk_data)?;

        Ok(())
    }
}

#[derive(Debug, ToBytes)]
#[riff_chunk(b"fmt ")]
pub struct FormatChunk {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatChunk {
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        let block_align = channels * BYTES_PER_SAMPLE;
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }
}

/// Builds the 44-byte header for `samples` sample frames of 16-bit PCM.
///
/// Sizes above the 32-bit limit of the format are clamped.
pub fn wav_header(samples: u64, channels: u16, sample_rate: u32) -> io::Result<Vec<u8>> {
    let data_size = samples * channels as u64 * BYTES_PER_SAMPLE as u64;
    let data_size = u32::try_from(data_size).unwrap_or(u32::MAX);

    let mut header = join_bytes_le!(*b"RIFF", data_size.saturating_add(36), *b"WAVE");
    FormatChunk::pcm16(sample_rate, channels).write_all(&mut header)?;
    header.extend(join_bytes_le!(*b"data", data_size));

    Ok(header)
}

/// 16-bit PCM WAV writer whose header is rewritten once the length is known.
pub struct WAVWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    sample_rate: u32,
    channels: u16,
    data_written: u64,
}

impl<W: Write + Seek> WAVWriter<W> {
    pub fn new(writer: W, sample_rate: u32, channels: u16) -> Self {
        Self {
            writer: BufWriter::new(writer),
            sample_rate,
            channels,
            data_written: 0,
        }
    }

    /// Writes a header describing zero samples.
    pub fn write_header(&mut self) -> io::Result<()> {
        let header = wav_header(0, self.channels, self.sample_rate)?;
        self.writer.write_all(&header)
    }

    /// Appends little-endian 16-bit sample bytes.
    pub fn write_samples(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.data_written += bytes.len() as u64;
        Ok(())
    }

    /// Rewrites the header for `samples` sample frames and flushes.
    pub fn finish(&mut self, samples: u64) -> io::Result<()> {
        self.writer.flush()?;

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;
        let header = wav_header(samples, self.channels, self.sample_rate)?;
        self.writer.write_all(&header)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    pub fn data_written(&self) -> u64 {
        self.data_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(buffer: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(buffer: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(buffer[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn header_layout() -> io::Result<()> {
        let header = wav_header(1440, 2, 48000)?;

        assert_eq!(header.len(), WAV_HEADER_SIZE);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32_at(&header, 4), 36 + 5760);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&header, 16), 16);
        assert_eq!(u16_at(&header, 20), 1);
        assert_eq!(u16_at(&header, 22), 2);
        assert_eq!(u32_at(&header, 24), 48000);
        assert_eq!(u32_at(&header, 28), 192000);
        assert_eq!(u16_at(&header, 32), 4);
        assert_eq!(u16_at(&header, 34), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32_at(&header, 40), 5760);
        Ok(())
    }

    #[test]
    fn oversized_data_is_clamped() -> io::Result<()> {
        let header = wav_header(u32::MAX as u64, 2, 48000)?;
        assert_eq!(u32_at(&header, 4), u32::MAX);
        assert_eq!(u32_at(&header, 40), u32::MAX);
        Ok(())
    }

    #[test]
    fn finish_rewrites_sizes() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()), 32000, 4);
        writer.write_header()?;
        writer.write_samples(&[0x11; 7680])?;
        assert_eq!(writer.data_written(), 7680);

        writer.finish(960)?;
        let buffer = writer.into_inner()?.into_inner();

        assert_eq!(buffer.len(), WAV_HEADER_SIZE + 7680);
        assert_eq!(u32_at(&buffer, 4), 36 + 7680);
        assert_eq!(u16_at(&buffer, 22), 4);
        assert_eq!(u32_at(&buffer, 40), 7680);
        assert_eq!(buffer[WAV_HEADER_SIZE], 0x11);
        Ok(())
    }
}
