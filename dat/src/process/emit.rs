use anyhow::{Result, bail};

use crate::structs::frame::{
    FrameBuf, SOUND_DATA_SIZE_32KHZ_NONLINEAR_UNPACKED, SOUND_DATA_SIZE_32KHZ_PCM,
    SOUND_DATA_SIZE_44_1KHZ, SOUND_DATA_SIZE_48KHZ,
};
use crate::structs::frame_info::Encoding;
use crate::utils::errors::TrackError;
use crate::utils::tables::{DECODE_LP_SAMPLE, NONLINEAR_PACKED_SIZE, TRANSLATE_LP_FRAME_INDEX};

/// Produces the little-endian 16-bit sample bytes of one frame.
#[derive(Debug)]
pub struct AudioEmitter {
    unpacked: Vec<u8>,
}

impl Default for AudioEmitter {
    fn default() -> Self {
        Self {
            unpacked: Vec::with_capacity(SOUND_DATA_SIZE_32KHZ_NONLINEAR_UNPACKED),
        }
    }
}

impl AudioEmitter {
    /// Returns the sample bytes of `frame` in the track's resolved format.
    ///
    /// Linear frames are emitted verbatim as a rate-dependent prefix of the
    /// sample region. Non-linear frames are expanded into an internal buffer.
    pub fn emit<'a>(
        &'a mut self,
        frame: &'a FrameBuf,
        encoding: Encoding,
        sampling_frequency: u32,
    ) -> Result<&'a [u8]> {
        match encoding {
            Encoding::Linear16 => {
                let n = match sampling_frequency {
                    48000 => SOUND_DATA_SIZE_48KHZ,
                    44100 => SOUND_DATA_SIZE_44_1KHZ,
                    32000 => SOUND_DATA_SIZE_32KHZ_PCM,
                    other => bail!(TrackError::InvalidSamplingFrequency(other)),
                };
                Ok(&frame[..n])
            }
            Encoding::NonLinear12 => {
                self.unpack_nonlinear(frame);
                Ok(self.unpacked.as_slice())
            }
        }
    }

    fn unpack_nonlinear(&mut self, frame: &FrameBuf) {
        self.unpacked.clear();

        for triple in TRANSLATE_LP_FRAME_INDEX[..NONLINEAR_PACKED_SIZE].chunks_exact(3) {
            let x0 = frame[triple[0] as usize] as usize;
            let x1 = frame[triple[1] as usize] as usize;
            let x2 = frame[triple[2] as usize] as usize;

            let s0 = DECODE_LP_SAMPLE[(x0 << 4) | (x1 >> 4)];
            let s1 = DECODE_LP_SAMPLE[(x2 << 4) | (x1 & 0x0F)];
            self.unpacked.extend_from_slice(&s0.to_le_bytes());
            self.unpacked.extend_from_slice(&s1.to_le_bytes());
        }
    }
}

/// Number of sample frames carried by `bytes` of 16-bit audio.
#[inline(always)]
pub fn samples_in(bytes: usize, channels: u16) -> u64 {
    (bytes / (2 * channels as usize)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::frame::FRAME_SIZE;

    #[test]
    fn linear_prefix_sizes() -> Result<()> {
        let mut emitter = AudioEmitter::default();
        let frame = [0x5A; FRAME_SIZE];

        assert_eq!(emitter.emit(&frame, Encoding::Linear16, 48000)?.len(), 5760);
        assert_eq!(emitter.emit(&frame, Encoding::Linear16, 44100)?.len(), 5292);
        assert_eq!(emitter.emit(&frame, Encoding::Linear16, 32000)?.len(), 3840);
        assert!(emitter.emit(&frame, Encoding::Linear16, 22050).is_err());
        Ok(())
    }

    #[test]
    fn nonlinear_expands_through_tables() -> Result<()> {
        let mut emitter = AudioEmitter::default();
        let mut frame = [0; FRAME_SIZE];
        // first triple is read from bytes 1, 0 and 9
        frame[1] = 0x00;
        frame[0] = 0x12;
        frame[9] = 0x03;

        let bytes = emitter.emit(&frame, Encoding::NonLinear12, 32000)?;
        assert_eq!(bytes.len(), SOUND_DATA_SIZE_32KHZ_NONLINEAR_UNPACKED);
        assert_eq!(&bytes[..4], &[1, 0, 50, 0]);
        Ok(())
    }

    #[test]
    fn sample_counts() {
        assert_eq!(samples_in(5760, 2), 1440);
        assert_eq!(samples_in(5760, 4), 720);
        assert_eq!(samples_in(7680, 2), 1920);
    }
}
