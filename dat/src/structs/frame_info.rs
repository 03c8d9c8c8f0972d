//! Per-frame metadata derived by the parser.

use std::fmt::{Display, Formatter};

use chrono::NaiveDateTime;

use crate::structs::frame::{INTERPOLATE_MASK, PNO_BLANK, PNO_END_OF_TAPE};
use crate::structs::subcode::PackTime;
use crate::utils::errors::SubcodeWarning;

/// Whether a frame carries usable audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    #[default]
    Valid,
    /// Audio frame with a reserved channel, sampling rate or encoding code.
    FieldInvalid,
    /// Frame with a non-zero data-id.
    NonAudio,
}

impl Validity {
    pub fn is_audio(self) -> bool {
        match self {
            Validity::Valid | Validity::FieldInvalid => true,
            Validity::NonAudio => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Linear16,
    NonLinear12,
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Encoding::Linear16 => "16-bit linear",
            Encoding::NonLinear12 => "12-bit non-linear",
        })
    }
}

/// Metadata decoded from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub frame_number: u64,
    pub validity: Validity,
    pub channels: u16,
    pub sampling_frequency: u32,
    pub encoding: Encoding,
    pub emphasis: bool,
    pub date_time: Option<NaiveDateTime>,
    pub program_number: Option<u16>,
    /// Program number digits read as hex; carries the tape marker values.
    pub hex_pno: u16,
    pub control_id: u8,
    pub interpolate_flags: u8,
    pub program_time: Option<PackTime>,
    pub absolute_time: Option<PackTime>,
    pub running_time: Option<PackTime>,
    pub bad_packs: usize,
    pub warnings: Vec<SubcodeWarning>,
}

impl FrameInfo {
    /// Placeholder info used before any field is decoded.
    pub fn new(frame_number: u64) -> Self {
        Self {
            frame_number,
            validity: Validity::Valid,
            channels: 2,
            sampling_frequency: 48000,
            encoding: Encoding::Linear16,
            emphasis: false,
            date_time: None,
            program_number: None,
            hex_pno: 0,
            control_id: 0,
            interpolate_flags: 0,
            program_time: None,
            absolute_time: None,
            running_time: None,
            bad_packs: 0,
            warnings: Vec::new(),
        }
    }

    pub fn is_audio(&self) -> bool {
        self.validity.is_audio()
    }

    pub fn is_end_of_tape(&self) -> bool {
        self.hex_pno == PNO_END_OF_TAPE
    }

    pub fn is_blank(&self) -> bool {
        self.hex_pno == PNO_BLANK
    }

    pub fn is_interpolated(&self) -> bool {
        self.interpolate_flags & INTERPOLATE_MASK != 0
    }

    /// Copies the track-defining attributes from `other`.
    pub fn adopt_attributes(&mut self, other: &FrameInfo) {
        self.channels = other.channels;
        self.sampling_frequency = other.sampling_frequency;
        self.encoding = other.encoding;
        self.emphasis = other.emphasis;
        self.program_number = other.program_number;
        self.date_time = other.date_time;
    }
}

impl Display for FrameInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame {} {:?}: {}ch {}Hz {}{}",
            self.frame_number,
            self.validity,
            self.channels,
            self.sampling_frequency,
            self.encoding,
            if self.emphasis { " pre-emphasis" } else { "" },
        )?;
        if let Some(program_number) = self.program_number {
            write!(f, " pno={program_number}")?;
        }
        if let Some(date_time) = self.date_time {
            write!(f, " date={date_time}")?;
        }
        Ok(())
    }
}

#[test]
fn adopt_attributes_keeps_identity() {
    let mut glitch = FrameInfo::new(7);
    glitch.channels = 4;
    glitch.sampling_frequency = 32000;
    glitch.hex_pno = 0x012;

    let mut next = FrameInfo::new(8);
    next.program_number = Some(3);
    glitch.adopt_attributes(&next);

    assert_eq!(glitch.frame_number, 7);
    assert_eq!(glitch.hex_pno, 0x012);
    assert_eq!(glitch.channels, 2);
    assert_eq!(glitch.sampling_frequency, 48000);
    assert_eq!(glitch.program_number, Some(3));
}
