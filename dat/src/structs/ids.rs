//! Main-id and sub-id words.
//!
//! ## Main-id (2 bytes)
//!
//! Byte 0, from bit 0: channels(2), samplerate(2), emphasis(2), fmtid(2).
//! Byte 1, from bit 0: datapacket(2), scms(2), width(2), encoding(2).
//!
//! ## Sub-id (4 bytes)
//!
//! Byte 0: data-id in the low nibble, control-id in the high nibble.
//! Byte 1: pack count in the low nibble, first program number digit in the high nibble.
//! Byte 2: second program number digit in the high nibble, third in the low nibble.
//! Byte 3: interpolation flags.

use std::fmt::{Display, Formatter};

use anyhow::Result;
use log::trace;

use crate::structs::frame::{FrameBuf, FrameLayout, INTERPOLATE_MASK, PNO_BLANK, PNO_END_OF_TAPE};
use crate::utils::bitstream_io::IdWordReader;

pub const CTRL_PRIO: u8 = 8;
pub const CTRL_START: u8 = 4;
pub const CTRL_SKIP: u8 = 2;
pub const CTRL_TOC: u8 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MainId {
    pub channels: u8,
    pub samplerate: u8,
    pub emphasis: u8,
    pub fmtid: u8,
    pub datapacket: u8,
    pub scms: u8,
    pub width: u8,
    pub encoding: u8,
}

impl MainId {
    pub fn read(frame: &FrameBuf) -> Result<Self> {
        let reader = &mut IdWordReader::new(frame.main_id());

        Ok(Self {
            channels: reader.get_n(2)?,
            samplerate: reader.get_n(2)?,
            emphasis: reader.get_n(2)?,
            fmtid: reader.get_n(2)?,
            datapacket: reader.get_n(2)?,
            scms: reader.get_n(2)?,
            width: reader.get_n(2)?,
            encoding: reader.get_n(2)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubId {
    pub data_id: u8,
    pub control_id: u8,
    pub numpacks: u8,
    pub pno: [u8; 3],
    pub interpolate_flags: u8,
}

impl SubId {
    pub fn read(frame: &FrameBuf) -> Result<Self> {
        let reader = &mut IdWordReader::new(frame.sub_id());

        let data_id = reader.get_n(4)?;
        let control_id = reader.get_n(4)?;
        let numpacks = reader.get_n(4)?;
        let pno1 = reader.get_n(4)?;
        let pno3 = reader.get_n(4)?;
        let pno2 = reader.get_n(4)?;
        let interpolate_flags = reader.get_n(8)?;

        let sub_id = Self {
            data_id,
            control_id,
            numpacks,
            pno: [pno1, pno2, pno3],
            interpolate_flags,
        };
        trace!("{sub_id}");

        Ok(sub_id)
    }

    /// Program number digits read as hex, used for the tape marker values.
    pub fn hex_pno(&self) -> u16 {
        let [a, b, c] = self.pno;
        ((a as u16) << 8) | ((b as u16) << 4) | c as u16
    }

    /// BCD program number, present only on start frames with valid digits.
    pub fn program_number(&self) -> Option<u16> {
        let start = self.control_id & CTRL_START != 0 && self.control_id & CTRL_PRIO != 0;
        if !start || self.pno.iter().any(|&digit| digit > 9) {
            return None;
        }

        let [a, b, c] = self.pno;
        Some(a as u16 * 100 + b as u16 * 10 + c as u16)
    }

    pub fn is_end_of_tape(&self) -> bool {
        self.hex_pno() == PNO_END_OF_TAPE
    }

    pub fn is_blank(&self) -> bool {
        self.hex_pno() == PNO_BLANK
    }

    pub fn is_interpolated(&self) -> bool {
        self.interpolate_flags & INTERPOLATE_MASK != 0
    }
}

impl Display for SubId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dataid={} ctrlid={:#X}{}{}{}{} numpacks={} pno={:03x} interpolate={:#04X}",
            self.data_id,
            self.control_id,
            if self.control_id & CTRL_PRIO != 0 { " PRIO" } else { "" },
            if self.control_id & CTRL_START != 0 { " START" } else { "" },
            if self.control_id & CTRL_SKIP != 0 { " SKIP" } else { "" },
            if self.control_id & CTRL_TOC != 0 { " TOC" } else { "" },
            self.numpacks,
            self.hex_pno(),
            self.interpolate_flags,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::frame::{FRAME_SIZE, MAINID_OFFSET, SUBID_OFFSET};

    fn frame_with_ids(sub_id: [u8; 4], main_id: [u8; 2]) -> FrameBuf {
        let mut frame = [0; FRAME_SIZE];
        frame[SUBID_OFFSET..SUBID_OFFSET + 4].copy_from_slice(&sub_id);
        frame[MAINID_OFFSET..].copy_from_slice(&main_id);
        frame
    }

    #[test]
    fn main_id_fields() -> Result<()> {
        // channels=1 samplerate=2 emphasis=1 fmtid=0 / datapacket=0 scms=2 width=0 encoding=1
        let frame = frame_with_ids([0; 4], [0b00_01_10_01, 0b01_00_10_00]);
        let main_id = MainId::read(&frame)?;

        assert_eq!(main_id.channels, 1);
        assert_eq!(main_id.samplerate, 2);
        assert_eq!(main_id.emphasis, 1);
        assert_eq!(main_id.fmtid, 0);
        assert_eq!(main_id.datapacket, 0);
        assert_eq!(main_id.scms, 2);
        assert_eq!(main_id.width, 0);
        assert_eq!(main_id.encoding, 1);
        Ok(())
    }

    #[test]
    fn program_number_requires_start_and_priority() -> Result<()> {
        let frame = frame_with_ids([0xC0, 0x03, 0x42, 0x00], [0; 2]);
        let sub_id = SubId::read(&frame)?;
        assert_eq!(sub_id.numpacks, 3);
        assert_eq!(sub_id.hex_pno(), 0x042);
        assert_eq!(sub_id.program_number(), Some(42));

        let frame = frame_with_ids([0x80, 0x00, 0x42, 0x00], [0; 2]);
        assert_eq!(SubId::read(&frame)?.program_number(), None);

        let frame = frame_with_ids([0xC0, 0x00, 0x4A, 0x00], [0; 2]);
        assert_eq!(SubId::read(&frame)?.program_number(), None);
        Ok(())
    }

    #[test]
    fn tape_markers() -> Result<()> {
        let frame = frame_with_ids([0x00, 0x00, 0xEE, 0x60], [0; 2]);
        let sub_id = SubId::read(&frame)?;
        assert!(sub_id.is_end_of_tape());
        assert!(sub_id.is_interpolated());

        let frame = frame_with_ids([0x00, 0x00, 0xBB, 0x80], [0; 2]);
        let sub_id = SubId::read(&frame)?;
        assert!(sub_id.is_blank());
        assert!(!sub_id.is_interpolated());
        Ok(())
    }
}
