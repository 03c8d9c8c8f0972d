//! Bit-field reader for the frame identification words.
//!
//! The main-id and sub-id words pack their fields starting from the least
//! significant bit of each byte, so the reader uses little-endian bit order.

use std::io;

use bitstream_io::{BitRead, BitReader, LittleEndian, UnsignedInteger};

#[derive(Debug)]
pub struct IdWordReader<'a> {
    bs: BitReader<io::Cursor<&'a [u8]>, LittleEndian>,
    len: u64,
}

impl<'a> IdWordReader<'a> {
    pub fn new(word: &'a [u8]) -> Self {
        Self {
            bs: BitReader::new(io::Cursor::new(word)),
            len: (word.len() as u64) << 3,
        }
    }

    /// Reads the next `n`-bit field.
    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("id field of {n} bits at bit {}", self.position()),
            )),
            Err(e) => Err(e),
        }
    }

    pub fn available(&mut self) -> u64 {
        self.len - self.position()
    }

    fn position(&mut self) -> u64 {
        self.bs.position_in_bits().unwrap_or(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_from_least_significant_bit() -> io::Result<()> {
        // 0b11_10_01_00 then 0xA5
        let mut reader = IdWordReader::new(&[0xE4, 0xA5]);

        assert_eq!(reader.get_n::<u8>(2)?, 0);
        assert_eq!(reader.get_n::<u8>(2)?, 1);
        assert_eq!(reader.get_n::<u8>(2)?, 2);
        assert_eq!(reader.get_n::<u8>(2)?, 3);
        assert_eq!(reader.get_n::<u8>(4)?, 0x5);
        assert_eq!(reader.get_n::<u8>(4)?, 0xA);
        assert_eq!(reader.available(), 0);

        Ok(())
    }

    #[test]
    fn out_of_bounds_read_fails() {
        let mut reader = IdWordReader::new(&[0xFF]);
        assert_eq!(reader.get_n::<u8>(4).ok(), Some(0xF));
        assert_eq!(reader.available(), 4);
        assert!(reader.get_n::<u8>(8).is_err());
    }
}
