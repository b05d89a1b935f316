//! MSB-first bit cursor for compressed accelerometer deltas

/// Reads values packed from the high bit of the first byte downwards
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Read `nbits` (1..=8) as an unsigned value
    pub fn read(&mut self, nbits: u8) -> Option<u8> {
        let nbits = nbits as usize;
        if nbits == 0 || nbits > 8 || self.pos + nbits > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u8;
        for _ in 0..nbits {
            let byte = self.data[self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | bit;
            self.pos += 1;
        }
        Some(value)
    }

    /// Read `nbits` and sign-extend from the top bit of the field
    pub fn read_signed(&mut self, nbits: u8) -> Option<i8> {
        let raw = self.read(nbits)?;
        let shift = 8 - nbits as u32;
        Some(((raw << shift) as i8) >> shift)
    }

    pub fn bits_left(&self) -> usize {
        self.data.len() * 8 - self.pos
    }
}

/// Packs values MSB-first, the inverse of [`BitReader`]
#[cfg(test)]
pub struct BitWriter {
    bytes: std::vec::Vec<u8>,
    pos: usize,
}

#[cfg(test)]
impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: std::vec::Vec::new(),
            pos: 0,
        }
    }

    /// Append the low `nbits` of `value`
    pub fn write(&mut self, value: i8, nbits: u8) {
        for i in (0..nbits).rev() {
            if self.pos % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value as u8) >> i) & 1;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= bit << (7 - self.pos % 8);
            self.pos += 1;
        }
    }

    pub fn finish(self) -> std::vec::Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first() {
        let data = [0b1010_0110, 0b1100_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(3), Some(0b101));
        assert_eq!(reader.read(3), Some(0b001));
        assert_eq!(reader.read(4), Some(0b1011));
        assert_eq!(reader.bits_left(), 6);
        assert_eq!(reader.read(8), None);
    }

    #[test]
    fn test_sign_extension() {
        // -1 in 3 bits, 3 in 3 bits, -4 in 3 bits
        let data = [0b111_011_10, 0b0000_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_signed(3), Some(-1));
        assert_eq!(reader.read_signed(3), Some(3));
        assert_eq!(reader.read_signed(3), Some(-4));

        let mut reader = BitReader::new(&[0x80]);
        assert_eq!(reader.read_signed(8), Some(-128));
    }

    #[test]
    fn test_writer_reader_agree() {
        for width in [3u8, 4, 5, 6, 8] {
            let min = -(1i16 << (width - 1));
            let max = (1i16 << (width - 1)) - 1;
            let values: std::vec::Vec<i8> = (min..=max).map(|v| v as i8).collect();

            let mut writer = BitWriter::new();
            for &v in &values {
                writer.write(v, width);
            }
            let bytes = writer.finish();

            let mut reader = BitReader::new(&bytes);
            for &v in &values {
                assert_eq!(reader.read_signed(width), Some(v), "width {}", width);
            }
        }
    }
}
