//! Bounds-checked cursor over command data
//!
//! Every field read either succeeds or aborts the command with `WrongLength`,
//! so handlers can parse a whole payload before touching any state.

use super::error::CardError;

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, CardError> {
        let byte = *self.data.get(self.pos).ok_or(CardError::WrongLength)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CardError> {
        let end = self.pos.checked_add(len).ok_or(CardError::WrongLength)?;
        let bytes = self.data.get(self.pos..end).ok_or(CardError::WrongLength)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CardError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// A length byte followed by that many bytes
    pub fn read_length_prefixed(&mut self) -> Result<&'a [u8], CardError> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x02, 0xAA, 0xBB, 0x01, 0x02, 0x03];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_length_prefixed().unwrap(), &[0xAA, 0xBB]);
        assert_eq!(r.read_array::<3>().unwrap(), [0x01, 0x02, 0x03]);
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.read_u8(), Err(CardError::WrongLength));
    }

    #[test]
    fn test_declared_length_exceeds_data() {
        let mut r = Reader::new(&[0x05, 0x31, 0x32]);
        assert_eq!(r.read_length_prefixed(), Err(CardError::WrongLength));
    }

    #[test]
    fn test_empty_input() {
        let mut r = Reader::new(&[]);
        assert_eq!(r.read_length_prefixed(), Err(CardError::WrongLength));
        assert_eq!(r.read_bytes(0).unwrap(), &[] as &[u8]);
    }
}
