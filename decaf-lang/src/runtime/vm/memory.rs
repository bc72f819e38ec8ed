use crate::runtime::ErrorKind;
use crate::symbol::WORD_SIZE;

const WORD: usize = WORD_SIZE as usize;

/// Byte-addressed memory holding big-endian words.
#[derive(Clone, Debug, PartialEq)]
pub struct Memory(Vec<u8>);

impl Memory {
    pub fn new(size: usize) -> Self {
        Self(vec![0; size])
    }
    pub fn size(&self) -> usize {
        self.0.len()
    }
    pub fn clear(&mut self) {
        self.0.fill(0);
    }
    fn range(&self, addr: i32) -> Result<std::ops::Range<usize>, ErrorKind> {
        usize::try_from(addr)
            .ok()
            .filter(|a| a + WORD <= self.0.len())
            .map(|a| a..a + WORD)
            .ok_or(ErrorKind::MemoryOutOfRange(addr))
    }
    pub fn load(&self, addr: i32) -> Result<i32, ErrorKind> {
        let range = self.range(addr)?;
        let mut word = [0u8; WORD];
        word.copy_from_slice(&self.0[range]);
        Ok(i32::from_be_bytes(word))
    }
    pub fn store(&mut self, addr: i32, value: i32) -> Result<(), ErrorKind> {
        let range = self.range(addr)?;
        self.0[range].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}
