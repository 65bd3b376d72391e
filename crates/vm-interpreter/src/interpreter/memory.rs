// Copyright 2024 Warren Project Developers. All rights reserved.
// Warren is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

use warren_types::U256;
use warren_vm_types::ReturnData;

/// Byte-addressed VM memory. Expansion is charged by the gasometer before
/// `expand` is called, so growth here is unconditional.
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self { Memory { data: Vec::new() } }

    pub fn size(&self) -> usize { self.data.len() }

    /// Grow to at least `size` bytes, rounded up to a 32-byte boundary.
    pub fn expand(&mut self, size: usize) {
        let size = size.div_ceil(32) * 32;
        if size > self.data.len() {
            self.data.resize(size, 0);
        }
    }

    /// Read a 32-byte big-endian word at `offset`.
    pub fn read(&self, offset: usize) -> U256 {
        U256::from_big_endian(&self.data[offset..offset + 32])
    }

    /// Write a 32-byte big-endian word at `offset`.
    pub fn write(&mut self, offset: usize, value: U256) {
        value.to_big_endian(&mut self.data[offset..offset + 32]);
    }

    pub fn write_byte(&mut self, offset: usize, value: U256) {
        self.data[offset] = value.low_u64() as u8;
    }

    pub fn read_slice(&self, offset: usize, size: usize) -> &[u8] {
        if size == 0 {
            &[]
        } else {
            &self.data[offset..offset + size]
        }
    }

    /// Copy `data` to `offset`, zero-filling up to `size` when `data` is
    /// shorter.
    pub fn write_slice(&mut self, offset: usize, data: &[u8]) {
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Consume the memory into a return data buffer over `[offset, size)`.
    pub fn into_return_data(self, offset: usize, size: usize) -> ReturnData {
        ReturnData::new(self.data, offset, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_rounds_to_words() {
        let mut mem = Memory::new();
        mem.expand(1);
        assert_eq!(mem.size(), 32);
        mem.expand(33);
        assert_eq!(mem.size(), 64);
        mem.expand(5);
        assert_eq!(mem.size(), 64);
    }

    #[test]
    fn word_round_trip() {
        let mut mem = Memory::new();
        mem.expand(64);
        mem.write(32, U256::from(0xdead_beefu64));
        assert_eq!(mem.read(32), U256::from(0xdead_beefu64));
        assert_eq!(mem.read(0), U256::zero());
    }
}
