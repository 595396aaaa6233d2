use thiserror::Error;

use crate::isa::MEMORY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("address {0} is outside data memory")]
pub struct AddressOutOfRange(pub i64);

/// Data memory. Addresses come straight from instruction operands, so
/// every access is bounds checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    data: [u8; MEMORY_SIZE], // 64 cells
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }

    fn slot(address: i64) -> Option<usize> {
        usize::try_from(address).ok().filter(|&a| a < MEMORY_SIZE)
    }

    pub fn read(&self, address: i64) -> Option<u8> {
        Self::slot(address).map(|a| self.data[a])
    }

    /// Nothing is written when the address is out of range.
    pub fn write(&mut self, address: i64, value: u8) -> Result<(), AddressOutOfRange> {
        let a = Self::slot(address).ok_or(AddressOutOfRange(address))?;
        self.data[a] = value;
        Ok(())
    }

    pub fn cells(&self) -> &[u8] {
        &self.data
    }

    // (address, value) pairs for every non-zero cell
    pub fn non_zero(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0)
            .map(|(address, &value)| (address, value))
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
