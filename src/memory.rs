pub const MEMORY_SIZE: usize = 65536;

#[derive(Clone)]
pub struct Memory {
    data: Box<[u8; MEMORY_SIZE]>, // 64KB flat address space
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            data: Box::new([0; MEMORY_SIZE]),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn read(&self, address: u16) -> u8 {
        self.data[address as usize]
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.data[address as usize] = value;
    }

    /// Copies `bytes` starting at `start_address`. Bytes past 0xFFFF are dropped;
    /// returns how many were written.
    pub fn load(&mut self, bytes: &[u8], start_address: u16) -> usize {
        let start = start_address as usize;
        let end = (start + bytes.len()).min(MEMORY_SIZE);
        let len = end - start;
        self.data[start..end].copy_from_slice(&bytes[..len]);
        len
    }

    // Little-endian 16-bit read
    pub fn read_u16(&self, address: u16) -> u16 {
        let low = self.read(address) as u16;
        let high = self.read(address.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    /// Little-endian read of a pointer stored in page 0; the high byte wraps within the page.
    pub fn read_u16_zero_page(&self, zp: u8) -> u16 {
        let low = self.read(zp as u16) as u16;
        let high = self.read(zp.wrapping_add(1) as u16) as u16;
        (high << 8) | low
    }

    pub fn write_u16(&mut self, address: u16, value: u16) {
        self.write(address, (value & 0xFF) as u8);
        self.write(address.wrapping_add(1), (value >> 8) as u8);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..]
    }

    /// Every address holding a non-zero byte, in ascending order.
    pub fn non_zero(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0)
            .map(|(addr, &value)| (addr as u16, value))
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("non_zero_bytes", &self.non_zero().count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_preserves_surroundings() {
        let mut memory = Memory::new();
        memory.write(0x05FF, 0x11);
        memory.write(0x0603, 0x22);

        let written = memory.load(&[0xA9, 0x42, 0xEA], 0x0600);

        assert_eq!(written, 3);
        assert_eq!(memory.read(0x05FF), 0x11);
        assert_eq!(memory.read(0x0600), 0xA9);
        assert_eq!(memory.read(0x0602), 0xEA);
        assert_eq!(memory.read(0x0603), 0x22);
    }

    #[test]
    fn test_load_truncates_at_top_of_memory() {
        let mut memory = Memory::new();
        let written = memory.load(&[1, 2, 3, 4], 0xFFFE);
        assert_eq!(written, 2);
        assert_eq!(memory.read(0xFFFF), 2);
        assert_eq!(memory.read(0x0000), 0);
    }

    #[test]
    fn test_word_access() {
        let mut memory = Memory::new();
        memory.write_u16(0x1234, 0xBEEF);
        assert_eq!(memory.read(0x1234), 0xEF);
        assert_eq!(memory.read(0x1235), 0xBE);
        assert_eq!(memory.read_u16(0x1234), 0xBEEF);
    }

    #[test]
    fn test_zero_page_pointer_wraps() {
        let mut memory = Memory::new();
        memory.write(0x00FF, 0x34);
        memory.write(0x0000, 0x12);
        memory.write(0x0100, 0x99);
        assert_eq!(memory.read_u16_zero_page(0xFF), 0x1234);
    }

    #[test]
    fn test_non_zero() {
        let mut memory = Memory::new();
        memory.write(0x0200, 0x42);
        memory.write(0x0010, 0x01);
        let bytes: Vec<_> = memory.non_zero().collect();
        assert_eq!(bytes, vec![(0x0010, 0x01), (0x0200, 0x42)]);
    }
}
