use crate::error::{Error, Result};
use std::io;
use std::io::Read;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents memory map, ROM, RAM etc.
pub trait MemoryMap {
    /// write unknown len of data into memory at a particular address,
    /// returning how much was written
    fn write_any(&mut self, reader: &mut impl io::Read, addr: u16) -> Result<usize> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        self.write(buf.as_slice(), addr, len)?;
        Ok(len)
    }

    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16, len: usize) -> Result<()> {
        let bytes = self.get_rw_slice(addr, len)?;
        let mut d: &[u8] = data;
        d.read(bytes)?;
        Ok(())
    }

    /// get a two-byte big-endian word (opcodes, stack)
    fn get_word(&self, addr: u16) -> Result<u16> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }

    /// put a two-byte big-endian word
    fn put_word(&mut self, addr: u16, word: u16) -> Result<()> {
        self.get_rw_slice(addr, 2)?
            .copy_from_slice(&word.to_be_bytes());
        Ok(())
    }

    /// get a r/w slice of the underlying memory (heap)
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8]>;

    /// get a r/o slice of the underlying memory (heap)
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8]>;
}

/// Defines the CHIP-8 standard memory map, 4K configuration:
///   0x0000-0x004f  font
///   0x0050-0x01ff  interpreter (unused)
///   0x0200-0x0e9f  program
///   0x0ea0-0x0ecf  stack page; 16 return addresses growing down from 0x0ed0
///   0x0ed0-0x0eff  work area and chip-8 variables (unused)
///   0x0f00-0x0fff  display
///
/// chip-8 programs *should* not access these directly
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub font_addr: u16,
    pub program_addr: u16,
    /// first byte above the stack; the stack pointer starts here
    pub stack_addr: u16,
    /// lowest value the stack pointer may take
    pub stack_limit: u16,
    pub display_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8]> {
        let a = addr as usize;
        self.bytes
            .get_mut(a..a + len)
            .ok_or(Error::AddressOutOfRange { addr, len })
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8]> {
        let a = addr as usize;
        self.bytes
            .get(a..a + len)
            .ok_or(Error::AddressOutOfRange { addr, len })
    }
}

/// how much RAM we have
const CHIP8_RAM_SIZE_BYTES: u16 = 4096;

/// offsets from the top of RAM
const CHIP8_STACK_PAGE_OFFSET: u16 = 0x0160;
const CHIP8_STACK_OFFSET: u16 = 0x0130; // stack grows downward from here
const CHIP8_DISPLAY_OFFSET: u16 = 0x0100;

/// nesting limit for CALL
pub const CHIP8_STACK_DEPTH: u16 = 16;

/// 64x32 pixels at one bit each
pub const CHIP8_DISPLAY_SIZE_BYTES: usize = 0x100;

/// where the program is loaded
const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

impl Chip8MemoryMap {
    /// initialises CHIP-8 with contemporary memory contents
    pub fn new() -> Result<Self> {
        let stack_addr = CHIP8_RAM_SIZE_BYTES - CHIP8_STACK_OFFSET;
        let mut mm = Chip8MemoryMap {
            bytes: vec![0u8; CHIP8_RAM_SIZE_BYTES as usize].into_boxed_slice(),
            font_addr: CHIP8_CONTEMPORARY_FONT_ADDR,
            program_addr: CHIP8_PROGRAM_ADDR,
            stack_addr,
            stack_limit: stack_addr - 2 * CHIP8_STACK_DEPTH,
            display_addr: CHIP8_RAM_SIZE_BYTES - CHIP8_DISPLAY_OFFSET,
        };
        mm.write_font()?;
        Ok(mm)
    }

    /// zero everything and put the font back, as at power-on
    pub fn reset(&mut self) -> Result<()> {
        self.bytes.fill(0);
        self.write_font()
    }

    fn write_font(&mut self) -> Result<()> {
        self.write(
            &CHIP8_CONTEMPORARY_FONT,
            self.font_addr,
            CHIP8_CONTEMPORARY_FONT.len(),
        )
    }

    /// how many bytes of program fit below the stack page
    pub fn program_capacity(&self) -> usize {
        (CHIP8_RAM_SIZE_BYTES - CHIP8_STACK_PAGE_OFFSET - self.program_addr) as usize
    }

    /// load a CHIP-8 program at 0x200
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize> {
        let mut buf = Vec::new();
        let size = reader.read_to_end(&mut buf)?;
        if size == 0 {
            return Err(Error::EmptyProgram);
        }
        let capacity = self.program_capacity();
        if size > capacity {
            return Err(Error::ProgramTooLarge { size, capacity });
        }
        self.write(&buf, self.program_addr, size)?;
        Ok(size)
    }

    /// address of the 5-byte glyph for the low nibble of `digit`
    pub fn font_glyph_addr(&self, digit: u8) -> u16 {
        self.font_addr + CHIP8_FONT_GLYPH_BYTES * (digit & 0x0f) as u16
    }
}

const CHIP8_CONTEMPORARY_FONT_ADDR: u16 = 0x000;
const CHIP8_FONT_GLYPH_BYTES: u16 = 5;
const CHIP8_CONTEMPORARY_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
