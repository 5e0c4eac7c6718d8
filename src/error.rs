use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the interpreter
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("unknown opcode 0x{opcode:04x} at 0x{pc:03x}")]
    UnknownOpcode { opcode: u16, pc: u16 },

    #[error("call stack overflow at 0x{pc:03x}")]
    StackOverflow { pc: u16 },

    #[error("return with empty call stack at 0x{pc:03x}")]
    StackUnderflow { pc: u16 },

    #[error("access of {len} byte(s) at 0x{addr:04x} is outside memory")]
    AddressOutOfRange { addr: u16, len: usize },

    #[error("program is {size} bytes; only {capacity} bytes fit in memory")]
    ProgramTooLarge { size: usize, capacity: usize },

    #[error("program is empty")]
    EmptyProgram,

    #[error("display wants {actual} bytes of frame data, interpreter provides {expected}")]
    DisplaySize { expected: usize, actual: usize },

    #[error("sound device: {0}")]
    Sound(String),

    #[error("invalid config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
