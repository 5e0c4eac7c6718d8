use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// a ROM image as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gamefile {
    pub bytecode: Vec<u8>,
}

impl Gamefile {
    pub fn new(bytecode: Vec<u8>) -> Self {
        Gamefile { bytecode }
    }

    pub fn is_valid(&self) -> bool {
        !self.bytecode.is_empty()
    }

    pub fn size(&self) -> usize {
        self.bytecode.len()
    }

    /// read a whole ROM file; empty files are rejected
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Gamefile> {
        let path = path.as_ref();
        let gamefile = Gamefile::new(fs::read(path)?);
        if !gamefile.is_valid() {
            return Err(Error::EmptyProgram);
        }
        info!(path = %path.display(), size = gamefile.size(), "read ROM");
        Ok(gamefile)
    }
}
