use core::fmt;

/// An encoded word that does not correspond to any instruction this model
/// recognises.
///
/// The interpreter treats this as fatal for the running program; the region
/// builder treats it as "not translatable" and simply declines to admit the
/// containing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeError {
    /// The address the offending word was fetched from.
    pub addr: u32,
    /// The raw word that failed to decode.
    pub word: u32,
}

impl DecodeError {
    pub const fn new(addr: u32, word: u32) -> Self {
        Self { addr, word }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrecognised instruction encoding {:#010x} at {:#010x}",
            self.word, self.addr
        )
    }
}

impl std::error::Error for DecodeError {}
