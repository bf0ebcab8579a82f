//! tempest-datagen: self-play game generation in the MontyFormat record
//! layout, plus the seeded `genfens` opening generator.

pub mod driver;
pub mod format;
pub mod writer;

pub use driver::{
    gen_fens, run, DatagenConfig, DatagenError, GENFENS_VERIFY_NODES, HASH_PER_WORKER_MB,
    RAND_MOVES,
};
pub use format::{pack_move, FormatError, GameRecord, PackedBoard, RecordedMove};
pub use writer::{GameWriter, WriterError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Datagen records are little-endian on disk; refuse to generate
/// elsewhere.
pub fn check_host_endianness() -> Result<(), &'static str> {
    if cfg!(target_endian = "little") {
        Ok(())
    } else {
        Err("datagen requires a little-endian host")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn this_test_host_is_little_endian() {
        assert!(check_host_endianness().is_ok());
    }
}
