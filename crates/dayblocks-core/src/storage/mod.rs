mod config;
pub mod database;
mod memory;

pub use config::Config;
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::block::Block;
use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `DAYBLOCKS_DATA_DIR` wins when set. Otherwise `~/.config/dayblocks[-dev]/`
/// based on `DAYBLOCKS_ENV` (set it to `dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("DAYBLOCKS_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DAYBLOCKS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("dayblocks-dev")
            } else {
                base_dir.join("dayblocks")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Persistence collaborator for blocks.
///
/// Writes are idempotent upserts keyed by (user, date, block index); the
/// last writer wins. Implementations must not merge fields themselves.
pub trait BlockStore {
    fn upsert(&self, block: &Block) -> Result<()>;

    /// Every stored block of a day, in index order. Missing indices are
    /// simply absent.
    fn fetch_day(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Block>>;

    fn fetch_block(&self, user_id: &str, date: NaiveDate, block_index: u8) -> Result<Option<Block>> {
        Ok(self
            .fetch_day(user_id, date)?
            .into_iter()
            .find(|b| b.block_index == block_index))
    }
}

impl<S: BlockStore + ?Sized> BlockStore for &S {
    fn upsert(&self, block: &Block) -> Result<()> {
        (**self).upsert(block)
    }

    fn fetch_day(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Block>> {
        (**self).fetch_day(user_id, date)
    }

    fn fetch_block(&self, user_id: &str, date: NaiveDate, block_index: u8) -> Result<Option<Block>> {
        (**self).fetch_block(user_id, date, block_index)
    }
}
