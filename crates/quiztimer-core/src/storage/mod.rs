mod config;
pub mod database;
pub mod memory;

pub use config::{ApiConfig, Config, ConflictPolicy, MessagesConfig, RoutesConfig, TimerConfig};
pub use database::SqliteBackend;
pub use memory::MemoryBackend;

use std::path::PathBuf;

use crate::error::StoreError;

/// Durable key/value storage the deadline store persists into.
///
/// Values are opaque text; the store owns the encoding. `remove` on a
/// missing key must succeed.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Returns the quiztimer data directory.
///
/// `QUIZTIMER_DATA_DIR` wins when set. Otherwise this is
/// `~/.config/quiztimer[-dev]/` based on QUIZTIMER_ENV.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("QUIZTIMER_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env =
                std::env::var("QUIZTIMER_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("quiztimer-dev")
            } else {
                base_dir.join("quiztimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
