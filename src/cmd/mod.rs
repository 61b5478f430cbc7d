pub mod check;
pub mod cues;
pub mod next;
pub mod render;

use std::path::Path;

use anyhow::Result;

use reelsmith::Config;

/// Explicit config file, or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
