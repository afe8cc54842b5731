//! Seed files for `data import`: a JSON array of listing payloads.

use std::path::Path;

use crate::listing::ListingInput;
use crate::ConfigError;

/// Read and parse a seed file. Payloads are not validated here; they go
/// through the normal create path on import.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or is not a JSON array
/// of listing objects.
pub fn load_seed_file(path: &Path) -> Result<Vec<ListingInput>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_seed(&content)
}

fn parse_seed(content: &str) -> Result<Vec<ListingInput>, ConfigError> {
    Ok(serde_json::from_str(content)?)
}
