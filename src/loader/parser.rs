use serde::de::DeserializeOwned;
use std::fs;

use crate::error::Result;

/// Parses a JSON file into a given type `T`.
///
/// This function reads a file from `file_path`, attempts to parse it
/// as JSON, and returns an instance of `T`.
///
/// Errors are automatically converted into `crate::error::CoreError` variants:
/// - `CheckpointIoError` if the file cannot be read.
/// - `ModelConstructionError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    let parsed_data: T = serde_json::from_str(&data)?;
    Ok(parsed_data)
}

/// Reads a file into a string, returning `None` (with a logged error)
/// instead of propagating, for call sites that only need a best-effort
/// load (mirrors the teacher's `get_json_as_str` demo helper).
pub fn get_json_as_str(file_path: &str) -> Option<String> {
    match fs::read_to_string(file_path) {
        Ok(s) => Some(s),
        Err(e) => {
            log::error!("Failed to read '{}': {}", file_path, e);
            None
        }
    }
}
