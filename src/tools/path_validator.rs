use crate::error::SplitError;
use std::fs;
use std::path::Path;

pub fn validate_file_exists(path: &Path) -> Result<(), SplitError> {
    if !path.exists() {
        return Err(SplitError::InvalidConfig(format!(
            "path does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(SplitError::InvalidConfig(format!(
            "path is not a file: {}",
            path.display()
        )));
    }
    Ok(())
}

pub fn ensure_directory_exists(path: &Path) -> Result<(), SplitError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            SplitError::io(format!("cannot create directory {}", path.display()), e)
        })?;
    }
    Ok(())
}

/// Zero-length files count as missing.
#[must_use]
pub fn has_content(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}
