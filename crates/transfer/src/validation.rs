use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a remote file name is a single plain path component.
///
/// Names coming from the store are joined onto a local directory, so they
/// must not be able to point anywhere else.
///
/// Rejects:
/// - Empty names
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - `.` and `..`
/// - Anything with more than one component
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.ends_with(['/', '\\']) => Ok(()),
        (Some(Component::ParentDir | Component::CurDir), None) => Err(
            TransferError::InvalidPath(format!("relative directory not allowed: {name}")),
        ),
        (Some(Component::RootDir | Component::Prefix(_)), _) => Err(TransferError::InvalidPath(
            format!("absolute path not allowed: {name}"),
        )),
        _ => Err(TransferError::InvalidPath(format!(
            "file name must not contain directories: {name}"
        ))),
    }
}
