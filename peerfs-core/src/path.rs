use crate::error::{PeerfsError, Result};

/// Directory under the data dir that holds the metadata db and scratch files.
pub const RESERVED_DIR: &str = ".peerfs";

/// Normalize a caller supplied path into the relative form used as catalog key.
pub fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(PeerfsError::InvalidRequest(
            "file path cannot be empty".to_string(),
        ));
    }

    let mut components = Vec::new();
    for component in trimmed.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(PeerfsError::InvalidRequest(format!(
                "invalid file path component: '{}'",
                component
            )));
        }
        components.push(component);
    }

    if components[0] == RESERVED_DIR {
        return Err(PeerfsError::InvalidRequest(format!(
            "file path cannot start with reserved directory {}",
            RESERVED_DIR
        )));
    }

    Ok(components.join("/"))
}
