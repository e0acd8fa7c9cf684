//! Utility module
//!
//! Helpers for the fixed-width, NUL-terminated text fields used in
//! Art-Net datagrams.

/// Writes `text` into a fixed field, truncating so a terminating NUL
/// always fits. The rest of the field is zeroed.
pub fn write_name(field: &mut [u8], text: &str) {
    field.fill(0);
    let len = text.len().min(field.len().saturating_sub(1));
    field[..len].copy_from_slice(&text.as_bytes()[..len]);
}

/// Reads a NUL-terminated field. Returns `None` for an empty field.
pub fn read_name(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&field[..end]).into_owned())
}
