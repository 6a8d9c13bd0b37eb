//! Small helpers shared by the format and export layers.

use encoding_rs::{Encoding, WINDOWS_1252};
use log::warn;

/// AMC files are written by a Delphi application using the ANSI code page.
pub fn default_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// Resolves an encoding label such as `"latin1"`, `"utf-8"` or `"cp1252"`.
///
/// Unknown labels fall back to [`default_encoding`].
pub fn parse_encoding(label: &str) -> &'static Encoding {
    let normalized = label.trim().to_ascii_lowercase();
    let normalized = match normalized.as_str() {
        "cp1252" | "ansi" => "windows-1252",
        other => other,
    };
    Encoding::for_label(normalized.as_bytes()).unwrap_or_else(|| {
        warn!(
            "Unknown encoding '{}', falling back to {}",
            label,
            default_encoding().name()
        );
        default_encoding()
    })
}

/// Decodes raw bytes, replacing malformed sequences.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// File extension (with leading dot) taken from a stored picture path.
///
/// Only ASCII alphanumerics are kept; anything else yields `None`.
pub fn extension_from_path(path: &str) -> Option<String> {
    let (_, ext) = path.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
