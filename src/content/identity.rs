use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in an id (128 bits).
const ID_BYTES: usize = 16;

/// Canonical line endings (LF) and no trailing newline. Everything else,
/// indentation and trailing spaces included, is what the user types and
/// stays as-is.
pub fn normalize(code: &str) -> String {
    let unified = if code.contains('\r') {
        code.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        code.to_string()
    };
    unified.trim_end_matches('\n').to_string()
}

/// Content id for already-normalized code.
pub fn content_id(language: &str, normalized_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized_code.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..ID_BYTES])
}

pub fn content_id_of(language: &str, raw_code: &str) -> String {
    content_id(language, &normalize(raw_code))
}
