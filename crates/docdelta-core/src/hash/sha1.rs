use sha1::{Digest, Sha1};

pub fn sha1_hash_string(s: &str) -> String {
    sha1_hash_bytes(s.as_bytes())
}

pub fn sha1_hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash of a sequence of strings. Each part is length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn sha1_hash_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
