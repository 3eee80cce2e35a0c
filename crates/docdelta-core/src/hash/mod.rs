pub mod sha1;
pub mod sha256;

pub use self::sha1::{sha1_hash_bytes, sha1_hash_parts, sha1_hash_string};
pub use self::sha256::{sha256_hash_bytes, sha256_hash_string};
