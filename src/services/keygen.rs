//! Key value generation.

use rand::Rng;

/// Uppercase letters and digits without look-alikes (0/O, 1/I/L).
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

const GROUPS: usize = 3;
const GROUP_LEN: usize = 4;

/// Generate a key value of the form `PREFIX-XXXX-XXXX-XXXX`.
///
/// An empty prefix drops the leading segment.
pub fn generate_key_value(prefix: &str) -> String {
    let mut rng = rand::rng();

    let mut parts: Vec<String> = Vec::with_capacity(GROUPS + 1);
    if !prefix.is_empty() {
        parts.push(prefix.to_string());
    }
    for _ in 0..GROUPS {
        let group: String = (0..GROUP_LEN)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect();
        parts.push(group);
    }

    parts.join("-")
}
