//! Citation key normalization.

use std::collections::HashSet;

use crate::record::CitationKey;

/// The character removed by [`strip_ampersands`].
pub const RESERVED_CHAR: char = '&';

/// Removes every ampersand from every key.
///
/// Keys that become identical collapse into one; the first occurrence keeps
/// its position. Applying the transform twice gives the same result as
/// applying it once.
pub fn strip_ampersands(keys: Vec<CitationKey>) -> Vec<CitationKey> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|key| {
            if key.as_str().contains(RESERVED_CHAR) {
                CitationKey::new_unchecked(key.as_str().replace(RESERVED_CHAR, ""))
            } else {
                key
            }
        })
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
