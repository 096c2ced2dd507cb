use nanoid::nanoid;

/// Alphabet for stored document identifiers (no ambiguous glyphs).
const RECORD_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
/// Default record id length.
const RECORD_ID_LENGTH: usize = 20;

/// Generates a new identifier for a document appended to a store.
pub fn generate_record_id() -> String {
    nanoid!(RECORD_ID_LENGTH, RECORD_ID_ALPHABET)
}
