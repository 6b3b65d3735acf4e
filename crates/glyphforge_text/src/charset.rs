//! Character set decoding
//!
//! Charsets and drawn text arrive as bytes together with a `CharEncoding`.
//! Both go through the same strict UTF-8 decoder. Any byte that is not part
//! of a well-formed sequence (stray continuations, truncated or overlong
//! sequences, surrogates, values past U+10FFFF) becomes one U+FFFD.

use rustc_hash::FxHashSet;

/// Every printable ASCII character, the default atlas charset
pub const PRINTABLE_ASCII: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Letters, digits, common punctuation and whitespace
pub const BASIC: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890!@#$%^&*()_+-=,./?| \n\t";

/// `BASIC` plus currency, math and arrow symbols
pub const EXTENDED: &str = concat!(
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890!@#$%^&*()_+-=,./?| \n\t",
    "€£¥¢₹₽±×÷√∫πΩ°∞≠≈≤≥∑∏∂∇∀∃∈∉⊂⊃∩∪←↑→↓"
);

/// How charset and text bytes map to codepoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CharEncoding {
    /// Raw bytes, one codepoint per byte
    None,
    /// UTF-8 multi-byte sequences
    #[default]
    Utf8,
    /// One codepoint per byte
    Ascii,
}

impl CharEncoding {
    pub fn name(self) -> &'static str {
        match self {
            CharEncoding::None => "none",
            CharEncoding::Utf8 => "utf8",
            CharEncoding::Ascii => "ascii",
        }
    }
}

impl std::fmt::Display for CharEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes UTF-8 bytes, replacing each invalid byte with U+FFFD.
///
/// Validation is left to `<[u8]>::utf8_chunks`; every byte of an invalid
/// chunk becomes its own replacement character.
pub fn decode_utf8(bytes: &[u8]) -> Vec<char> {
    let mut chars = Vec::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        chars.extend(chunk.valid().chars());
        chars.extend(std::iter::repeat(char::REPLACEMENT_CHARACTER).take(chunk.invalid().len()));
    }
    chars
}

/// Decodes text in the given encoding, keeping repeats and order.
pub fn decode_text(bytes: &[u8], encoding: CharEncoding) -> Vec<char> {
    match encoding {
        CharEncoding::Utf8 => decode_utf8(bytes),
        CharEncoding::None | CharEncoding::Ascii => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Decodes a charset into unique characters in first-seen order.
pub fn decode_charset(charset: &[u8], encoding: CharEncoding) -> Vec<char> {
    let mut seen = FxHashSet::default();
    decode_text(charset, encoding)
        .into_iter()
        .filter(|c| seen.insert(*c))
        .collect()
}

/// Encodes characters back into a UTF-8 string
pub fn encode_utf8(chars: &[char]) -> String {
    chars.iter().collect()
}
