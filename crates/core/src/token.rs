use base64::Engine;
use std::fmt;

/// Short marker embedded in probe post titles and bodies so the published
/// post can be located unambiguously when the blog homepage is scraped back.
///
/// A token is the base64 rendering of 128 bits of entropy folded down to 64
/// bits, which keeps it short enough to survive title truncation while still
/// making collisions across a run vanishingly unlikely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Mint a fresh random token.
    pub fn random() -> Self {
        Self::from_u128(rand::random::<u128>())
    }

    /// Fold 128 bits to 64 by XORing the two halves, then base64-encode the
    /// eight bytes. Eight bytes encode to exactly eleven characters unpadded.
    pub fn from_u128(bits: u128) -> Self {
        let folded = (bits as u64) ^ ((bits >> 64) as u64);
        let encoded =
            base64::engine::general_purpose::STANDARD_NO_PAD.encode(folded.to_be_bytes());
        Token(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
