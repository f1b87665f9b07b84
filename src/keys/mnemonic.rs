//! BIP-39 mnemonic generation, validation and seed stretching.

use bip39::Language;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::keys::{KeyError, KeyResult};

/// Entropy sizes accepted by BIP-39, in bits.
pub const ENTROPY_BITS: [usize; 5] = [128, 160, 192, 224, 256];

/// Word counts matching [`ENTROPY_BITS`] one to one.
pub const WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// A validated BIP-39 English mnemonic.
///
/// The phrase is kept normalized (lowercase, single spaces) and is wiped
/// from memory when the value is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Mnemonic {
    phrase: String,
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("word_count", &self.word_count())
            .field("phrase", &"[REDACTED]")
            .finish()
    }
}

impl Mnemonic {
    /// Build a mnemonic from raw entropy (16, 20, 24, 28 or 32 bytes).
    pub fn from_entropy(entropy: &[u8]) -> KeyResult<Self> {
        let bits = entropy.len() * 8;
        if !ENTROPY_BITS.contains(&bits) {
            return Err(KeyError::InvalidEntropyLength(bits));
        }

        let mnemonic = bip39::Mnemonic::from_entropy_in(Language::English, entropy)
            .map_err(|_| KeyError::InvalidEntropyLength(bits))?;

        Ok(Self {
            phrase: mnemonic.to_string(),
        })
    }

    /// Parse and validate a user supplied phrase.
    ///
    /// Checks, in order: word count, wordlist membership, checksum.
    pub fn parse(phrase: &str) -> KeyResult<Self> {
        let normalized = Zeroizing::new(phrase.to_lowercase());
        let words: Vec<&str> = normalized.split_whitespace().collect();

        if !WORD_COUNTS.contains(&words.len()) {
            return Err(KeyError::InvalidWordCount(words.len()));
        }

        if let Some(unknown) = words
            .iter()
            .find(|word| Language::English.find_word(word).is_none())
        {
            return Err(KeyError::UnknownWord((*unknown).to_string()));
        }

        let joined = words.join(" ");
        bip39::Mnemonic::parse_in_normalized(Language::English, &joined).map_err(|e| match e {
            bip39::Error::InvalidChecksum => KeyError::InvalidChecksum,
            bip39::Error::BadWordCount(count) => KeyError::InvalidWordCount(count),
            bip39::Error::UnknownWord(idx) => {
                KeyError::UnknownWord(words.get(idx).copied().unwrap_or_default().to_string())
            }
            _ => KeyError::InvalidChecksum,
        })?;

        Ok(Self { phrase: joined })
    }

    /// The normalized phrase. Never log this.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// Recover the entropy encoded by the phrase (checksum stripped).
    pub fn to_entropy(&self) -> KeyResult<Zeroizing<Vec<u8>>> {
        let mnemonic = self.reparse()?;
        Ok(Zeroizing::new(mnemonic.to_entropy()))
    }

    fn reparse(&self) -> KeyResult<bip39::Mnemonic> {
        bip39::Mnemonic::parse_in_normalized(Language::English, &self.phrase)
            .map_err(|_| KeyError::InvalidChecksum)
    }
}

/// 64-byte BIP-39 seed, zeroized on drop.
pub struct Seed(Zeroizing<[u8; 64]>);

impl Seed {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// Entropy size that produces a phrase of `words` words.
pub fn entropy_bits_for_words(words: usize) -> KeyResult<usize> {
    WORD_COUNTS
        .iter()
        .position(|&count| count == words)
        .map(|i| ENTROPY_BITS[i])
        .ok_or(KeyError::InvalidWordCount(words))
}

/// Generate a fresh mnemonic from `entropy_bits` of OS randomness.
pub fn generate_mnemonic(entropy_bits: usize) -> KeyResult<Mnemonic> {
    if !ENTROPY_BITS.contains(&entropy_bits) {
        return Err(KeyError::InvalidEntropyLength(entropy_bits));
    }

    let len = entropy_bits / 8;
    let mut entropy = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut entropy[..len]);

    Mnemonic::from_entropy(&entropy[..len])
}

/// Stretch a mnemonic and optional passphrase into a seed
/// (PBKDF2-HMAC-SHA512, 2048 rounds).
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> KeyResult<Seed> {
    let parsed = mnemonic.reparse()?;
    Ok(Seed(Zeroizing::new(parsed.to_seed(passphrase))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON_ABOUT: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_entropy_bits_for_words() {
        assert_eq!(entropy_bits_for_words(12).unwrap(), 128);
        assert_eq!(entropy_bits_for_words(24).unwrap(), 256);
        assert_eq!(entropy_bits_for_words(13), Err(KeyError::InvalidWordCount(13)));
    }

    #[test]
    fn test_word_count_per_entropy_size() {
        for (bits, words) in ENTROPY_BITS.iter().zip(WORD_COUNTS.iter()) {
            let mnemonic = generate_mnemonic(*bits).unwrap();
            assert_eq!(mnemonic.word_count(), *words, "{} bits", bits);
        }
    }

    #[test]
    fn test_invalid_entropy_length() {
        assert_eq!(
            generate_mnemonic(100).unwrap_err(),
            KeyError::InvalidEntropyLength(100)
        );
        assert_eq!(
            Mnemonic::from_entropy(&[0u8; 15]).unwrap_err(),
            KeyError::InvalidEntropyLength(120)
        );
    }

    #[test]
    fn test_zero_entropy_vector() {
        let mnemonic = Mnemonic::from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(mnemonic.phrase(), ABANDON_ABOUT);
        assert_eq!(&*mnemonic.to_entropy().unwrap(), &[0u8; 16]);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let entropy = [0x7fu8; 32];
        let a = mnemonic_to_seed(&Mnemonic::from_entropy(&entropy).unwrap(), "").unwrap();
        let b = mnemonic_to_seed(&Mnemonic::from_entropy(&entropy).unwrap(), "").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        let salted = mnemonic_to_seed(&Mnemonic::from_entropy(&entropy).unwrap(), "extra").unwrap();
        assert_ne!(a.as_bytes(), salted.as_bytes());
    }

    #[test]
    fn test_bip39_trezor_vector() {
        let mnemonic = Mnemonic::parse(ABANDON_ABOUT).unwrap();
        let seed = mnemonic_to_seed(&mnemonic, "TREZOR").unwrap();
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn test_parse_normalizes_whitespace_and_case() {
        let messy = format!("  {}  ", ABANDON_ABOUT.to_uppercase().replace(' ', "   "));
        let mnemonic = Mnemonic::parse(&messy).unwrap();
        assert_eq!(mnemonic.phrase(), ABANDON_ABOUT);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let phrase = "abandon ability able about above absent absorb abstract absurd abuse access accident";
        assert_eq!(Mnemonic::parse(phrase).unwrap_err(), KeyError::InvalidChecksum);
    }

    #[test]
    fn test_parse_rejects_unknown_word() {
        let phrase = ABANDON_ABOUT.replace("about", "bitcoinz");
        assert_eq!(
            Mnemonic::parse(&phrase).unwrap_err(),
            KeyError::UnknownWord("bitcoinz".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_word_count() {
        assert_eq!(
            Mnemonic::parse("abandon abandon about").unwrap_err(),
            KeyError::InvalidWordCount(3)
        );
    }

    #[test]
    fn test_debug_redacts_phrase() {
        let mnemonic = Mnemonic::parse(ABANDON_ABOUT).unwrap();
        let debug = format!("{:?}", mnemonic);
        assert!(!debug.contains("abandon"));
        assert!(debug.contains("REDACTED"));
    }
}
