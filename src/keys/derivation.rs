//! BIP-32 derivation of secp256k1 account keys.

use std::str::FromStr;

use alloy::primitives::Address;
use bip32::XPrv;
use k256::ecdsa::{SigningKey, VerifyingKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::keys::address::derive_address;
use crate::keys::mnemonic::Seed;
use crate::keys::{KeyError, KeyResult};

/// A BIP-32 derivation path such as `m/44'/60'/0'/0/0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(bip32::DerivationPath);

impl DerivationPath {
    /// First account on the standard Ethereum path.
    pub const ETHEREUM_DEFAULT: &'static str = "m/44'/60'/0'/0/0";

    pub fn parse(path: &str) -> KeyResult<Self> {
        bip32::DerivationPath::from_str(path)
            .map(Self)
            .map_err(|e| KeyError::InvalidDerivationPath {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// `m/44'/60'/{account}'/0/{index}`.
    pub fn ethereum(account: u32, index: u32) -> KeyResult<Self> {
        Self::parse(&format!("m/44'/60'/{}'/0/{}", account, index))
    }
}

impl std::fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 32-byte secp256k1 secret scalar.
///
/// Never serialized outside the vault envelope; wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Validate `bytes` as a non-zero scalar below the curve order.
    pub fn from_bytes(bytes: &[u8]) -> KeyResult<Self> {
        let key: [u8; 32] = bytes.try_into().map_err(|_| KeyError::InvalidPrivateKey)?;
        SigningKey::from_slice(&key).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Curve form of the key. The returned `SigningKey` zeroizes itself on drop.
    pub fn signing_key(&self) -> KeyResult<SigningKey> {
        SigningKey::from_slice(&self.0).map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn public_key(&self) -> KeyResult<PublicKey> {
        Ok(PublicKey(*self.signing_key()?.verifying_key()))
    }

    pub fn address(&self) -> KeyResult<Address> {
        Ok(derive_address(&self.public_key()?))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// secp256k1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub VerifyingKey);

impl PublicKey {
    /// 65-byte SEC1 uncompressed encoding (`0x04 || x || y`).
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

/// Keys for one account index.
pub struct DerivedAccount {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
    pub address: Address,
    pub path: DerivationPath,
}

impl std::fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("address", &self.address)
            .field("path", &self.path.to_string())
            .finish_non_exhaustive()
    }
}

/// Public key for `private_key`.
pub fn derive_public_key(private_key: &PrivateKey) -> KeyResult<PublicKey> {
    private_key.public_key()
}

/// Walk `path` from the seed's master key.
pub fn derive_account(seed: &Seed, path: &DerivationPath) -> KeyResult<DerivedAccount> {
    let xprv = XPrv::derive_from_path(seed.as_bytes(), &path.0)
        .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;

    let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(xprv.private_key().to_bytes().into());
    let private_key = PrivateKey::from_bytes(bytes.as_slice())?;
    let public_key = private_key.public_key()?;
    let address = derive_address(&public_key);

    tracing::debug!(path = %path, address = %address, "Derived account");

    Ok(DerivedAccount {
        private_key,
        public_key,
        address,
        path: path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::address::to_checksum;
    use crate::keys::mnemonic::{mnemonic_to_seed, Mnemonic};

    fn account_for(phrase: &str, path: &str) -> DerivedAccount {
        let mnemonic = Mnemonic::parse(phrase).unwrap();
        let seed = mnemonic_to_seed(&mnemonic, "").unwrap();
        derive_account(&seed, &DerivationPath::parse(path).unwrap()).unwrap()
    }

    #[test]
    fn test_anvil_first_account() {
        let account = account_for(
            "test test test test test test test test test test test junk",
            DerivationPath::ETHEREUM_DEFAULT,
        );
        assert_eq!(
            to_checksum(&account.address),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        assert_eq!(
            hex::encode(account.private_key.as_bytes()),
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
    }

    #[test]
    fn test_abandon_about_vector() {
        let account = account_for(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            DerivationPath::ETHEREUM_DEFAULT,
        );
        assert_eq!(
            to_checksum(&account.address),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn test_ability_acquire_vector() {
        let account = account_for(
            "abandon ability able about above absent absorb abstract absurd abuse access acquire",
            DerivationPath::ETHEREUM_DEFAULT,
        );
        assert_eq!(
            to_checksum(&account.address),
            "0x9dF50a0E960dA9b4F224662642fA0036bB0A4C30"
        );
    }

    #[test]
    fn test_path_switch_yields_distinct_accounts() {
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let first = account_for(phrase, "m/44'/60'/0'/0/0");
        let second = account_for(phrase, "m/44'/60'/0'/0/1");
        let other_account = account_for(phrase, "m/44'/60'/1'/0/0");

        assert_eq!(to_checksum(&second.address), "0x6Fac4D18c912343BF86fa7049364Dd4E424Ab9C0");
        assert_eq!(
            to_checksum(&other_account.address),
            "0x78839F6054d7ed13918bAe0473BA31b1Ca9D7265"
        );
        assert_ne!(first.address, second.address);
    }

    #[test]
    fn test_ethereum_path_builder() {
        assert_eq!(DerivationPath::ethereum(0, 7).unwrap().to_string(), "m/44'/60'/0'/0/7");
        assert!(matches!(
            DerivationPath::parse("44/60/x"),
            Err(KeyError::InvalidDerivationPath { .. })
        ));
    }

    #[test]
    fn test_address_rederivable_from_key() {
        let account = account_for(
            "test test test test test test test test test test test junk",
            DerivationPath::ETHEREUM_DEFAULT,
        );
        let public = derive_public_key(&account.private_key).unwrap();
        assert_eq!(public, account.public_key);
        assert_eq!(derive_address(&public), derive_address(&public));
        assert_eq!(account.private_key.address().unwrap(), account.address);
    }

    #[test]
    fn test_invalid_private_key() {
        assert_eq!(PrivateKey::from_bytes(&[0u8; 32]).unwrap_err(), KeyError::InvalidPrivateKey);
        assert_eq!(PrivateKey::from_bytes(&[1u8; 31]).unwrap_err(), KeyError::InvalidPrivateKey);
        assert_eq!(PrivateKey::from_bytes(&[1u8; 33]).unwrap_err(), KeyError::InvalidPrivateKey);
        assert_eq!(PrivateKey::from_bytes(&[]).unwrap_err(), KeyError::InvalidPrivateKey);
        assert_eq!(PrivateKey::from_bytes(&[0xffu8; 32]).unwrap_err(), KeyError::InvalidPrivateKey);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = PrivateKey::from_bytes(&[0x46u8; 32]).unwrap();
        assert_eq!(format!("{:?}", key), "PrivateKey([REDACTED])");
    }
}
