//! Offline transaction signing.
//!
//! # Security
//! - The private key is borrowed for the duration of one call and never copied
//! - Nonces are RFC 6979 deterministic; `s` is low-s normalized by k256
//! - Every signature is recovered and compared with `tx.from` before it is returned

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{keccak256, Address, Signature, TxKind, B256, U256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

use crate::keys::{derive_address, PrivateKey, PublicKey};
use crate::transaction::types::{Fee, SignedTransaction, UnsignedTransaction};
use crate::transaction::{SignError, SignResult};

/// Sign `tx` with `key`, producing the raw EIP-2718 bytes and hash.
pub fn sign(tx: &UnsignedTransaction, key: &PrivateKey) -> SignResult<SignedTransaction> {
    let signing_key = key
        .signing_key()
        .map_err(|e| SignError::SigningFailed(e.to_string()))?;

    let owner = derive_address(&PublicKey(*signing_key.verifying_key()));
    if owner != tx.from {
        return Err(SignError::KeyMismatch { expected: tx.from });
    }

    let wire = WireTransaction::from_unsigned(tx)?;
    let signing_hash = wire.signature_hash();

    let (ecdsa, recovery_id) = signing_key
        .sign_prehash_recoverable(signing_hash.as_slice())
        .map_err(|e| SignError::SigningFailed(e.to_string()))?;

    let signature = Signature::new(
        U256::from_be_slice(&ecdsa.r().to_bytes()),
        U256::from_be_slice(&ecdsa.s().to_bytes()),
        recovery_id.is_y_odd(),
    );

    let raw = wire.encode_signed(signature);
    let hash = keccak256(&raw);

    let signed = SignedTransaction {
        tx: tx.clone(),
        signature,
        signing_hash,
        hash,
        raw: raw.into(),
    };

    let recovered = recover_signer(&signed)?;
    if recovered != tx.from {
        tracing::error!(expected = %tx.from, recovered = %recovered, "Signature self-check failed");
        return Err(SignError::SigningFailed(
            "signature does not recover to the sender".to_string(),
        ));
    }

    tracing::debug!(
        tx_hash = %signed.hash,
        from = %tx.from,
        nonce = %tx.nonce,
        "Transaction signed"
    );
    Ok(signed)
}

/// Address whose key produced `signed.signature`.
pub fn recover_signer(signed: &SignedTransaction) -> SignResult<Address> {
    recover_from_prehash(&signed.signing_hash, &signed.signature)
}

fn recover_from_prehash(hash: &B256, signature: &Signature) -> SignResult<Address> {
    let invalid = |e: k256::ecdsa::Error| {
        SignError::SigningFailed(format!("unrecoverable signature: {}", e))
    };

    let ecdsa = EcdsaSignature::from_scalars(
        signature.r().to_be_bytes::<32>(),
        signature.s().to_be_bytes::<32>(),
    )
    .map_err(invalid)?;
    let recovery_id = RecoveryId::new(signature.v(), false);
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &ecdsa, recovery_id)
        .map_err(invalid)?;

    Ok(derive_address(&PublicKey(key)))
}

/// Consensus form of an unsigned transaction, narrowed to wire widths.
enum WireTransaction {
    Legacy(TxLegacy),
    Eip1559(TxEip1559),
}

impl WireTransaction {
    fn from_unsigned(tx: &UnsignedTransaction) -> SignResult<Self> {
        let nonce = narrow_u64(tx.nonce, "nonce")?;
        let gas_limit = narrow_u64(tx.gas_limit, "gas_limit")?;
        let to = match tx.to {
            Some(address) => TxKind::Call(address),
            None => TxKind::Create,
        };

        Ok(match tx.fee {
            Fee::Legacy { gas_price } => WireTransaction::Legacy(TxLegacy {
                chain_id: Some(tx.chain_id),
                nonce,
                gas_price: narrow_u128(gas_price, "gas_price")?,
                gas_limit,
                to,
                value: tx.value,
                input: tx.data.clone(),
            }),
            Fee::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => WireTransaction::Eip1559(TxEip1559 {
                chain_id: tx.chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: narrow_u128(max_fee_per_gas, "max_fee_per_gas")?,
                max_priority_fee_per_gas: narrow_u128(
                    max_priority_fee_per_gas,
                    "max_priority_fee_per_gas",
                )?,
                to,
                value: tx.value,
                access_list: Default::default(),
                input: tx.data.clone(),
            }),
        })
    }

    fn signature_hash(&self) -> B256 {
        match self {
            WireTransaction::Legacy(tx) => tx.signature_hash(),
            WireTransaction::Eip1559(tx) => tx.signature_hash(),
        }
    }

    fn encode_signed(self, signature: Signature) -> Vec<u8> {
        let envelope = match self {
            WireTransaction::Legacy(tx) => TxEnvelope::from(tx.into_signed(signature)),
            WireTransaction::Eip1559(tx) => TxEnvelope::from(tx.into_signed(signature)),
        };
        envelope.encoded_2718()
    }
}

fn narrow_u64(value: U256, field: &'static str) -> SignResult<u64> {
    u64::try_from(value).map_err(|_| SignError::FieldOverflow(field))
}

fn narrow_u128(value: U256, field: &'static str) -> SignResult<u128> {
    u128::try_from(value).map_err(|_| SignError::FieldOverflow(field))
}
