// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! secp256k1 keypairs, addresses and signature encodings.
//!
//! An address is the lowercase hex of the 33-byte compressed SEC1 public key,
//! so any address can be turned back into a verifying key without a lookup.
//! Signatures travel as unpadded base64url of the 64-byte `r || s` form.

use base64ct::{Base64UrlUnpadded, Encoding};
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use rand_core::OsRng;

/// Hex length of a compressed SEC1 key.
const ADDRESS_HEX_LEN: usize = 66;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("secret key must be 32 bytes of hex")]
    InvalidSecret,

    #[error("address is not a compressed secp256k1 public key")]
    InvalidAddress,

    #[error("signature is not a 64-byte base64url value")]
    InvalidSignature,

    #[error("signing failed: {0}")]
    Signing(String),
}

/// A signing keypair together with its address.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
    address: String,
}

impl Keypair {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret.trim()).map_err(|_| KeyError::InvalidSecret)?;
        let signing = SigningKey::from_slice(&bytes).map_err(|_| KeyError::InvalidSecret)?;
        Ok(Self::from_signing_key(signing))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let address = address_of(signing.verifying_key());
        Self { signing, address }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing.verifying_key()
    }

    /// Sign `message`, returning the wire encoding of the signature.
    pub fn sign(&self, message: &[u8]) -> Result<String, KeyError> {
        let signature: Signature = self
            .signing
            .try_sign(message)
            .map_err(|e| KeyError::Signing(e.to_string()))?;
        Ok(encode_signature(&signature))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

pub fn address_of(key: &VerifyingKey) -> String {
    hex::encode(key.to_encoded_point(true).as_bytes())
}

pub fn parse_address(address: &str) -> Result<VerifyingKey, KeyError> {
    if address.len() != ADDRESS_HEX_LEN {
        return Err(KeyError::InvalidAddress);
    }
    let bytes = hex::decode(address).map_err(|_| KeyError::InvalidAddress)?;
    VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| KeyError::InvalidAddress)
}

/// Normalise a caller supplied public key into its canonical address.
pub fn canonical_address(public_key: &str) -> Result<String, KeyError> {
    let key = parse_address(&public_key.trim().to_ascii_lowercase())?;
    Ok(address_of(&key))
}

pub fn encode_signature(signature: &Signature) -> String {
    Base64UrlUnpadded::encode_string(&signature.to_bytes())
}

pub fn decode_signature(encoded: &str) -> Result<Signature, KeyError> {
    let bytes = Base64UrlUnpadded::decode_vec(encoded).map_err(|_| KeyError::InvalidSignature)?;
    Signature::from_slice(&bytes).map_err(|_| KeyError::InvalidSignature)
}

/// Check an encoded signature over `message` by the key behind `address`.
pub fn verify(address: &str, message: &[u8], signature: &str) -> Result<(), KeyError> {
    let key = parse_address(address)?;
    let signature = decode_signature(signature)?;
    key.verify(message, &signature)
        .map_err(|_| KeyError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_compressed_hex_key() {
        let keypair = Keypair::generate();
        assert_eq!(keypair.address().len(), ADDRESS_HEX_LEN);
        assert!(keypair.address().starts_with("02") || keypair.address().starts_with("03"));
        let key = parse_address(keypair.address()).unwrap();
        assert_eq!(&key, keypair.verifying_key());
    }

    #[test]
    fn secret_hex_round_trip() {
        let secret = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let a = Keypair::from_secret_hex(secret).unwrap();
        let b = Keypair::from_secret_hex(secret).unwrap();
        assert_eq!(a.address(), b.address());
        assert!(Keypair::from_secret_hex("zz").is_err());
        assert!(Keypair::from_secret_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn sign_and_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"hello").unwrap();
        assert!(verify(keypair.address(), b"hello", &signature).is_ok());
        assert!(verify(keypair.address(), b"hellO", &signature).is_err());

        let other = Keypair::generate();
        assert!(verify(other.address(), b"hello", &signature).is_err());
    }

    #[test]
    fn canonical_address_lowercases() {
        let keypair = Keypair::generate();
        let upper = keypair.address().to_ascii_uppercase();
        assert_eq!(canonical_address(&upper).unwrap(), keypair.address());
        assert!(canonical_address("02abcd").is_err());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let keypair = Keypair::generate();
        let rendered = format!("{keypair:?}");
        assert!(rendered.contains(keypair.address()));
        assert!(!rendered.contains("signing"));
    }
}
