/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Signature schemes, looked up by [`SignatureScheme`].

use std::fmt;

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::Signature as EcdsaP256Signature;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};

use crate::error::{Error, Result};
use crate::proto::{EcdsaSignature, Signature, SignatureScheme};

const P256_SCALAR_SIZE: usize = 32;

pub trait VerifyingKey: fmt::Debug + Send + Sync {
    fn signature_scheme(&self) -> SignatureScheme;

    /// The key as a DER-encoded SubjectPublicKeyInfo.
    fn serialize_to_der(&self) -> Result<Vec<u8>>;

    /// Fails with `InvalidArgument` if `signature` is not of this key's
    /// scheme or is malformed, and with `Internal` if it does not verify.
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<()>;
}

pub trait SigningKey: fmt::Debug + Send + Sync {
    fn signature_scheme(&self) -> SignatureScheme;

    fn verifying_key(&self) -> Box<dyn VerifyingKey>;

    fn sign(&self, message: &[u8]) -> Result<Signature>;
}

fn left_pad_scalar(value: &[u8]) -> Result<[u8; P256_SCALAR_SIZE]> {
    if value.len() > P256_SCALAR_SIZE {
        return Err(Error::invalid_argument(format!(
            "ECDSA signature component is {} bytes, at most {} expected",
            value.len(),
            P256_SCALAR_SIZE
        )));
    }
    let mut out = [0u8; P256_SCALAR_SIZE];
    out[P256_SCALAR_SIZE - value.len()..].copy_from_slice(value);
    Ok(out)
}

#[derive(Clone, Debug)]
pub struct EcdsaP256Sha256VerifyingKey {
    key: p256::ecdsa::VerifyingKey,
}

impl EcdsaP256Sha256VerifyingKey {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        p256::ecdsa::VerifyingKey::from_public_key_der(der)
            .map(|key| EcdsaP256Sha256VerifyingKey { key })
            .map_err(|e| Error::invalid_argument(format!("Invalid ECDSA P-256 public key: {}", e)))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        p256::ecdsa::VerifyingKey::from_public_key_pem(pem)
            .map(|key| EcdsaP256Sha256VerifyingKey { key })
            .map_err(|e| Error::invalid_argument(format!("Invalid ECDSA P-256 public key: {}", e)))
    }

    fn decode_signature(signature: &Signature) -> Result<EcdsaP256Signature> {
        let decoded = match &signature.ecdsa_signature {
            Some(EcdsaSignature { r, s }) => {
                let mut raw = [0u8; 2 * P256_SCALAR_SIZE];
                raw[..P256_SCALAR_SIZE].copy_from_slice(&left_pad_scalar(r)?);
                raw[P256_SCALAR_SIZE..].copy_from_slice(&left_pad_scalar(s)?);
                EcdsaP256Signature::from_slice(&raw)
            }
            None => EcdsaP256Signature::from_der(&signature.signature),
        };
        decoded.map_err(|e| Error::invalid_argument(format!("Malformed ECDSA P-256 signature: {}", e)))
    }
}

impl VerifyingKey for EcdsaP256Sha256VerifyingKey {
    fn signature_scheme(&self) -> SignatureScheme {
        SignatureScheme::EcdsaP256Sha256
    }

    fn serialize_to_der(&self) -> Result<Vec<u8>> {
        self.key
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| Error::internal(format!("Could not DER encode public key: {}", e)))
    }

    fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        if signature.signature_scheme != self.signature_scheme() as i32 {
            return Err(Error::invalid_argument(format!(
                "Signature scheme {} does not match the verifying key's scheme ({:?})",
                signature.signature_scheme,
                self.signature_scheme()
            )));
        }
        let signature = Self::decode_signature(signature)?;
        self.key
            .verify(message, &signature)
            .map_err(|_| Error::internal("Signature verification failed"))
    }
}

#[derive(Clone)]
pub struct EcdsaP256Sha256SigningKey {
    key: p256::ecdsa::SigningKey,
}

impl fmt::Debug for EcdsaP256Sha256SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EcdsaP256Sha256SigningKey").finish_non_exhaustive()
    }
}

impl EcdsaP256Sha256SigningKey {
    /// Builds a key from a big-endian private scalar.
    pub fn from_scalar_bytes(scalar: &[u8]) -> Result<Self> {
        p256::ecdsa::SigningKey::from_slice(scalar)
            .map(|key| EcdsaP256Sha256SigningKey { key })
            .map_err(|_| Error::invalid_argument("Invalid ECDSA P-256 private key"))
    }
}

impl SigningKey for EcdsaP256Sha256SigningKey {
    fn signature_scheme(&self) -> SignatureScheme {
        SignatureScheme::EcdsaP256Sha256
    }

    fn verifying_key(&self) -> Box<dyn VerifyingKey> {
        Box::new(EcdsaP256Sha256VerifyingKey { key: self.key.verifying_key().clone() })
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        let signature: EcdsaP256Signature = self.key.sign(message);
        let (r, s) = signature.split_bytes();
        Ok(Signature {
            signature_scheme: SignatureScheme::EcdsaP256Sha256 as i32,
            signature: signature.to_der().as_bytes().to_vec(),
            ecdsa_signature: Some(EcdsaSignature { r: r.to_vec(), s: s.to_vec() }),
        })
    }
}

struct VerifyingKeyFactory {
    scheme: SignatureScheme,
    from_der: fn(&[u8]) -> Result<Box<dyn VerifyingKey>>,
    from_pem: fn(&str) -> Result<Box<dyn VerifyingKey>>,
}

fn ecdsa_p256_from_der(der: &[u8]) -> Result<Box<dyn VerifyingKey>> {
    Ok(Box::new(EcdsaP256Sha256VerifyingKey::from_der(der)?))
}

fn ecdsa_p256_from_pem(pem: &str) -> Result<Box<dyn VerifyingKey>> {
    Ok(Box::new(EcdsaP256Sha256VerifyingKey::from_pem(pem)?))
}

static VERIFYING_KEY_FACTORIES: &[VerifyingKeyFactory] = &[VerifyingKeyFactory {
    scheme: SignatureScheme::EcdsaP256Sha256,
    from_der: ecdsa_p256_from_der,
    from_pem: ecdsa_p256_from_pem,
}];

fn factory(scheme: i32) -> Result<&'static VerifyingKeyFactory> {
    VERIFYING_KEY_FACTORIES
        .iter()
        .find(|f| f.scheme as i32 == scheme)
        .ok_or_else(|| Error::invalid_argument(format!("Signature scheme unsupported: {}", scheme)))
}

/// Wraps a raw `r || s` ECDSA P-256 signature, as produced by the PCE.
pub fn ecdsa_p256_signature_from_raw(raw: &[u8]) -> Result<Signature> {
    let signature = EcdsaP256Signature::from_slice(raw)
        .map_err(|e| Error::internal(format!("Malformed raw ECDSA P-256 signature: {}", e)))?;
    let (r, s) = signature.split_bytes();
    Ok(Signature {
        signature_scheme: SignatureScheme::EcdsaP256Sha256 as i32,
        signature: signature.to_der().as_bytes().to_vec(),
        ecdsa_signature: Some(EcdsaSignature { r: r.to_vec(), s: s.to_vec() }),
    })
}

pub fn verifying_key_from_der(scheme: i32, der: &[u8]) -> Result<Box<dyn VerifyingKey>> {
    (factory(scheme)?.from_der)(der)
}

pub fn verifying_key_from_pem(scheme: i32, pem: &str) -> Result<Box<dyn VerifyingKey>> {
    (factory(scheme)?.from_pem)(pem)
}
