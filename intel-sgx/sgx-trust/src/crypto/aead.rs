/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Authenticated encryption, looked up by [`AeadScheme`].

use aes_gcm_siv::aead::generic_array::GenericArray;
use aes_gcm_siv::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm_siv::Aes256GcmSiv;
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::proto::AeadScheme;

pub trait AeadCryptor: Send + Sync {
    fn scheme(&self) -> AeadScheme;

    fn max_message_size(&self) -> usize;

    /// Upper bound on `ciphertext.len() - plaintext.len()`.
    fn max_seal_overhead(&self) -> usize;

    fn nonce_size(&self) -> usize;

    /// Encrypts `plaintext` under a freshly generated nonce, which is written
    /// to `nonce`. Returns the number of bytes written to `ciphertext`.
    fn seal(&self, plaintext: &[u8], aad: &[u8], nonce: &mut [u8], ciphertext: &mut [u8]) -> Result<usize>;

    /// Returns the number of bytes written to `plaintext`. On failure nothing
    /// of the plaintext is left in `plaintext`.
    fn open(&self, ciphertext: &[u8], aad: &[u8], nonce: &[u8], plaintext: &mut [u8]) -> Result<usize>;
}

const AES_GCM_SIV_NONCE_SIZE: usize = 12;
const AES_GCM_SIV_TAG_SIZE: usize = 16;
const AES_256_KEY_SIZE: usize = 32;
const AES_GCM_SIV_MAX_MESSAGE_SIZE: usize = 1 << 25;

pub struct AesGcmSivCryptor {
    cipher: Aes256GcmSiv,
}

impl AesGcmSivCryptor {
    pub fn new(key: &[u8]) -> Result<Self> {
        Aes256GcmSiv::new_from_slice(key)
            .map(|cipher| AesGcmSivCryptor { cipher })
            .map_err(|_| {
                Error::invalid_argument(format!(
                    "Key size is {} bytes, {} expected",
                    key.len(),
                    AES_256_KEY_SIZE
                ))
            })
    }

    fn check_nonce(nonce: &[u8]) -> Result<()> {
        if nonce.len() != AES_GCM_SIV_NONCE_SIZE {
            return Err(Error::invalid_argument(format!(
                "Nonce size is {} bytes, {} expected",
                nonce.len(),
                AES_GCM_SIV_NONCE_SIZE
            )));
        }
        Ok(())
    }
}

impl AeadCryptor for AesGcmSivCryptor {
    fn scheme(&self) -> AeadScheme {
        AeadScheme::Aes256GcmSiv
    }

    fn max_message_size(&self) -> usize {
        AES_GCM_SIV_MAX_MESSAGE_SIZE
    }

    fn max_seal_overhead(&self) -> usize {
        AES_GCM_SIV_TAG_SIZE
    }

    fn nonce_size(&self) -> usize {
        AES_GCM_SIV_NONCE_SIZE
    }

    fn seal(&self, plaintext: &[u8], aad: &[u8], nonce: &mut [u8], ciphertext: &mut [u8]) -> Result<usize> {
        Self::check_nonce(nonce)?;
        if plaintext.len() > self.max_message_size() {
            return Err(Error::invalid_argument("Message is too large"));
        }
        let total = plaintext.len() + AES_GCM_SIV_TAG_SIZE;
        if ciphertext.len() < total {
            return Err(Error::invalid_argument("Ciphertext buffer is too small"));
        }

        let fresh = Aes256GcmSiv::generate_nonce(&mut OsRng);
        nonce.copy_from_slice(&fresh);

        let (body, rest) = ciphertext.split_at_mut(plaintext.len());
        body.copy_from_slice(plaintext);
        let tag = self
            .cipher
            .encrypt_in_place_detached(&fresh, aad, body)
            .map_err(|_| Error::internal("AES-GCM-SIV encryption failed"))?;
        rest[..AES_GCM_SIV_TAG_SIZE].copy_from_slice(&tag);
        Ok(total)
    }

    fn open(&self, ciphertext: &[u8], aad: &[u8], nonce: &[u8], plaintext: &mut [u8]) -> Result<usize> {
        Self::check_nonce(nonce)?;
        if ciphertext.len() < AES_GCM_SIV_TAG_SIZE {
            return Err(Error::invalid_argument("Ciphertext is shorter than the authentication tag"));
        }
        let (body, tag) = ciphertext.split_at(ciphertext.len() - AES_GCM_SIV_TAG_SIZE);
        if plaintext.len() < body.len() {
            return Err(Error::invalid_argument("Plaintext buffer is too small"));
        }

        let out = &mut plaintext[..body.len()];
        out.copy_from_slice(body);
        let result = self.cipher.decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            aad,
            out,
            GenericArray::from_slice(tag),
        );
        if result.is_err() {
            out.zeroize();
            return Err(Error::internal("AES-GCM-SIV authentication failed"));
        }
        Ok(body.len())
    }
}

struct CryptorFactory {
    scheme: AeadScheme,
    key_size: usize,
    create: fn(&[u8]) -> Result<Box<dyn AeadCryptor>>,
}

fn aes_gcm_siv(key: &[u8]) -> Result<Box<dyn AeadCryptor>> {
    Ok(Box::new(AesGcmSivCryptor::new(key)?))
}

static CRYPTOR_FACTORIES: &[CryptorFactory] = &[CryptorFactory {
    scheme: AeadScheme::Aes256GcmSiv,
    key_size: AES_256_KEY_SIZE,
    create: aes_gcm_siv,
}];

fn factory(scheme: AeadScheme) -> Result<&'static CryptorFactory> {
    CRYPTOR_FACTORIES
        .iter()
        .find(|f| f.scheme == scheme)
        .ok_or_else(|| Error::invalid_argument(format!("Unsupported AeadScheme {}", scheme.name())))
}

pub fn key_size(scheme: AeadScheme) -> Result<usize> {
    factory(scheme).map(|f| f.key_size)
}

pub fn make_cryptor(scheme: AeadScheme, key: &[u8]) -> Result<Box<dyn AeadCryptor>> {
    (factory(scheme)?.create)(key)
}
