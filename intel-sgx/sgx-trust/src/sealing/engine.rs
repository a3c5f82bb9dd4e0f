/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use zeroize::Zeroizing;

use crate::crypto::aead::AeadCryptor;
use crate::error::Result;
use crate::proto::SealedSecret;

/// Encrypts `secret` into `sealed.secret_ciphertext` under a fresh nonce,
/// stored in `sealed.iv`.
pub fn seal(cryptor: &dyn AeadCryptor, secret: &[u8], aad: &[u8], sealed: &mut SealedSecret) -> Result<()> {
    let mut ciphertext = vec![0; secret.len() + cryptor.max_seal_overhead()];
    let mut nonce = vec![0; cryptor.nonce_size()];
    let len = cryptor.seal(secret, aad, &mut nonce, &mut ciphertext)?;
    ciphertext.truncate(len);
    sealed.secret_ciphertext = ciphertext;
    sealed.iv = nonce;
    Ok(())
}

pub fn open(cryptor: &dyn AeadCryptor, sealed: &SealedSecret, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut plaintext = Zeroizing::new(vec![0; sealed.secret_ciphertext.len()]);
    let len = cryptor.open(&sealed.secret_ciphertext, aad, &sealed.iv, &mut plaintext)?;
    plaintext.truncate(len);
    Ok(plaintext)
}
