/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

pub mod aead;
pub mod signing;

use std::convert::TryFrom;

use byteorder::{LittleEndian, WriteBytesExt};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const SHA256_DIGEST_LENGTH: usize = 32;

pub fn sha256(data: &[u8]) -> [u8; SHA256_DIGEST_LENGTH] {
    Sha256::digest(data).into()
}

/// Concatenates `containers`, each prefixed with its length as a
/// little-endian `u32`, so that distinct inputs never serialize identically.
pub fn serialize_byte_containers<T: AsRef<[u8]>>(containers: &[T]) -> Result<Vec<u8>> {
    let total = containers.iter().map(|c| 4 + c.as_ref().len()).sum();
    let mut out = Vec::with_capacity(total);
    for container in containers {
        let data = container.as_ref();
        let len = u32::try_from(data.len())
            .map_err(|_| Error::invalid_argument("Byte container is too large to serialize"))?;
        out.write_u32::<LittleEndian>(len).map_err(|e| Error::internal(e.to_string()))?;
        out.extend_from_slice(data);
    }
    Ok(out)
}

pub const AAD_PURPOSE_SIZE: usize = 16;
pub const AAD_UUID_SIZE: usize = 16;
pub const AAD_SIZE: usize = SHA256_DIGEST_LENGTH + AAD_PURPOSE_SIZE + AAD_UUID_SIZE;

const PCE_SIGN_REPORT_PURPOSE: &[u8; AAD_PURPOSE_SIZE] = b"PCE Sign Report\0";
const PCE_SIGN_REPORT_UUID: [u8; AAD_UUID_SIZE] = [
    0x4d, 0x62, 0x36, 0x43, 0x69, 0x36, 0x4b, 0x4a,
    0x5b, 0x45, 0x67, 0x51, 0x3a, 0x71, 0x2e, 0x59,
];

/// Produces the 64 bytes an enclave places in its report data to bind the
/// report to some payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AadGenerator {
    purpose: [u8; AAD_PURPOSE_SIZE],
    uuid: [u8; AAD_UUID_SIZE],
}

impl AadGenerator {
    pub fn new(purpose: [u8; AAD_PURPOSE_SIZE], uuid: [u8; AAD_UUID_SIZE]) -> Self {
        AadGenerator { purpose, uuid }
    }

    /// The generator used for reports signed by the PCE.
    pub fn pce_sign_report() -> Self {
        AadGenerator::new(*PCE_SIGN_REPORT_PURPOSE, PCE_SIGN_REPORT_UUID)
    }

    /// `SHA-256(data) || purpose || uuid`
    pub fn generate(&self, data: &[u8]) -> [u8; AAD_SIZE] {
        let mut aad = [0u8; AAD_SIZE];
        aad[..SHA256_DIGEST_LENGTH].copy_from_slice(&sha256(data));
        aad[SHA256_DIGEST_LENGTH..][..AAD_PURPOSE_SIZE].copy_from_slice(&self.purpose);
        aad[SHA256_DIGEST_LENGTH + AAD_PURPOSE_SIZE..].copy_from_slice(&self.uuid);
        aad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_containers_are_length_prefixed() {
        let out = serialize_byte_containers(&["ab", "", "c"]).unwrap();
        assert_eq!(out, hex::decode("020000006162000000000100000063").unwrap());

        // Moving a byte across a boundary changes the encoding.
        let a = serialize_byte_containers(&["ab", "c"]).unwrap();
        let b = serialize_byte_containers(&["a", "bc"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn aad_layout() {
        let aad = AadGenerator::pce_sign_report().generate(b"abc");
        assert_eq!(
            &aad[..32],
            &hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad").unwrap()[..]
        );
        assert_eq!(&aad[32..48], b"PCE Sign Report\0");
        assert_eq!(&aad[48..], &PCE_SIGN_REPORT_UUID);
    }
}
