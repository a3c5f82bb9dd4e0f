/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#![doc(html_logo_url = "https://edp.fortanix.com/img/docs/edp-logo.svg",
       html_favicon_url = "https://edp.fortanix.com/favicon.ico",
       html_root_url = "https://edp.fortanix.com/docs/api/")]

#[macro_use]
extern crate num_derive;

use sgx_isa::{Report, Targetinfo};

pub mod quote;

/// Status codes of the Provisioning Certification Enclave library.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum PceError {
    Success              = 0x0000,
    Unexpected           = 0xF001,
    InvalidParameter     = 0xF002,
    OutOfEpc             = 0xF003,
    InterfaceUnavailable = 0xF004,
    InvalidReport        = 0xF005,
    CryptoError          = 0xF006,
    InvalidPrivilege     = 0xF007,
    InvalidTcb           = 0xF008,
}

/// Status codes of the DCAP Quoting Library.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Quote3Error {
    Success                   = 0x0000,
    Unexpected                = 0xE001,
    InvalidParameter          = 0xE002,
    OutOfMemory               = 0xE003,
    EcdsaIdMismatch           = 0xE004,
    PathnameBufferOverflow    = 0xE005,
    FileAccessError           = 0xE006,
    StoredKey                 = 0xE007,
    PubKeyIdMismatch          = 0xE008,
    InvalidPceSigScheme       = 0xE009,
    AttKeyBlobError           = 0xE00A,
    UnsupportedAttKeyId       = 0xE00B,
    UnsupportedLoadingPolicy  = 0xE00C,
    InterfaceUnavailable      = 0xE00D,
    PlatformLibUnavailable    = 0xE00E,
    AttKeyNotInitialized      = 0xE00F,
    AttKeyCertDataInvalid     = 0xE010,
    NoPlatformCertData        = 0xE011,
    OutOfEpc                  = 0xE012,
    ErrorReport               = 0xE013,
    EnclaveLost               = 0xE014,
    InvalidReport             = 0xE015,
    EnclaveLoadError          = 0xE016,
    UnableToGenerateQeReport  = 0xE017,
    KeyCertificationError     = 0xE018,
    NetworkError              = 0xE019,
    MessageError              = 0xE01A,
    InvalidPrivilege          = 0xE035,
}

/// PCE crypto suite for PPID encryption with RSA-3072 OAEP.
pub const PCE_ALG_RSA_OAEP_3072: u8 = 1;
/// Size of a PPID encrypted under `PCE_ALG_RSA_OAEP_3072`.
pub const PCE_RSA_OAEP_3072_ENCRYPTED_SIZE: usize = 384;
/// PCE signature scheme for ECDSA over NIST P-256 with SHA-256.
pub const PCE_NIST_P256_ECDSA_SHA256: u8 = 0;
/// Size of a raw `r || s` ECDSA P-256 signature as produced by the PCE.
pub const ECDSA_P256_SIGNATURE_SIZE: usize = 64;

/// Output of `sgx_get_pce_info`, apart from the encrypted PPID buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PceInfo {
    pub encrypted_ppid_len: usize,
    pub pce_isvsvn: u16,
    pub pce_id: u16,
    pub signature_scheme: u8,
}

/// The functions of `libsgx_pce` and `libsgx_dcap_ql` used for provisioning.
///
/// Implementations are expected to be plain pass-throughs to the Intel
/// libraries. Errors are the raw library status value, which the caller maps
/// through [`PceError`] or [`Quote3Error`]; a value unknown to those enums must
/// still be reported.
pub trait DcapLibrary {
    fn qe_set_enclave_dirpath(&self, dirpath: &str) -> Result<(), u32>;

    fn pce_get_target(&self) -> Result<(Targetinfo, u16), u32>;

    /// Fills `encrypted_ppid` and returns the PCE identity information.
    fn get_pce_info(
        &self,
        report: &Report,
        ppid_encryption_key: &[u8],
        crypto_suite: u8,
        encrypted_ppid: &mut [u8],
    ) -> Result<PceInfo, u32>;

    /// Fills `signature` and returns the number of bytes written.
    fn pce_sign_report(
        &self,
        isv_svn: u16,
        cpu_svn: &[u8; 16],
        report: &Report,
        signature: &mut [u8],
    ) -> Result<usize, u32>;

    fn qe_get_target_info(&self) -> Result<Targetinfo, u32>;

    fn qe_get_quote_size(&self) -> Result<u32, u32>;

    fn qe_get_quote(&self, report: &Report, quote: &mut [u8]) -> Result<(), u32>;
}

#[cfg(test)]
mod tests {
    use num_traits::FromPrimitive;

    use super::*;

    #[test]
    fn status_codes_decode() {
        assert_eq!(PceError::from_u32(0xF007), Some(PceError::InvalidPrivilege));
        assert_eq!(PceError::from_u32(0xF009), None);
        assert_eq!(Quote3Error::from_u32(0xE00F), Some(Quote3Error::AttKeyNotInitialized));
        assert_eq!(Quote3Error::from_u32(0xE003), Some(Quote3Error::OutOfMemory));
        assert_eq!(Quote3Error::from_u32(0x1234), None);
    }
}
