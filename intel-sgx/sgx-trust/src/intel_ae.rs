/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Intel architectural enclaves: the Provisioning Certification Enclave
//! and the Quoting Enclave.

use dcap_ql::{
    DcapLibrary, PceError, Quote3Error, ECDSA_P256_SIGNATURE_SIZE, PCE_ALG_RSA_OAEP_3072, PCE_NIST_P256_ECDSA_SHA256,
    PCE_RSA_OAEP_3072_ENCRYPTED_SIZE,
};
use num_traits::FromPrimitive;
use sgx_isa::{Report, Targetinfo};

use crate::error::{Error, Result};
use crate::proto::{AsymmetricEncryptionScheme, SignatureScheme};

/// What the PCE reports about itself and the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PceInfoResult {
    pub pce_svn: u16,
    pub pce_id: u16,
    pub signature_scheme: SignatureScheme,
    pub encrypted_ppid: Vec<u8>,
}

pub trait IntelArchitecturalEnclaveInterface {
    /// Directory the Intel enclaves are loaded from.
    fn set_enclave_dir(&self, path: &str) -> Result<()>;

    /// Target info of the PCE, and its ISVSVN.
    fn get_pce_target_info(&self) -> Result<(Targetinfo, u16)>;

    /// Returns the PCE identity and the PPID encrypted under `ppid_encryption_key`.
    fn get_pce_info(
        &self,
        report: &Report,
        ppid_encryption_key: &[u8],
        ppid_encryption_scheme: AsymmetricEncryptionScheme,
    ) -> Result<PceInfoResult>;

    /// Signs `report` with the PCK of the given TCB. Returns the raw
    /// signature.
    fn pce_sign_report(&self, report: &Report, target_pce_svn: u16, target_cpu_svn: &[u8; 16]) -> Result<Vec<u8>>;

    fn get_qe_target_info(&self) -> Result<Targetinfo>;

    fn get_qe_quote(&self, report: &Report) -> Result<Vec<u8>>;
}

pub fn pce_error(status: u32) -> Error {
    let message = |kind: &str| format!("PCE: {} ({:#x})", kind, status);
    match PceError::from_u32(status) {
        Some(PceError::Unexpected) => Error::Internal(message("unexpected error")),
        Some(PceError::OutOfEpc) => Error::Internal(message("out of EPC memory")),
        Some(PceError::InterfaceUnavailable) => Error::Internal(message("interface unavailable")),
        Some(PceError::CryptoError) => Error::Internal(message("cryptographic error")),
        Some(PceError::InvalidParameter) => Error::InvalidArgument(message("invalid parameter")),
        Some(PceError::InvalidReport) => Error::InvalidArgument(message("invalid report")),
        Some(PceError::InvalidTcb) => Error::InvalidArgument(message("invalid TCB")),
        Some(PceError::InvalidPrivilege) => Error::PermissionDenied(message("invalid privilege")),
        Some(PceError::Success) | None => Error::Unknown(message("unknown error")),
    }
}

pub fn quote3_error(status: u32) -> Error {
    let message = |kind: &str| format!("Quoting library: {} ({:#x})", kind, status);
    match Quote3Error::from_u32(status) {
        Some(Quote3Error::OutOfMemory) => Error::ResourceExhausted(message("out of memory")),
        Some(Quote3Error::OutOfEpc) => Error::ResourceExhausted(message("out of EPC memory")),
        Some(Quote3Error::PathnameBufferOverflow) => Error::OutOfRange(message("path name too long")),
        Some(Quote3Error::AttKeyNotInitialized) => {
            Error::FailedPrecondition(message("attestation key not initialized"))
        }
        Some(Quote3Error::InvalidParameter) => Error::InvalidArgument(message("invalid parameter")),
        Some(Quote3Error::InvalidReport) => Error::InvalidArgument(message("invalid report")),
        Some(Quote3Error::InvalidPrivilege) => Error::PermissionDenied(message("invalid privilege")),
        Some(Quote3Error::Success) | None => Error::Unknown(message("unknown error")),
        Some(other) => Error::Internal(message(&format!("{:?}", other))),
    }
}

/// The Intel enclaves as reached through the DCAP libraries.
pub struct DcapIntelArchitecturalEnclaveInterface<L: DcapLibrary> {
    library: L,
}

impl<L: DcapLibrary> DcapIntelArchitecturalEnclaveInterface<L> {
    pub fn new(library: L) -> Self {
        DcapIntelArchitecturalEnclaveInterface { library }
    }

    pub fn library(&self) -> &L {
        &self.library
    }
}

fn pce_crypto_suite(scheme: AsymmetricEncryptionScheme) -> Result<(u8, usize)> {
    match scheme {
        AsymmetricEncryptionScheme::Rsa3072Oaep => Ok((PCE_ALG_RSA_OAEP_3072, PCE_RSA_OAEP_3072_ENCRYPTED_SIZE)),
        other => Err(Error::invalid_argument(format!("Unsupported PPID encryption scheme {:?}", other))),
    }
}

fn signature_scheme(pce_scheme: u8) -> SignatureScheme {
    match pce_scheme {
        PCE_NIST_P256_ECDSA_SHA256 => SignatureScheme::EcdsaP256Sha256,
        _ => SignatureScheme::UnknownSignatureScheme,
    }
}

impl<L: DcapLibrary> IntelArchitecturalEnclaveInterface for DcapIntelArchitecturalEnclaveInterface<L> {
    fn set_enclave_dir(&self, path: &str) -> Result<()> {
        self.library.qe_set_enclave_dirpath(path).map_err(quote3_error)
    }

    fn get_pce_target_info(&self) -> Result<(Targetinfo, u16)> {
        self.library.pce_get_target().map_err(pce_error)
    }

    fn get_pce_info(
        &self,
        report: &Report,
        ppid_encryption_key: &[u8],
        ppid_encryption_scheme: AsymmetricEncryptionScheme,
    ) -> Result<PceInfoResult> {
        let (crypto_suite, encrypted_size) = pce_crypto_suite(ppid_encryption_scheme)?;
        let mut encrypted_ppid = vec![0; encrypted_size];
        let info = self
            .library
            .get_pce_info(report, ppid_encryption_key, crypto_suite, &mut encrypted_ppid)
            .map_err(pce_error)?;
        if info.encrypted_ppid_len > encrypted_size {
            return Err(Error::internal(format!(
                "PCE returned an encrypted PPID of {} bytes, at most {} expected",
                info.encrypted_ppid_len, encrypted_size
            )));
        }
        encrypted_ppid.truncate(info.encrypted_ppid_len);
        Ok(PceInfoResult {
            pce_svn: info.pce_isvsvn,
            pce_id: info.pce_id,
            signature_scheme: signature_scheme(info.signature_scheme),
            encrypted_ppid,
        })
    }

    fn pce_sign_report(&self, report: &Report, target_pce_svn: u16, target_cpu_svn: &[u8; 16]) -> Result<Vec<u8>> {
        let mut signature = vec![0; ECDSA_P256_SIGNATURE_SIZE];
        let len = self
            .library
            .pce_sign_report(target_pce_svn, target_cpu_svn, report, &mut signature)
            .map_err(pce_error)?;
        signature.truncate(len);
        Ok(signature)
    }

    fn get_qe_target_info(&self) -> Result<Targetinfo> {
        self.library.qe_get_target_info().map_err(quote3_error)
    }

    fn get_qe_quote(&self, report: &Report) -> Result<Vec<u8>> {
        let size = self.library.qe_get_quote_size().map_err(quote3_error)?;
        let mut quote = vec![0; size as usize];
        self.library.qe_get_quote(report, &mut quote).map_err(quote3_error)?;
        Ok(quote)
    }
}
