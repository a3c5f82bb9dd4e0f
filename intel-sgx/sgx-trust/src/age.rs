/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Assertion Generator Enclave, which holds the platform's attestation
//! key and serves assertions signed with it.

use crate::error::Result;
use crate::proto::{
    AsymmetricEncryptionKeyProto, CertificateChain, ReportProto, SealedSecret, SgxIdentityProto, TargetInfoProto,
    TargetedCertificateSigningRequest,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateKeyAndCsrOutput {
    /// Targeted at the PCE and bound to `pce_sign_report_payload`.
    pub report: ReportProto,
    pub pce_sign_report_payload: Vec<u8>,
    pub targeted_csr: TargetedCertificateSigningRequest,
}

/// Entry points of the Assertion Generator Enclave.
///
/// Implementations forward each call into the enclave and return its result
/// unchanged.
pub trait AssertionGeneratorEnclave {
    /// Generates a fresh attestation key and a CSR for it.
    fn generate_key_and_csr(&self, pce_target_info: &TargetInfoProto) -> Result<GenerateKeyAndCsrOutput>;

    /// A report targeted at the PCE and bound to `ppid_encryption_key`.
    fn generate_pce_info_sgx_hardware_report(
        &self,
        pce_target_info: &TargetInfoProto,
        ppid_encryption_key: &AsymmetricEncryptionKeyProto,
    ) -> Result<ReportProto>;

    /// Installs `cert_chains` for the current attestation key. Returns the
    /// key and certificates, sealed.
    fn update_certs(&self, cert_chains: &[CertificateChain]) -> Result<SealedSecret>;

    /// Starts the assertion generator server, from the enclave's current
    /// state or from `secret` when given.
    fn start_server(&self, secret: Option<&SealedSecret>) -> Result<()>;

    fn get_sgx_identity(&self) -> Result<SgxIdentityProto>;
}
