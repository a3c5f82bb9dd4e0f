/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Drives the infrastructural enclaves of an SGX node: the Assertion
//! Generator Enclave and the Intel Provisioning Certification Enclave.
//!
//! Every method is a single pass through to one enclave, with its inputs
//! checked and its outputs converted. Nothing is retried or cached.

use std::convert::TryFrom;

use sgx_isa::{Report, Targetinfo};

use crate::age::{AssertionGeneratorEnclave, GenerateKeyAndCsrOutput};
use crate::attestation_key::AttestationKeyCertificate;
use crate::crypto::signing::ecdsa_p256_signature_from_raw;
use crate::error::{Error, Result};
use crate::identity::{SgxIdentity, CPUSVN_SIZE};
use crate::intel_ae::IntelArchitecturalEnclaveInterface;
use crate::proto::{
    AsymmetricEncryptionKeyProto, AsymmetricEncryptionScheme, Certificate, CertificateChain, CpuSvn, PceId, PceSvn,
    ReportProto, SealedSecret, Signature, SignatureScheme, TargetInfoProto, TargetedCertificateSigningRequest,
};

/// What the PCE reports in `pce_get_info`.
#[derive(Clone, Debug, PartialEq)]
pub struct PceInfo {
    pub pce_svn: PceSvn,
    pub pce_id: PceId,
    pub pck_signature_scheme: SignatureScheme,
    pub encrypted_ppid: Vec<u8>,
}

/// A freshly generated attestation key, certified by the PCK.
#[derive(Clone, Debug)]
pub struct CertifiedAttestationKey {
    pub certificate: Certificate,
    pub attestation_key_certificate: AttestationKeyCertificate,
    pub targeted_csr: TargetedCertificateSigningRequest,
}

fn report_from_proto(proto: &ReportProto) -> Result<Report> {
    Report::try_copy_from(&proto.value).ok_or_else(|| {
        Error::invalid_argument(format!(
            "Report is {} bytes, {} expected",
            proto.value.len(),
            Report::UNPADDED_SIZE
        ))
    })
}

fn cpu_svn_from_proto(proto: &CpuSvn) -> Result<[u8; CPUSVN_SIZE]> {
    <[u8; CPUSVN_SIZE]>::try_from(&proto.value[..]).map_err(|_| {
        Error::invalid_argument(format!("CPUSVN is {} bytes, {} expected", proto.value.len(), CPUSVN_SIZE))
    })
}

fn pce_svn_from_proto(proto: &PceSvn) -> Result<u16> {
    let value = proto.value.ok_or_else(|| Error::invalid_argument("PceSvn does not have a value"))?;
    u16::try_from(value).map_err(|_| Error::invalid_argument(format!("PCESVN {} does not fit in 16 bits", value)))
}

fn target_info_from_proto(proto: &TargetInfoProto) -> Result<Targetinfo> {
    Targetinfo::try_copy_from(&proto.value).ok_or_else(|| {
        Error::invalid_argument(format!(
            "Target info is {} bytes, {} expected",
            proto.value.len(),
            Targetinfo::UNPADDED_SIZE
        ))
    })
}

pub struct SgxInfrastructuralEnclaveManager {
    intel_ae: Box<dyn IntelArchitecturalEnclaveInterface>,
    assertion_generator_enclave: Box<dyn AssertionGeneratorEnclave>,
}

impl SgxInfrastructuralEnclaveManager {
    pub fn new(
        intel_ae: Box<dyn IntelArchitecturalEnclaveInterface>,
        assertion_generator_enclave: Box<dyn AssertionGeneratorEnclave>,
    ) -> Self {
        SgxInfrastructuralEnclaveManager { intel_ae, assertion_generator_enclave }
    }

    pub fn age_generate_key_and_csr(&self, pce_target_info: &TargetInfoProto) -> Result<GenerateKeyAndCsrOutput> {
        debug!("AGE: generating attestation key and CSR");
        target_info_from_proto(pce_target_info)?;
        self.assertion_generator_enclave.generate_key_and_csr(pce_target_info)
    }

    pub fn age_generate_pce_info_sgx_hardware_report(
        &self,
        pce_target_info: &TargetInfoProto,
        ppid_encryption_key: &AsymmetricEncryptionKeyProto,
    ) -> Result<ReportProto> {
        debug!("AGE: generating PCE info report");
        target_info_from_proto(pce_target_info)?;
        self.assertion_generator_enclave
            .generate_pce_info_sgx_hardware_report(pce_target_info, ppid_encryption_key)
    }

    pub fn age_update_certs(&self, cert_chains: &[CertificateChain]) -> Result<SealedSecret> {
        debug!("AGE: updating {} certificate chains", cert_chains.len());
        self.assertion_generator_enclave.update_certs(cert_chains)
    }

    pub fn age_start_server(&self) -> Result<()> {
        debug!("AGE: starting server");
        self.assertion_generator_enclave.start_server(None)
    }

    pub fn age_start_server_with_secret(&self, secret: &SealedSecret) -> Result<()> {
        debug!("AGE: starting server from sealed secret");
        self.assertion_generator_enclave.start_server(Some(secret))
    }

    pub fn age_get_sgx_identity(&self) -> Result<SgxIdentity> {
        let proto = self.assertion_generator_enclave.get_sgx_identity()?;
        SgxIdentity::from_proto(&proto)
    }

    /// Target info of the PCE, and its ISVSVN.
    pub fn pce_get_target_info(&self) -> Result<(TargetInfoProto, PceSvn)> {
        debug!("PCE: getting target info");
        let (targetinfo, pce_svn) = self.intel_ae.get_pce_target_info()?;
        Ok((TargetInfoProto { value: targetinfo.to_bytes().to_vec() }, PceSvn { value: Some(pce_svn.into()) }))
    }

    /// `report` must be bound to `ppid_encryption_key`, see
    /// [`age_generate_pce_info_sgx_hardware_report`](Self::age_generate_pce_info_sgx_hardware_report).
    pub fn pce_get_info(&self, report: &ReportProto, ppid_encryption_key: &AsymmetricEncryptionKeyProto) -> Result<PceInfo> {
        debug!("PCE: getting info");
        let report = report_from_proto(report)?;
        let scheme = AsymmetricEncryptionScheme::try_from(ppid_encryption_key.encryption_scheme)
            .unwrap_or(AsymmetricEncryptionScheme::UnknownAsymmetricEncryptionScheme);
        let info = self.intel_ae.get_pce_info(&report, &ppid_encryption_key.key, scheme)?;
        Ok(PceInfo {
            pce_svn: PceSvn { value: Some(info.pce_svn.into()) },
            pce_id: PceId { value: Some(info.pce_id.into()) },
            pck_signature_scheme: info.signature_scheme,
            encrypted_ppid: info.encrypted_ppid,
        })
    }

    /// Signs `report` with the PCK of the TCB given by `target_pce_svn` and
    /// `target_cpu_svn`.
    pub fn pce_sign_report(&self, target_pce_svn: &PceSvn, target_cpu_svn: &CpuSvn, report: &ReportProto) -> Result<Signature> {
        let pce_svn = pce_svn_from_proto(target_pce_svn)?;
        let cpu_svn = cpu_svn_from_proto(target_cpu_svn)?;
        let report = report_from_proto(report)?;
        debug!("PCE: signing report for PCESVN {}", pce_svn);
        let raw = self.intel_ae.pce_sign_report(&report, pce_svn, &cpu_svn)?;
        ecdsa_p256_signature_from_raw(&raw)
    }

    /// Generates a new attestation key in the AGE and has the PCE certify it
    /// with the PCK of the given TCB.
    pub fn certify_attestation_key(&self, target_pce_svn: &PceSvn, target_cpu_svn: &CpuSvn) -> Result<CertifiedAttestationKey> {
        let (pce_target_info, _) = self.pce_get_target_info()?;
        let output = self.age_generate_key_and_csr(&pce_target_info)?;
        let signature = self.pce_sign_report(target_pce_svn, target_cpu_svn, &output.report)?;

        let report = report_from_proto(&output.report)?;
        let certificate = AttestationKeyCertificate::envelope(output.pce_sign_report_payload, &report, signature);
        let attestation_key_certificate = AttestationKeyCertificate::create(&certificate)?;
        debug!("Attestation key certified");
        Ok(CertifiedAttestationKey { certificate, attestation_key_certificate, targeted_csr: output.targeted_csr })
    }
}
