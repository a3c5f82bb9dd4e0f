/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Synthetic identities, hardware and certificates for unit tests.

use std::cell::Cell;

use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use prost::Message;
use sgx_isa::hardware::{Hardware, HardwareKey};
use sgx_isa::{Attributes, AttributesFlags, ErrorCode as HwError, Keypolicy, Keyrequest, Miscselect, Report, Targetinfo};

use crate::attestation_key::{
    AttestationKeyCertificate, ATTESTATION_PUBLIC_KEY_PURPOSE, ATTESTATION_PUBLIC_KEY_VERSION,
    PCE_SIGN_REPORT_PAYLOAD_VERSION,
};
use crate::certificate::{CertificateInterface, KeyUsageInformation, VerificationConfig};
use crate::crypto::signing::{EcdsaP256Sha256SigningKey, SigningKey};
use crate::crypto::{sha256, AadGenerator};
use crate::error::Result;
use crate::identity::{
    CodeIdentity, MachineConfiguration, SgxIdentity, SgxIdentityExpectation, SgxIdentityMatchSpec, SgxType,
    SGX_AUTHORITY_TYPE,
};
use crate::proto::{
    AsymmetricKeyEncoding, AsymmetricSigningKeyProto, AttestationPublicKey, Certificate, EnclaveIdentity,
    EnclaveIdentityDescription, EnclaveIdentityExpectation, EnclaveIdentityType, PceSignReportPayload,
    SignatureScheme, SigningKeyType,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn identity() -> SgxIdentity {
    SgxIdentity {
        code_identity: CodeIdentity {
            mrenclave: [0x11; 32],
            mrsigner: [0x22; 32],
            isvprodid: 7,
            isvsvn: 3,
            miscselect: Miscselect::EXINFO.bits(),
            attributes: Attributes { flags: AttributesFlags::INIT | AttributesFlags::MODE64BIT, xfrm: 0x3 },
        },
        machine_configuration: MachineConfiguration { cpu_svn: Some([0x33; 16]), sgx_type: Some(SgxType::Standard) },
    }
}

pub fn expectation(match_spec: SgxIdentityMatchSpec) -> SgxIdentityExpectation {
    SgxIdentityExpectation { reference_identity: identity(), match_spec }
}

/// Encodes `expectation` the way secrets sealed before versioned identities
/// did: a code identity without a version tag.
pub fn legacy_expectation(expectation: &SgxIdentityExpectation) -> EnclaveIdentityExpectation {
    EnclaveIdentityExpectation {
        reference_identity: Some(EnclaveIdentity {
            description: Some(EnclaveIdentityDescription {
                identity_type: EnclaveIdentityType::CodeIdentity as i32,
                authority_type: SGX_AUTHORITY_TYPE.to_owned(),
            }),
            identity: expectation.reference_identity.code_identity.to_proto().encode_to_vec(),
            version: None,
        }),
        match_spec: expectation.match_spec.code_identity_match_spec.to_proto().encode_to_vec(),
    }
}

pub fn report_for(identity: &SgxIdentity, reportdata: [u8; 64]) -> Report {
    let code = &identity.code_identity;
    let mut report = Report::default();
    report.body.cpusvn = identity.machine_configuration.cpu_svn.unwrap_or_default();
    report.body.miscselect = Miscselect::from_bits_retain(code.miscselect);
    report.body.attributes = code.attributes;
    report.body.mrenclave = code.mrenclave;
    report.body.mrsigner = code.mrsigner;
    report.body.isvprodid = code.isvprodid;
    report.body.isvsvn = code.isvsvn;
    report.body.reportdata = reportdata;
    report.keyid = [0x44; 32];
    report.mac = [0x55; 16];
    report
}

/// Stands in for `EGETKEY`/`EREPORT`. Keys depend on a root secret, the
/// identity selected by the key policy and the whole key request.
pub struct FakeHardware {
    root: [u8; 32],
    identity: SgxIdentity,
    key_calls: Cell<usize>,
}

impl FakeHardware {
    pub fn new(identity: SgxIdentity) -> Self {
        Self::with_root(identity, [0x5a; 32])
    }

    pub fn with_root(identity: SgxIdentity, root: [u8; 32]) -> Self {
        FakeHardware { root, identity, key_calls: Cell::new(0) }
    }

    pub fn key_calls(&self) -> usize {
        self.key_calls.get()
    }
}

impl Hardware for FakeHardware {
    fn get_hardware_key(&self, request: &Keyrequest) -> std::result::Result<HardwareKey, u32> {
        self.key_calls.set(self.key_calls.get() + 1);
        let code = &self.identity.code_identity;
        if request.isvsvn > code.isvsvn {
            return Err(HwError::InvalidIsvsvn as u32);
        }
        let mut material = self.root.to_vec();
        if request.keypolicy.contains(Keypolicy::MRENCLAVE) {
            material.extend_from_slice(&code.mrenclave);
        }
        if request.keypolicy.contains(Keypolicy::MRSIGNER) {
            material.extend_from_slice(&code.mrsigner);
        }
        material.extend_from_slice(&request.to_bytes());
        let mut key = [0; 16];
        key.copy_from_slice(&sha256(&material)[..16]);
        Ok(key)
    }

    fn get_hardware_report(&self, _targetinfo: &Targetinfo, reportdata: &[u8; 64]) -> std::result::Result<Report, u32> {
        Ok(report_for(&self.identity, *reportdata))
    }
}

pub fn signing_key(seed: u8) -> EcdsaP256Sha256SigningKey {
    EcdsaP256Sha256SigningKey::from_scalar_bytes(&[seed; 32]).unwrap()
}

pub fn verifying_key_pem(key: &dyn SigningKey) -> String {
    let der = key.verifying_key().serialize_to_der().unwrap();
    p256::ecdsa::VerifyingKey::from_public_key_der(&der).unwrap().to_public_key_pem(LineEnding::LF).unwrap()
}

/// An issuer certificate that is nothing but a public key.
pub struct KeyCertificate {
    der: Vec<u8>,
}

impl KeyCertificate {
    pub fn new(key: &dyn SigningKey) -> Self {
        KeyCertificate { der: key.verifying_key().serialize_to_der().unwrap() }
    }
}

impl CertificateInterface for KeyCertificate {
    fn subject_key_der(&self) -> Result<Vec<u8>> {
        Ok(self.der.clone())
    }

    fn verify(&self, _issuer: &dyn CertificateInterface, _config: &VerificationConfig) -> Result<()> {
        Ok(())
    }

    fn is_ca(&self) -> Option<bool> {
        Some(true)
    }

    fn cert_path_length(&self) -> Option<i64> {
        None
    }

    fn key_usage(&self) -> Option<KeyUsageInformation> {
        None
    }
}

pub fn pce_sign_report_payload(subject: &dyn SigningKey) -> PceSignReportPayload {
    PceSignReportPayload {
        version: Some(PCE_SIGN_REPORT_PAYLOAD_VERSION.to_owned()),
        attestation_public_key: Some(AttestationPublicKey {
            version: Some(ATTESTATION_PUBLIC_KEY_VERSION.to_owned()),
            purpose: Some(ATTESTATION_PUBLIC_KEY_PURPOSE.to_owned()),
            attestation_public_key: Some(AsymmetricSigningKeyProto {
                key_type: SigningKeyType::VerifyingKey as i32,
                signature_scheme: SignatureScheme::EcdsaP256Sha256 as i32,
                encoding: AsymmetricKeyEncoding::AsymmetricKeyDer as i32,
                key: subject.verifying_key().serialize_to_der().unwrap(),
            }),
        }),
    }
}

/// A report of [`identity`] bound to `payload`, signed by `issuer`.
pub fn signed_report(issuer: &dyn SigningKey, payload: &[u8]) -> (Report, crate::proto::Signature) {
    let report = report_for(&identity(), AadGenerator::pce_sign_report().generate(payload));
    let signature = issuer.sign(&report.to_bytes()).unwrap();
    (report, signature)
}

pub fn attestation_key_certificate_for_payload(issuer: &dyn SigningKey, payload: &PceSignReportPayload) -> Certificate {
    let payload = payload.encode_to_vec();
    let (report, signature) = signed_report(issuer, &payload);
    AttestationKeyCertificate::envelope(payload, &report, signature)
}

pub fn attestation_key_certificate(issuer: &dyn SigningKey, subject: &dyn SigningKey) -> Certificate {
    attestation_key_certificate_for_payload(issuer, &pce_sign_report_payload(subject))
}
