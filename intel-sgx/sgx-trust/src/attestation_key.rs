/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Certificates binding an assertion generator enclave's attestation key to
//! the hardware identity of that enclave, signed by the PCE.

use std::convert::TryFrom;
use std::str;

use prost::Message;
use sgx_isa::Report;
use subtle::ConstantTimeEq;

use crate::certificate::{CertificateInterface, KeyUsageInformation, VerificationConfig};
use crate::crypto::signing::{verifying_key_from_der, verifying_key_from_pem};
use crate::crypto::AadGenerator;
use crate::error::{Error, Result};
use crate::identity::{parse_identity_from_hardware_report, SgxIdentity};
use crate::proto::{
    self, AsymmetricKeyEncoding, AsymmetricSigningKeyProto, Certificate, CertificateFormat, PceSignReportPayload,
    ReportProto, Signature, SignatureScheme, SigningKeyType,
};

pub const ATTESTATION_PUBLIC_KEY_VERSION: &str = "Assertion Generator Enclave Attestation Key v0.1";
pub const ATTESTATION_PUBLIC_KEY_PURPOSE: &str = "Assertion Generator Enclave Attestation Key";
pub const PCE_SIGN_REPORT_PAYLOAD_VERSION: &str = "PCE Sign Report v0.1";

/// The only scheme the PCE signs with.
const EXPECTED_SIGNATURE_SCHEME: SignatureScheme = SignatureScheme::EcdsaP256Sha256;

fn scheme_name(scheme: i32) -> String {
    match SignatureScheme::try_from(scheme) {
        Ok(scheme) => format!("{:?}", scheme),
        Err(_) => scheme.to_string(),
    }
}

/// A validated attestation key certificate.
#[derive(Clone, Debug)]
pub struct AttestationKeyCertificate {
    pce_sign_report_payload: Vec<u8>,
    report_bytes: Vec<u8>,
    signature: Signature,
    subject_key: AsymmetricSigningKeyProto,
    report: Report,
}

impl AttestationKeyCertificate {
    /// Wraps the parts of an attestation key certificate in a certificate
    /// envelope. Nothing is validated.
    pub fn envelope(pce_sign_report_payload: Vec<u8>, report: &Report, signature: Signature) -> Certificate {
        let certificate = proto::AttestationKeyCertificate {
            pce_sign_report_payload: Some(pce_sign_report_payload),
            report: Some(ReportProto { value: report.to_bytes().to_vec() }),
            signature: Some(signature),
        };
        Certificate {
            format: CertificateFormat::SgxAttestationKeyCertificate as i32,
            data: Some(certificate.encode_to_vec()),
        }
    }

    pub fn create(certificate: &Certificate) -> Result<Self> {
        Self::create_with_aad_generator(certificate, &AadGenerator::pce_sign_report())
    }

    /// Parses and validates `certificate`. The report data must equal
    /// `aad_generator` applied to the serialized payload.
    pub fn create_with_aad_generator(certificate: &Certificate, aad_generator: &AadGenerator) -> Result<Self> {
        if certificate.format != CertificateFormat::SgxAttestationKeyCertificate as i32 {
            return Err(Error::invalid_argument(format!(
                "The certificate format ({}) does not match the expected format (SGX_ATTESTATION_KEY_CERTIFICATE)",
                certificate.format
            )));
        }

        let data = certificate.data.as_deref().unwrap_or_default();
        let akc = proto::AttestationKeyCertificate::decode(data).map_err(|_| {
            Error::invalid_argument("Could not parse Attestation Key Certificate from certificate data")
        })?;
        let (payload_bytes, report_proto, signature) = match akc {
            proto::AttestationKeyCertificate {
                pce_sign_report_payload: Some(payload),
                report: Some(report),
                signature: Some(signature),
            } => (payload, report, signature),
            _ => return Err(Error::invalid_argument("Attestation Key Certificate is missing required data")),
        };

        let payload = PceSignReportPayload::decode(&payload_bytes[..])
            .map_err(|_| Error::invalid_argument("Could not parse the serialized PceSignReportPayload message"))?;
        if payload.version.as_deref() != Some(PCE_SIGN_REPORT_PAYLOAD_VERSION) {
            return Err(Error::internal(format!(
                "PceSignReportPayload version ({}) does not match the expected version ({})",
                payload.version.as_deref().unwrap_or_default(),
                PCE_SIGN_REPORT_PAYLOAD_VERSION
            )));
        }

        if signature.signature_scheme != EXPECTED_SIGNATURE_SCHEME as i32 {
            return Err(Error::invalid_argument(format!(
                "Signature scheme of signature ({}) does not match the signature scheme used by the PCE implementation ({:?})",
                scheme_name(signature.signature_scheme),
                EXPECTED_SIGNATURE_SCHEME
            )));
        }

        let public_key = payload.attestation_public_key.unwrap_or_default();
        if public_key.version.as_deref() != Some(ATTESTATION_PUBLIC_KEY_VERSION) {
            return Err(Error::invalid_argument(format!(
                "Version of attestation public key ({}) does not match the expected version ({})",
                public_key.version.as_deref().unwrap_or_default(),
                ATTESTATION_PUBLIC_KEY_VERSION
            )));
        }
        if public_key.purpose.as_deref() != Some(ATTESTATION_PUBLIC_KEY_PURPOSE) {
            return Err(Error::invalid_argument(format!(
                "Purpose of the attestation public key ({}) does not match the expected purpose ({})",
                public_key.purpose.as_deref().unwrap_or_default(),
                ATTESTATION_PUBLIC_KEY_PURPOSE
            )));
        }
        let subject_key = public_key
            .attestation_public_key
            .ok_or_else(|| Error::invalid_argument("Attestation public key is missing its key"))?;

        let expected_aad = aad_generator.generate(&payload_bytes);
        let report = Report::try_copy_from(&report_proto.value).ok_or_else(|| {
            Error::invalid_argument(format!(
                "Report is {} bytes, {} expected",
                report_proto.value.len(),
                Report::UNPADDED_SIZE
            ))
        })?;
        if !bool::from(report.body.reportdata[..].ct_eq(&expected_aad[..])) {
            return Err(Error::invalid_argument(format!(
                "Additional authenticated data generated from the PCE Sign Report payload ({}) should be consistent with the REPORTDATA section ({})",
                base16::encode_lower(&expected_aad),
                base16::encode_lower(&report.body.reportdata)
            )));
        }

        Ok(AttestationKeyCertificate {
            pce_sign_report_payload: payload_bytes,
            report_bytes: report_proto.value,
            signature,
            subject_key,
            report,
        })
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn pce_sign_report_payload(&self) -> &[u8] {
        &self.pce_sign_report_payload
    }

    /// The identity of the enclave that holds the attestation key.
    pub fn asserted_identity(&self) -> Result<SgxIdentity> {
        let report = Report::try_copy_from(&self.report_bytes)
            .ok_or_else(|| Error::internal("Attestation Key Certificate holds a malformed report"))?;
        Ok(parse_identity_from_hardware_report(&report))
    }
}

impl CertificateInterface for AttestationKeyCertificate {
    fn subject_key_der(&self) -> Result<Vec<u8>> {
        let key = &self.subject_key;
        if key.key_type != SigningKeyType::VerifyingKey as i32 {
            return Err(Error::invalid_argument(format!(
                "Key type of the attestation public key ({}) does not match expected key type (VERIFYING_KEY)",
                key.key_type
            )));
        }
        match AsymmetricKeyEncoding::try_from(key.encoding) {
            Ok(AsymmetricKeyEncoding::AsymmetricKeyDer) => Ok(key.key.clone()),
            Ok(AsymmetricKeyEncoding::AsymmetricKeyPem) => {
                if key.signature_scheme == SignatureScheme::UnknownSignatureScheme as i32 {
                    return Err(Error::invalid_argument(
                        "Could not DER encode a key with an unknown signature scheme",
                    ));
                }
                let pem = str::from_utf8(&key.key)
                    .map_err(|_| Error::invalid_argument("PEM-encoded key is not valid UTF-8"))?;
                verifying_key_from_pem(key.signature_scheme, pem)?.serialize_to_der()
            }
            _ => Err(Error::internal("Asymmetric key encoding unknown")),
        }
    }

    fn verify(&self, issuer: &dyn CertificateInterface, _config: &VerificationConfig) -> Result<()> {
        let issuer_key = issuer.subject_key_der()?;
        let verifying_key = verifying_key_from_der(self.signature.signature_scheme, &issuer_key)?;
        verifying_key.verify(&self.report_bytes, &self.signature)
    }

    fn is_ca(&self) -> Option<bool> {
        Some(false)
    }

    fn cert_path_length(&self) -> Option<i64> {
        None
    }

    fn key_usage(&self) -> Option<KeyUsageInformation> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signing::SigningKey;
    use crate::test_support::{self, KeyCertificate};
    use crate::ErrorCode;

    fn decode_envelope(certificate: &Certificate) -> proto::AttestationKeyCertificate {
        proto::AttestationKeyCertificate::decode(certificate.data.as_deref().unwrap()).unwrap()
    }

    fn reencode(akc: &proto::AttestationKeyCertificate) -> Certificate {
        Certificate {
            format: CertificateFormat::SgxAttestationKeyCertificate as i32,
            data: Some(akc.encode_to_vec()),
        }
    }

    #[test]
    fn verify_valid_certificate() {
        let issuer = test_support::signing_key(10);
        let certificate = test_support::attestation_key_certificate(&issuer, &test_support::signing_key(11));
        let akc = AttestationKeyCertificate::create(&certificate).unwrap();
        akc.verify(&KeyCertificate::new(&issuer), &VerificationConfig::default()).unwrap();

        assert_eq!(akc.is_ca(), Some(false));
        assert_eq!(akc.cert_path_length(), None);
        assert_eq!(akc.key_usage(), None);
    }

    #[test]
    fn flipped_report_byte_fails_verification() {
        let issuer = test_support::signing_key(10);
        let certificate = test_support::attestation_key_certificate(&issuer, &test_support::signing_key(11));
        let mut akc = decode_envelope(&certificate);
        // Outside of the report data, so that creation still succeeds.
        for &offset in [0usize, 100, 300, Report::UNPADDED_SIZE - 1].iter() {
            let mut tampered = akc.clone();
            tampered.report.as_mut().unwrap().value[offset] ^= 0x01;
            let cert = AttestationKeyCertificate::create(&reencode(&tampered)).unwrap();
            assert!(cert.verify(&KeyCertificate::new(&issuer), &VerificationConfig::default()).is_err());
        }

        // Wrong issuer.
        let cert = AttestationKeyCertificate::create(&certificate).unwrap();
        let other = test_support::signing_key(12);
        assert!(cert.verify(&KeyCertificate::new(&other), &VerificationConfig::default()).is_err());

        // A report data byte breaks the binding.
        akc.report.as_mut().unwrap().value[320] ^= 0x01;
        let err = AttestationKeyCertificate::create(&reencode(&akc)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.message().starts_with("Additional authenticated data"));
    }

    #[test]
    fn wrong_format_is_rejected_before_parsing() {
        for format in [CertificateFormat::UnknownFormat, CertificateFormat::X509Der, CertificateFormat::X509Pem].iter() {
            let certificate = Certificate { format: *format as i32, data: Some(vec![0xff; 7]) };
            let err = AttestationKeyCertificate::create(&certificate).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidArgument);
            assert!(err.message().starts_with("The certificate format"));
        }
    }

    #[test]
    fn malformed_envelopes() {
        let certificate = Certificate {
            format: CertificateFormat::SgxAttestationKeyCertificate as i32,
            data: Some(vec![0xff; 7]),
        };
        assert_eq!(AttestationKeyCertificate::create(&certificate).unwrap_err().code(), ErrorCode::InvalidArgument);

        let issuer = test_support::signing_key(10);
        let valid = decode_envelope(&test_support::attestation_key_certificate(&issuer, &test_support::signing_key(11)));

        let mut missing = valid.clone();
        missing.signature = None;
        let err = AttestationKeyCertificate::create(&reencode(&missing)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.message(), "Attestation Key Certificate is missing required data");

        let mut garbage = valid.clone();
        garbage.pce_sign_report_payload = Some(vec![0xff; 3]);
        assert_eq!(AttestationKeyCertificate::create(&reencode(&garbage)).unwrap_err().code(), ErrorCode::InvalidArgument);

        let mut short_report = valid.clone();
        short_report.report.as_mut().unwrap().value.pop();
        assert_eq!(
            AttestationKeyCertificate::create(&reencode(&short_report)).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );

        let mut wrong_scheme = valid;
        wrong_scheme.signature.as_mut().unwrap().signature_scheme = SignatureScheme::UnknownSignatureScheme as i32;
        assert_eq!(
            AttestationKeyCertificate::create(&reencode(&wrong_scheme)).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
    }

    #[test]
    fn payload_version_skew_is_internal() {
        let issuer = test_support::signing_key(10);
        let mut payload = test_support::pce_sign_report_payload(&test_support::signing_key(11));
        payload.version = Some("PCE Sign Report v0.2".into());
        let certificate = test_support::attestation_key_certificate_for_payload(&issuer, &payload);
        let err = AttestationKeyCertificate::create(&certificate).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn public_key_version_and_purpose() {
        let issuer = test_support::signing_key(10);
        let mut payload = test_support::pce_sign_report_payload(&test_support::signing_key(11));
        payload.attestation_public_key.as_mut().unwrap().purpose = Some("Something else".into());
        let certificate = test_support::attestation_key_certificate_for_payload(&issuer, &payload);
        let err = AttestationKeyCertificate::create(&certificate).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.message().starts_with("Purpose of the attestation public key"));

        let mut payload = test_support::pce_sign_report_payload(&test_support::signing_key(11));
        payload.attestation_public_key.as_mut().unwrap().version = None;
        let certificate = test_support::attestation_key_certificate_for_payload(&issuer, &payload);
        let err = AttestationKeyCertificate::create(&certificate).unwrap_err();
        assert!(err.message().starts_with("Version of attestation public key"));
    }

    #[test]
    fn subject_key_der_encodings() {
        let issuer = test_support::signing_key(10);
        let subject = test_support::signing_key(11);
        let expected = subject.verifying_key().serialize_to_der().unwrap();

        let certificate = test_support::attestation_key_certificate(&issuer, &subject);
        let akc = AttestationKeyCertificate::create(&certificate).unwrap();
        assert_eq!(akc.subject_key_der().unwrap(), expected);

        let mut payload = test_support::pce_sign_report_payload(&subject);
        let key = payload.attestation_public_key.as_mut().unwrap().attestation_public_key.as_mut().unwrap();
        key.encoding = AsymmetricKeyEncoding::AsymmetricKeyPem as i32;
        key.key = test_support::verifying_key_pem(&subject).into_bytes();
        let akc = AttestationKeyCertificate::create(&test_support::attestation_key_certificate_for_payload(&issuer, &payload))
            .unwrap();
        assert_eq!(akc.subject_key_der().unwrap(), expected);

        let mut payload = test_support::pce_sign_report_payload(&subject);
        let key = payload.attestation_public_key.as_mut().unwrap().attestation_public_key.as_mut().unwrap();
        key.key_type = SigningKeyType::SigningKey as i32;
        let akc = AttestationKeyCertificate::create(&test_support::attestation_key_certificate_for_payload(&issuer, &payload))
            .unwrap();
        assert_eq!(akc.subject_key_der().unwrap_err().code(), ErrorCode::InvalidArgument);

        let mut payload = test_support::pce_sign_report_payload(&subject);
        let key = payload.attestation_public_key.as_mut().unwrap().attestation_public_key.as_mut().unwrap();
        key.encoding = AsymmetricKeyEncoding::UnknownAsymmetricKeyEncoding as i32;
        let akc = AttestationKeyCertificate::create(&test_support::attestation_key_certificate_for_payload(&issuer, &payload))
            .unwrap();
        assert_eq!(akc.subject_key_der().unwrap_err().code(), ErrorCode::Internal);
    }

    #[test]
    fn asserted_identity_comes_from_the_report() {
        let issuer = test_support::signing_key(10);
        let certificate = test_support::attestation_key_certificate(&issuer, &test_support::signing_key(11));
        let akc = AttestationKeyCertificate::create(&certificate).unwrap();
        let identity = akc.asserted_identity().unwrap();
        assert_eq!(identity.code_identity, test_support::identity().code_identity);
    }
}
