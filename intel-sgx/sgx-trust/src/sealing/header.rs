/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::convert::TryFrom;

use crate::error::{Error, Result};
use crate::identity::{
    match_identity_to_expectation, parse_sgx_expectation, SelfIdentity, SgxIdentityExpectation, CPUSVN_SIZE,
};
use crate::proto::{
    self, identity_acl_predicate, AeadScheme, EnclaveIdentityExpectation, SealedSecretAdditionalInfo,
    SealedSecretHeader, SealingRootInformation, SealingRootType,
};

/// Name of the sealing root of secrets sealed to the local SGX hardware.
pub const SGX_LOCAL_SECRET_SEALER_ROOT_NAME: &str = "SGX";

/// Everything needed to derive the key of a sealed secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyGenerationParams {
    pub aead_scheme: AeadScheme,
    pub expectation: SgxIdentityExpectation,
}

/// Secrets sealed before enclave identities were versioned.
///
/// Their client ACL holds a bare code identity, and their AEAD scheme is
/// only recorded as a cipher suite in the additional info.
pub(crate) mod legacy {
    use std::convert::TryFrom;

    use crate::proto::{AeadScheme, CipherSuite, EnclaveIdentityExpectation, SealedSecretHeader};

    pub fn is_legacy_expectation(expectation: &EnclaveIdentityExpectation) -> bool {
        expectation.reference_identity.as_ref().map_or(false, |identity| identity.version.is_none())
    }

    pub fn aead_scheme(cipher_suite: i32) -> AeadScheme {
        match CipherSuite::try_from(cipher_suite) {
            Ok(CipherSuite::Aes256GcmSiv) => AeadScheme::Aes256GcmSiv,
            _ => AeadScheme::UnknownAeadScheme,
        }
    }

    pub fn warn_deprecated(header: &SealedSecretHeader) {
        let name = if header.secret_name.is_empty() {
            "this secret".to_owned()
        } else {
            format!("secret {:?}", header.secret_name)
        };
        warn!(
            "Support for unsealing legacy secrets is deprecated and will be removed. \
             Please reseal {} with the current sealer.",
            name
        );
    }
}

pub(crate) fn check_root_info(root_info: &SealingRootInformation) -> Result<()> {
    if SealingRootType::try_from(root_info.sealing_root_type).ok() != Some(SealingRootType::Local) {
        return Err(Error::invalid_argument("Incorrect sealing_root_type"));
    }
    if root_info.sealing_root_name != SGX_LOCAL_SECRET_SEALER_ROOT_NAME {
        return Err(Error::invalid_argument("Incorrect sealing_root_name"));
    }
    Ok(())
}

pub(crate) fn client_expectation(header: &SealedSecretHeader) -> Result<&EnclaveIdentityExpectation> {
    match header.client_acl.as_ref().and_then(|acl| acl.item.as_ref()) {
        Some(identity_acl_predicate::Item::Expectation(expectation)) => Ok(expectation),
        _ => Err(Error::invalid_argument("Malformed client_acl")),
    }
}

/// Anything but AES-256-GCM-SIV is rejected.
pub fn parse_aead_scheme(scheme: AeadScheme) -> Result<AeadScheme> {
    match scheme {
        AeadScheme::Aes256GcmSiv => Ok(scheme),
        _ => Err(Error::invalid_argument(format!("Unsupported AeadScheme {}", scheme.name()))),
    }
}

pub fn is_legacy_sealed_secret(header: &SealedSecretHeader) -> bool {
    client_expectation(header).map_or(false, legacy::is_legacy_expectation)
}

/// Validates `header` and checks that `self_identity` is allowed to unseal
/// the secret it describes.
pub fn parse_key_generation_params(
    header: &SealedSecretHeader,
    self_identity: &SelfIdentity,
) -> Result<KeyGenerationParams> {
    let root_info = header
        .root_info
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("Incorrect sealing_root_type"))?;
    check_root_info(root_info)?;

    let generic = client_expectation(header)?;
    let is_legacy = legacy::is_legacy_expectation(generic);
    if is_legacy {
        legacy::warn_deprecated(header);
    }
    let mut expectation = parse_sgx_expectation(generic, is_legacy)?;

    let mut cipher_suite = None;
    if let Some(ref additional_info) = root_info.additional_info {
        let info: SealedSecretAdditionalInfo = proto::decode(additional_info, "additional_info")
            .map_err(|_| Error::invalid_argument("Could not parse additional_info"))?;
        let cpusvn = <[u8; CPUSVN_SIZE]>::try_from(&info.cpusvn[..])
            .map_err(|_| Error::invalid_argument("Incorrect cpusvn size"))?;
        expectation.reference_identity.machine_configuration.cpu_svn = Some(cpusvn);
        cipher_suite = Some(info.cipher_suite);
    }

    let aead_scheme = if is_legacy {
        cipher_suite.map_or(AeadScheme::UnknownAeadScheme, legacy::aead_scheme)
    } else {
        AeadScheme::try_from(root_info.aead_scheme).unwrap_or(AeadScheme::UnknownAeadScheme)
    };
    let aead_scheme = parse_aead_scheme(aead_scheme)?;

    let (matched, explanation) =
        match_identity_to_expectation(&self_identity.sgx_identity, &expectation, is_legacy)?;
    if !matched {
        return Err(Error::PermissionDenied(format!(
            "Identity of the current enclave does not match the ACL: {}",
            explanation
        )));
    }

    Ok(KeyGenerationParams { aead_scheme, expectation })
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;
    use crate::identity::{serialize_sgx_expectation, SgxIdentityMatchSpec};
    use crate::proto::{CipherSuite, IdentityAclGroup, IdentityAclPredicate};
    use crate::test_support;
    use crate::ErrorCode;

    fn root_info(aead_scheme: AeadScheme, additional_info: Option<Vec<u8>>) -> SealingRootInformation {
        SealingRootInformation {
            sealing_root_type: SealingRootType::Local as i32,
            sealing_root_name: SGX_LOCAL_SECRET_SEALER_ROOT_NAME.to_owned(),
            additional_info,
            aead_scheme: aead_scheme as i32,
        }
    }

    fn header(root_info: SealingRootInformation, acl: EnclaveIdentityExpectation) -> SealedSecretHeader {
        SealedSecretHeader {
            secret_name: "name".to_owned(),
            secret_version: "1".to_owned(),
            secret_purpose: None,
            root_info: Some(root_info),
            client_acl: Some(acl.into()),
        }
    }

    fn current_header() -> SealedSecretHeader {
        let expectation = test_support::expectation(SgxIdentityMatchSpec::default_local());
        header(root_info(AeadScheme::Aes256GcmSiv, None), serialize_sgx_expectation(&expectation))
    }

    fn legacy_header() -> SealedSecretHeader {
        let expectation = test_support::expectation(SgxIdentityMatchSpec::default_local());
        let info = SealedSecretAdditionalInfo {
            cpusvn: expectation.reference_identity.machine_configuration.cpu_svn.unwrap().to_vec(),
            cipher_suite: CipherSuite::Aes256GcmSiv as i32,
        };
        header(
            root_info(AeadScheme::UnknownAeadScheme, Some(info.encode_to_vec())),
            test_support::legacy_expectation(&expectation),
        )
    }

    fn self_identity() -> SelfIdentity {
        SelfIdentity { sgx_identity: test_support::identity() }
    }

    fn assert_invalid(header: &SealedSecretHeader, message: &str) {
        let err = parse_key_generation_params(header, &self_identity()).unwrap_err();
        assert_eq!(err, Error::InvalidArgument(message.to_owned()));
    }

    #[test]
    fn legacy_and_current_agree() {
        test_support::init_logger();
        let current = parse_key_generation_params(&current_header(), &self_identity()).unwrap();
        let legacy = parse_key_generation_params(&legacy_header(), &self_identity()).unwrap();
        assert!(!is_legacy_sealed_secret(&current_header()));
        assert!(is_legacy_sealed_secret(&legacy_header()));
        assert_eq!(current.aead_scheme, AeadScheme::Aes256GcmSiv);
        assert_eq!(legacy.aead_scheme, current.aead_scheme);
        assert_eq!(
            legacy.expectation.reference_identity.machine_configuration.cpu_svn,
            current.expectation.reference_identity.machine_configuration.cpu_svn
        );
        assert_eq!(legacy.expectation.reference_identity.code_identity, current.expectation.reference_identity.code_identity);
        assert!(!legacy.expectation.match_spec.machine_configuration_match_spec.is_cpu_svn_match_required);
    }

    #[test]
    fn root_info_checks() {
        let mut h = current_header();
        h.root_info.as_mut().unwrap().sealing_root_type = SealingRootType::Remote as i32;
        assert_invalid(&h, "Incorrect sealing_root_type");

        let mut h = current_header();
        h.root_info.as_mut().unwrap().sealing_root_name = "TPM".to_owned();
        assert_invalid(&h, "Incorrect sealing_root_name");

        let mut h = current_header();
        h.root_info.as_mut().unwrap().aead_scheme = AeadScheme::Aes128Gcm as i32;
        assert_invalid(&h, "Unsupported AeadScheme AES128_GCM");
    }

    #[test]
    fn client_acl_checks() {
        let mut h = current_header();
        h.client_acl = Some(IdentityAclPredicate {
            item: Some(identity_acl_predicate::Item::AclGroup(IdentityAclGroup::default())),
        });
        assert_invalid(&h, "Malformed client_acl");

        h.client_acl = None;
        assert_invalid(&h, "Malformed client_acl");
    }

    #[test]
    fn additional_info_checks() {
        let mut h = legacy_header();
        h.root_info.as_mut().unwrap().additional_info = Some(vec![0xff, 0xff, 0xff]);
        assert_invalid(&h, "Could not parse additional_info");

        let info = SealedSecretAdditionalInfo { cpusvn: vec![0; 15], cipher_suite: CipherSuite::Aes256GcmSiv as i32 };
        h.root_info.as_mut().unwrap().additional_info = Some(info.encode_to_vec());
        assert_invalid(&h, "Incorrect cpusvn size");

        let info = SealedSecretAdditionalInfo { cpusvn: vec![0; 16], cipher_suite: CipherSuite::UnknownCipherSuite as i32 };
        h.root_info.as_mut().unwrap().additional_info = Some(info.encode_to_vec());
        assert_invalid(&h, "Unsupported AeadScheme UNKNOWN_AEAD_SCHEME");
    }

    #[test]
    fn other_enclave_is_denied() {
        let mut other = self_identity();
        other.sgx_identity.code_identity.mrsigner = [0x99; 32];
        let err = parse_key_generation_params(&current_header(), &other).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        assert!(err.message().starts_with("Identity of the current enclave does not match the ACL: MRSIGNER"));
    }
}
