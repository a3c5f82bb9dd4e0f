/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::convert::TryFrom;

use prost::Message;

use super::{
    CodeIdentity, CodeIdentityMatchSpec, MachineConfiguration, MachineConfigurationMatchSpec, SgxIdentity,
    SgxIdentityExpectation, SgxIdentityMatchSpec, SGX_AUTHORITY_TYPE, SGX_IDENTITY_VERSION,
};
use crate::error::{Error, Result};
use crate::proto::{
    self, CodeIdentityMatchSpecProto, CodeIdentityProto, EnclaveIdentity, EnclaveIdentityDescription,
    EnclaveIdentityExpectation, EnclaveIdentityType, SgxIdentityMatchSpecProto, SgxIdentityProto,
};

fn check_description(identity: &EnclaveIdentity) -> Result<()> {
    let description = identity
        .description
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("Enclave identity is missing a description"))?;
    if EnclaveIdentityType::try_from(description.identity_type).ok() != Some(EnclaveIdentityType::CodeIdentity)
        || description.authority_type != SGX_AUTHORITY_TYPE
    {
        return Err(Error::invalid_argument(format!(
            "Enclave identity description ({}, {:?}) is not an SGX code identity",
            description.identity_type, description.authority_type
        )));
    }
    Ok(())
}

/// Parses a generic expectation into an SGX one.
///
/// In legacy mode the reference identity and match spec are the
/// code-identity encodings, and the machine configuration is left empty
/// and unmatched.
pub fn parse_sgx_expectation(generic: &EnclaveIdentityExpectation, is_legacy: bool) -> Result<SgxIdentityExpectation> {
    let reference = generic
        .reference_identity
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("Expectation is missing a reference identity"))?;
    check_description(reference)?;

    let expectation = if is_legacy {
        if reference.version.is_some() {
            return Err(Error::invalid_argument("Legacy identity must not carry a version"));
        }
        let code_identity: CodeIdentityProto = proto::decode(&reference.identity, "legacy code identity")?;
        let match_spec: CodeIdentityMatchSpecProto = proto::decode(&generic.match_spec, "legacy match spec")?;
        SgxIdentityExpectation {
            reference_identity: SgxIdentity {
                code_identity: CodeIdentity::from_proto(&code_identity)?,
                machine_configuration: MachineConfiguration::default(),
            },
            match_spec: SgxIdentityMatchSpec {
                code_identity_match_spec: CodeIdentityMatchSpec::from_proto(&match_spec)?,
                machine_configuration_match_spec: MachineConfigurationMatchSpec::default(),
            },
        }
    } else {
        if reference.version.as_deref() != Some(SGX_IDENTITY_VERSION) {
            return Err(Error::invalid_argument(format!(
                "Unsupported identity version {:?}",
                reference.version
            )));
        }
        let identity: SgxIdentityProto = proto::decode(&reference.identity, "SGX identity")?;
        let match_spec: SgxIdentityMatchSpecProto = proto::decode(&generic.match_spec, "SGX match spec")?;
        SgxIdentityExpectation {
            reference_identity: SgxIdentity::from_proto(&identity)?,
            match_spec: SgxIdentityMatchSpec::from_proto(&match_spec)?,
        }
    };
    Ok(expectation)
}

/// Encodes `expectation` in the current, versioned format.
pub fn serialize_sgx_expectation(expectation: &SgxIdentityExpectation) -> EnclaveIdentityExpectation {
    EnclaveIdentityExpectation {
        reference_identity: Some(EnclaveIdentity {
            description: Some(EnclaveIdentityDescription {
                identity_type: EnclaveIdentityType::CodeIdentity as i32,
                authority_type: SGX_AUTHORITY_TYPE.to_owned(),
            }),
            identity: expectation.reference_identity.to_proto().encode_to_vec(),
            version: Some(SGX_IDENTITY_VERSION.to_owned()),
        }),
        match_spec: expectation.match_spec.to_proto().encode_to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use crate::ErrorCode;

    #[test]
    fn current_format() {
        let expectation = test_support::expectation(SgxIdentityMatchSpec::default_local());
        let generic = serialize_sgx_expectation(&expectation);
        assert_eq!(parse_sgx_expectation(&generic, false).unwrap(), expectation);

        // A current-format expectation is not a legacy one.
        let err = parse_sgx_expectation(&generic, true).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn legacy_format() {
        let expectation = test_support::expectation(SgxIdentityMatchSpec::default_local());
        let generic = test_support::legacy_expectation(&expectation);
        let parsed = parse_sgx_expectation(&generic, true).unwrap();
        assert_eq!(parsed.reference_identity.code_identity, expectation.reference_identity.code_identity);
        assert_eq!(parsed.reference_identity.machine_configuration, MachineConfiguration::default());
        assert_eq!(parsed.match_spec.code_identity_match_spec, expectation.match_spec.code_identity_match_spec);
        assert!(!parsed.match_spec.machine_configuration_match_spec.is_cpu_svn_match_required);
    }

    #[test]
    fn wrong_authority() {
        let expectation = test_support::expectation(SgxIdentityMatchSpec::default_local());
        let mut generic = serialize_sgx_expectation(&expectation);
        generic.reference_identity.as_mut().unwrap().description.as_mut().unwrap().authority_type = "TPM".into();
        assert!(parse_sgx_expectation(&generic, false).is_err());
    }
}
