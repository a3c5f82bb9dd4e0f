/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::{SgxIdentity, SgxIdentityExpectation};
use crate::error::{Error, Result};

fn mismatch<T: AsRef<str>>(field: &str, actual: T, expected: T) -> String {
    format!(
        "{} value {} does not match expected {} value {}",
        field,
        actual.as_ref(),
        field,
        expected.as_ref()
    )
}

/// Checks `identity` against `expectation`.
///
/// Returns whether it matches and, if not, a description of every mismatch.
/// In legacy mode the machine configuration is never compared. Fails with
/// `InvalidArgument` if the match spec requires a machine configuration field
/// that the identity or the reference lacks.
pub fn match_identity_to_expectation(
    identity: &SgxIdentity,
    expectation: &SgxIdentityExpectation,
    is_legacy: bool,
) -> Result<(bool, String)> {
    let actual = &identity.code_identity;
    let reference = &expectation.reference_identity.code_identity;
    let spec = &expectation.match_spec.code_identity_match_spec;
    let mut explanations = Vec::new();

    if spec.is_mrenclave_match_required && actual.mrenclave != reference.mrenclave {
        explanations.push(mismatch(
            "MRENCLAVE",
            base16::encode_lower(&actual.mrenclave),
            base16::encode_lower(&reference.mrenclave),
        ));
    }
    if spec.is_mrsigner_match_required && actual.mrsigner != reference.mrsigner {
        explanations.push(mismatch(
            "MRSIGNER",
            base16::encode_lower(&actual.mrsigner),
            base16::encode_lower(&reference.mrsigner),
        ));
    }
    if actual.isvprodid != reference.isvprodid {
        explanations.push(mismatch("ISVPRODID", actual.isvprodid.to_string(), reference.isvprodid.to_string()));
    }
    if actual.isvsvn < reference.isvsvn {
        explanations.push(format!(
            "ISVSVN value {} is lower than expected ISVSVN value {}",
            actual.isvsvn, reference.isvsvn
        ));
    }
    let mask = spec.miscselect_match_mask;
    if actual.miscselect & mask != reference.miscselect & mask {
        explanations.push(format!(
            "MISCSELECT value {:#x} does not match expected MISCSELECT value {:#x} masked with {:#x}",
            actual.miscselect, reference.miscselect, mask
        ));
    }
    let mask = &spec.attributes_match_mask;
    if actual.attributes.masked(mask) != reference.attributes.masked(mask) {
        explanations.push(format!(
            "ATTRIBUTES value {:?} does not match expected ATTRIBUTES value {:?} masked with {:?}",
            actual.attributes, reference.attributes, mask
        ));
    }

    if !is_legacy {
        let actual = &identity.machine_configuration;
        let reference = &expectation.reference_identity.machine_configuration;
        let spec = &expectation.match_spec.machine_configuration_match_spec;
        if spec.is_cpu_svn_match_required {
            match (actual.cpu_svn, reference.cpu_svn) {
                (Some(a), Some(r)) if a != r => {
                    explanations.push(mismatch("CPUSVN", base16::encode_lower(&a), base16::encode_lower(&r)))
                }
                (Some(_), Some(_)) => {}
                _ => return Err(Error::invalid_argument("CPUSVN match is required but CPUSVN is not set")),
            }
        }
        if spec.is_sgx_type_match_required {
            match (actual.sgx_type, reference.sgx_type) {
                (Some(a), Some(r)) if a != r => {
                    explanations.push(mismatch("SGX Type", format!("{:?}", a), format!("{:?}", r)))
                }
                (Some(_), Some(_)) => {}
                _ => return Err(Error::invalid_argument("SGX Type match is required but SGX Type is not set")),
            }
        }
    }

    Ok((explanations.is_empty(), explanations.join(" and ")))
}
