/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::cmp;

use sgx_isa::hardware::Hardware;
use sgx_isa::{Keyname, Keypolicy, Keyrequest};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{serialize_byte_containers, sha256};
use crate::error::Result;
use crate::hardware::hardware_error;
use crate::identity::{SgxIdentityExpectation, SgxIdentityMatchSpec};
use crate::proto::AeadScheme;

const LOCAL_KEY_DOMAIN: &str = "LOCAL";
const SGX_KEY_AUTHORITY: &str = "SGX";

pub fn convert_match_spec_to_keypolicy(spec: &SgxIdentityMatchSpec) -> Keypolicy {
    let mut policy = Keypolicy::empty();
    if spec.code_identity_match_spec.is_mrenclave_match_required {
        policy |= Keypolicy::MRENCLAVE;
    }
    if spec.code_identity_match_spec.is_mrsigner_match_required {
        policy |= Keypolicy::MRSIGNER;
    }
    policy
}

fn template_request(expectation: &SgxIdentityExpectation) -> Keyrequest {
    let reference = &expectation.reference_identity;
    let spec = &expectation.match_spec.code_identity_match_spec;
    Keyrequest {
        keyname: Keyname::Seal as u16,
        keypolicy: convert_match_spec_to_keypolicy(&expectation.match_spec),
        isvsvn: reference.code_identity.isvsvn,
        cpusvn: reference.machine_configuration.cpu_svn.unwrap_or_default(),
        attributemask: spec.attributes_match_mask,
        miscmask: spec.miscselect_match_mask,
        ..Keyrequest::default()
    }
}

/// Derives `key_size` bytes of sealing key for `key_id` from the hardware
/// seal key of the enclave identity selected by `expectation`.
///
/// Each 16-byte subkey is requested with a key id that binds the scheme, the
/// key id, the total size and the subkey index.
pub fn generate_cryptor_key<H: Hardware + ?Sized>(
    hardware: &H,
    aead_scheme: AeadScheme,
    key_id: &str,
    expectation: &SgxIdentityExpectation,
    key_size: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    debug!(
        "Deriving {} byte {} key with policy {:?}",
        key_size,
        aead_scheme.name(),
        convert_match_spec_to_keypolicy(&expectation.match_spec)
    );

    let mut request = template_request(expectation);
    let key_size_str = key_size.to_string();
    let mut key = Zeroizing::new(Vec::with_capacity(key_size));
    let mut index = 0usize;
    while key.len() < key_size {
        let index_str = index.to_string();
        let keyid_material = serialize_byte_containers(&[
            LOCAL_KEY_DOMAIN.as_bytes(),
            SGX_KEY_AUTHORITY.as_bytes(),
            aead_scheme.name().as_bytes(),
            key_id.as_bytes(),
            key_size_str.as_bytes(),
            index_str.as_bytes(),
        ])?;
        request.keyid = sha256(&keyid_material);

        let mut subkey = hardware.get_hardware_key(&request).map_err(hardware_error)?;
        let take = cmp::min(subkey.len(), key_size - key.len());
        key.extend_from_slice(&subkey[..take]);
        subkey.zeroize();
        index += 1;
    }
    Ok(key)
}
