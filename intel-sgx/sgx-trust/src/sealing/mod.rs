/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Sealing secrets to the identity of an enclave on the local platform.
//!
//! A sealed secret consists of a serialized [`SealedSecretHeader`], caller
//! supplied additional authenticated data, and the ciphertext. The header
//! names the enclaves allowed to unseal the secret; its client ACL also
//! selects the hardware key policy the sealing key is derived with. Both the
//! header and the additional data are authenticated.

pub mod engine;
pub mod header;
pub mod key;

use prost::Message;
use sgx_isa::hardware::Hardware;
use zeroize::Zeroizing;

pub use self::header::{
    is_legacy_sealed_secret, parse_key_generation_params, KeyGenerationParams, SGX_LOCAL_SECRET_SEALER_ROOT_NAME,
};
pub use self::key::{convert_match_spec_to_keypolicy, generate_cryptor_key};

use crate::crypto::aead::{self, AeadCryptor};
use crate::crypto::serialize_byte_containers;
use crate::error::{Error, Result};
use crate::identity::{serialize_sgx_expectation, SelfIdentity, SgxIdentityExpectation, SgxIdentityMatchSpec};
use crate::proto::{self, AeadScheme, SealedSecret, SealedSecretHeader, SealingRootInformation, SealingRootType};

/// Scheme of every secret this sealer seals.
pub const DEFAULT_AEAD_SCHEME: AeadScheme = AeadScheme::Aes256GcmSiv;

/// Key id of the sealing key proper, as opposed to other keys derived for
/// the same identity.
const SEALING_KEY_ID: &str = "";

pub struct SgxLocalSecretSealer<H: Hardware> {
    hardware: H,
    self_identity: SelfIdentity,
    default_match_spec: SgxIdentityMatchSpec,
}

impl<H: Hardware> SgxLocalSecretSealer<H> {
    /// A sealer whose secrets are bound to the MRENCLAVE of `self_identity`.
    pub fn create_mrenclave_secret_sealer(hardware: H, self_identity: SelfIdentity) -> Self {
        Self::with_match_spec(hardware, self_identity, SgxIdentityMatchSpec::mrenclave_local())
    }

    /// A sealer whose secrets are bound to the MRSIGNER of `self_identity`.
    pub fn create_mrsigner_secret_sealer(hardware: H, self_identity: SelfIdentity) -> Self {
        Self::with_match_spec(hardware, self_identity, SgxIdentityMatchSpec::default_local())
    }

    pub fn with_match_spec(hardware: H, self_identity: SelfIdentity, default_match_spec: SgxIdentityMatchSpec) -> Self {
        SgxLocalSecretSealer { hardware, self_identity, default_match_spec }
    }

    pub fn self_identity(&self) -> &SelfIdentity {
        &self.self_identity
    }

    fn default_root_info() -> SealingRootInformation {
        SealingRootInformation {
            sealing_root_type: SealingRootType::Local as i32,
            sealing_root_name: SGX_LOCAL_SECRET_SEALER_ROOT_NAME.to_owned(),
            additional_info: None,
            aead_scheme: DEFAULT_AEAD_SCHEME as i32,
        }
    }

    /// Sets the root info and client ACL of `header` to what this sealer
    /// uses by default: only enclaves matching the self identity under the
    /// sealer's match spec may unseal.
    pub fn set_default_header(&self, header: &mut SealedSecretHeader) {
        header.root_info = Some(Self::default_root_info());
        let expectation = SgxIdentityExpectation {
            reference_identity: self.self_identity.sgx_identity.clone(),
            match_spec: self.default_match_spec.clone(),
        };
        header.client_acl = Some(serialize_sgx_expectation(&expectation).into());
    }

    fn cryptor(&self, params: &KeyGenerationParams) -> Result<Box<dyn AeadCryptor>> {
        let key_size = aead::key_size(params.aead_scheme)?;
        let key = generate_cryptor_key(
            &self.hardware,
            params.aead_scheme,
            SEALING_KEY_ID,
            &params.expectation,
            key_size,
        )?;
        aead::make_cryptor(params.aead_scheme, &key)
    }

    /// Seals `secret` so that any enclave admitted by the client ACL of
    /// `header` can unseal it. The calling enclave must be admitted too.
    pub fn seal(&self, header: &SealedSecretHeader, additional_data: &[u8], secret: &[u8]) -> Result<SealedSecret> {
        let mut header = header.clone();
        match header.root_info {
            Some(ref root_info) => header::check_root_info(root_info)?,
            None => header.root_info = Some(Self::default_root_info()),
        }
        if header.client_acl.is_none() {
            return Err(Error::invalid_argument("Malformed client_acl"));
        }

        let params = parse_key_generation_params(&header, &self.self_identity)?;
        debug!("Sealing {} byte secret {:?} with {}", secret.len(), header.secret_name, params.aead_scheme.name());
        let cryptor = self.cryptor(&params)?;

        let mut sealed = SealedSecret {
            sealed_secret_header: header.encode_to_vec(),
            additional_authenticated_data: additional_data.to_vec(),
            ..SealedSecret::default()
        };
        let aad = serialize_byte_containers(&[&sealed.sealed_secret_header, &sealed.additional_authenticated_data])?;
        engine::seal(&*cryptor, secret, &aad, &mut sealed)?;
        Ok(sealed)
    }

    pub fn unseal(&self, sealed: &SealedSecret) -> Result<Zeroizing<Vec<u8>>> {
        let header: SealedSecretHeader = proto::decode(&sealed.sealed_secret_header, "sealed secret header")
            .map_err(|_| Error::invalid_argument("Could not parse the sealed secret header"))?;
        let params = parse_key_generation_params(&header, &self.self_identity)?;
        debug!("Unsealing secret {:?} with {}", header.secret_name, params.aead_scheme.name());
        let cryptor = self.cryptor(&params)?;

        let aad = serialize_byte_containers(&[&sealed.sealed_secret_header, &sealed.additional_authenticated_data])?;
        engine::open(&*cryptor, sealed, &aad)
    }

    fn default_cryptor() -> Result<Box<dyn AeadCryptor>> {
        let key = Zeroizing::new(vec![0; aead::key_size(DEFAULT_AEAD_SCHEME)?]);
        aead::make_cryptor(DEFAULT_AEAD_SCHEME, &key)
    }

    /// Largest secret that can be sealed.
    pub fn max_message_size(&self) -> Result<usize> {
        Ok(Self::default_cryptor()?.max_message_size())
    }

    /// Upper bound on the ciphertext growth, excluding header and nonce.
    pub fn max_sealed_secret_overhead(&self) -> Result<usize> {
        Ok(Self::default_cryptor()?.max_seal_overhead())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, FakeHardware};
    use crate::ErrorCode;

    fn self_identity() -> SelfIdentity {
        SelfIdentity { sgx_identity: test_support::identity() }
    }

    fn header(sealer: &SgxLocalSecretSealer<&FakeHardware>) -> SealedSecretHeader {
        let mut header = SealedSecretHeader { secret_name: "attestation key".to_owned(), ..Default::default() };
        sealer.set_default_header(&mut header);
        header
    }

    #[test]
    fn seal_unseal() {
        test_support::init_logger();
        let hw = FakeHardware::new(test_support::identity());
        let sealer = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&hw, self_identity());
        let sealed = sealer.seal(&header(&sealer), b"context", b"secret bytes").unwrap();
        assert_eq!(sealed.additional_authenticated_data, b"context");
        assert_eq!(sealed.iv.len(), 12);
        assert_eq!(&sealer.unseal(&sealed).unwrap()[..], b"secret bytes");

        // A fresh sealer on the same platform derives the same key.
        let other = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&hw, self_identity());
        assert_eq!(&other.unseal(&sealed).unwrap()[..], b"secret bytes");

        // Same enclave on another platform does not.
        let elsewhere = FakeHardware::with_root(test_support::identity(), [0xa5; 32]);
        let sealer = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&elsewhere, self_identity());
        assert_eq!(sealer.unseal(&sealed).unwrap_err().code(), ErrorCode::Internal);
    }

    #[test]
    fn tampering_is_detected() {
        let hw = FakeHardware::new(test_support::identity());
        let sealer = SgxLocalSecretSealer::create_mrenclave_secret_sealer(&hw, self_identity());
        let sealed = sealer.seal(&header(&sealer), b"context", b"secret bytes").unwrap();

        let mut s = sealed.clone();
        s.additional_authenticated_data.push(0);
        assert_eq!(sealer.unseal(&s).unwrap_err().code(), ErrorCode::Internal);

        let mut s = sealed.clone();
        s.secret_ciphertext[3] ^= 0x10;
        assert_eq!(sealer.unseal(&s).unwrap_err().code(), ErrorCode::Internal);

        let mut s = sealed.clone();
        s.iv[0] ^= 1;
        assert_eq!(sealer.unseal(&s).unwrap_err().code(), ErrorCode::Internal);

        let mut h: SealedSecretHeader = proto::decode(&sealed.sealed_secret_header, "header").unwrap();
        h.secret_name = "another key".to_owned();
        let mut s = sealed.clone();
        s.sealed_secret_header = h.encode_to_vec();
        assert_eq!(sealer.unseal(&s).unwrap_err().code(), ErrorCode::Internal);

        let mut s = sealed;
        s.sealed_secret_header = vec![0xff];
        let err = sealer.unseal(&s).unwrap_err();
        assert_eq!(err, Error::InvalidArgument("Could not parse the sealed secret header".to_owned()));
    }

    #[test]
    fn other_enclave_cannot_unseal() {
        let hw = FakeHardware::new(test_support::identity());
        let sealer = SgxLocalSecretSealer::create_mrenclave_secret_sealer(&hw, self_identity());
        let sealed = sealer.seal(&header(&sealer), b"", b"secret bytes").unwrap();
        let calls = hw.key_calls();

        let mut other = self_identity();
        other.sgx_identity.code_identity.mrenclave = [0x12; 32];
        let sealer = SgxLocalSecretSealer::create_mrenclave_secret_sealer(&hw, other);
        let err = sealer.unseal(&sealed).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        assert_eq!(hw.key_calls(), calls);
    }

    #[test]
    fn seal_checks_header() {
        let hw = FakeHardware::new(test_support::identity());
        let sealer = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&hw, self_identity());

        let mut h = header(&sealer);
        h.client_acl = None;
        assert_eq!(sealer.seal(&h, b"", b"x").unwrap_err(), Error::InvalidArgument("Malformed client_acl".to_owned()));

        let mut h = header(&sealer);
        h.root_info.as_mut().unwrap().sealing_root_name = "TPM".to_owned();
        assert_eq!(sealer.seal(&h, b"", b"x").unwrap_err().code(), ErrorCode::InvalidArgument);

        // Missing root info is filled in.
        let mut h = header(&sealer);
        h.root_info = None;
        let sealed = sealer.seal(&h, b"", b"x").unwrap();
        assert_eq!(&sealer.unseal(&sealed).unwrap()[..], b"x");

        // Sealing for an ACL the caller does not satisfy is refused.
        let mut stranger = self_identity();
        stranger.sgx_identity.code_identity.mrsigner = [0x23; 32];
        let other = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&hw, stranger);
        let mut h = SealedSecretHeader::default();
        other.set_default_header(&mut h);
        assert_eq!(sealer.seal(&h, b"", b"x").unwrap_err().code(), ErrorCode::PermissionDenied);
    }

    #[test]
    fn legacy_secret_unseals() {
        use crate::proto::{CipherSuite, SealedSecretAdditionalInfo};

        test_support::init_logger();
        let hw = FakeHardware::new(test_support::identity());
        let sealer = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&hw, self_identity());

        let expectation = test_support::expectation(SgxIdentityMatchSpec::default_local());
        let info = SealedSecretAdditionalInfo {
            cpusvn: vec![0x33; 16],
            cipher_suite: CipherSuite::Aes256GcmSiv as i32,
        };
        let h = SealedSecretHeader {
            root_info: Some(SealingRootInformation {
                sealing_root_type: SealingRootType::Local as i32,
                sealing_root_name: SGX_LOCAL_SECRET_SEALER_ROOT_NAME.to_owned(),
                additional_info: Some(info.encode_to_vec()),
                aead_scheme: AeadScheme::UnknownAeadScheme as i32,
            }),
            client_acl: Some(test_support::legacy_expectation(&expectation).into()),
            ..Default::default()
        };
        let sealed = sealer.seal(&h, b"aad", b"old secret").unwrap();
        assert!(is_legacy_sealed_secret(&proto::decode(&sealed.sealed_secret_header, "header").unwrap()));
        assert_eq!(&sealer.unseal(&sealed).unwrap()[..], b"old secret");
    }

    #[test]
    fn limits() {
        let hw = FakeHardware::new(test_support::identity());
        let sealer = SgxLocalSecretSealer::create_mrsigner_secret_sealer(&hw, self_identity());
        assert_eq!(sealer.max_message_size().unwrap(), 1 << 25);
        assert_eq!(sealer.max_sealed_secret_overhead().unwrap(), 16);
    }
}
