/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Protobuf-compatible messages exchanged with the privileged enclaves and
//! persisted as sealed secrets.
//!
//! Field numbers are part of the wire format and must not change.

use prost::Message;

use crate::error::{Error, Result};

/// Decodes `bytes` as `M`, reporting failures as `InvalidArgument` with the
/// given context.
pub fn decode<M: Message + Default>(bytes: &[u8], what: &str) -> Result<M> {
    M::decode(bytes).map_err(|e| Error::invalid_argument(format!("Could not parse {}: {}", what, e)))
}

// ---------------------------------------------------------------------------
// Keys and signatures
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SignatureScheme {
    UnknownSignatureScheme = 0,
    EcdsaP256Sha256 = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AsymmetricKeyEncoding {
    UnknownAsymmetricKeyEncoding = 0,
    AsymmetricKeyDer = 1,
    AsymmetricKeyPem = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SigningKeyType {
    UnknownSigningKeyType = 0,
    VerifyingKey = 1,
    SigningKey = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AsymmetricEncryptionScheme {
    UnknownAsymmetricEncryptionScheme = 0,
    Rsa2048Oaep = 1,
    Rsa3072Oaep = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EncryptionKeyType {
    UnknownEncryptionKeyType = 0,
    EncryptionKey = 1,
    DecryptionKey = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct AsymmetricSigningKeyProto {
    #[prost(enumeration = "SigningKeyType", tag = "1")]
    pub key_type: i32,
    #[prost(enumeration = "SignatureScheme", tag = "2")]
    pub signature_scheme: i32,
    #[prost(enumeration = "AsymmetricKeyEncoding", tag = "3")]
    pub encoding: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub key: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AsymmetricEncryptionKeyProto {
    #[prost(enumeration = "EncryptionKeyType", tag = "1")]
    pub key_type: i32,
    #[prost(enumeration = "AsymmetricEncryptionScheme", tag = "2")]
    pub encryption_scheme: i32,
    #[prost(enumeration = "AsymmetricKeyEncoding", tag = "3")]
    pub encoding: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub key: Vec<u8>,
}

/// Big-endian `r` and `s` of an ECDSA signature.
#[derive(Clone, PartialEq, Message)]
pub struct EcdsaSignature {
    #[prost(bytes = "vec", tag = "1")]
    pub r: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub s: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Signature {
    #[prost(enumeration = "SignatureScheme", tag = "1")]
    pub signature_scheme: i32,
    /// DER-encoded signature.
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub ecdsa_signature: Option<EcdsaSignature>,
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CertificateFormat {
    UnknownFormat = 0,
    X509Pem = 1,
    X509Der = 2,
    SgxAttestationKeyCertificate = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct Certificate {
    #[prost(enumeration = "CertificateFormat", tag = "1")]
    pub format: i32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CertificateChain {
    #[prost(message, repeated, tag = "1")]
    pub certificates: Vec<Certificate>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttestationPublicKey {
    #[prost(string, optional, tag = "1")]
    pub version: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub purpose: Option<String>,
    #[prost(message, optional, tag = "3")]
    pub attestation_public_key: Option<AsymmetricSigningKeyProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PceSignReportPayload {
    #[prost(string, optional, tag = "1")]
    pub version: Option<String>,
    #[prost(message, optional, tag = "2")]
    pub attestation_public_key: Option<AttestationPublicKey>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttestationKeyCertificate {
    /// Serialized [`PceSignReportPayload`], hashed into the report data.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub pce_sign_report_payload: Option<Vec<u8>>,
    #[prost(message, optional, tag = "2")]
    pub report: Option<ReportProto>,
    #[prost(message, optional, tag = "3")]
    pub signature: Option<Signature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TargetedCertificateSigningRequest {
    #[prost(message, optional, tag = "1")]
    pub target_certificate: Option<Certificate>,
    #[prost(bytes = "vec", tag = "2")]
    pub pkcs10_csr: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Hardware structures
// ---------------------------------------------------------------------------

/// A serialized `sgx_isa::Report`.
#[derive(Clone, PartialEq, Message)]
pub struct ReportProto {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

/// A serialized `sgx_isa::Targetinfo`.
#[derive(Clone, PartialEq, Message)]
pub struct TargetInfoProto {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CpuSvn {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PceSvn {
    #[prost(uint32, optional, tag = "1")]
    pub value: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PceId {
    #[prost(uint32, optional, tag = "1")]
    pub value: Option<u32>,
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnclaveIdentityType {
    UnknownIdentity = 0,
    NullIdentity = 1,
    CodeIdentity = 2,
    CertIdentity = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnclaveIdentityDescription {
    #[prost(enumeration = "EnclaveIdentityType", tag = "1")]
    pub identity_type: i32,
    #[prost(string, tag = "2")]
    pub authority_type: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnclaveIdentity {
    #[prost(message, optional, tag = "1")]
    pub description: Option<EnclaveIdentityDescription>,
    #[prost(bytes = "vec", tag = "2")]
    pub identity: Vec<u8>,
    /// Absent on identities written by the legacy code-identity format.
    #[prost(string, optional, tag = "3")]
    pub version: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnclaveIdentityExpectation {
    #[prost(message, optional, tag = "1")]
    pub reference_identity: Option<EnclaveIdentity>,
    #[prost(bytes = "vec", tag = "2")]
    pub match_spec: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum GroupType {
    And = 1,
    Or = 2,
    Not = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct IdentityAclGroup {
    #[prost(message, repeated, tag = "1")]
    pub predicates: Vec<IdentityAclPredicate>,
    #[prost(enumeration = "GroupType", tag = "2")]
    pub group_type: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct IdentityAclPredicate {
    #[prost(oneof = "identity_acl_predicate::Item", tags = "1, 2")]
    pub item: Option<identity_acl_predicate::Item>,
}

pub mod identity_acl_predicate {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Item {
        #[prost(message, tag = "1")]
        Expectation(super::EnclaveIdentityExpectation),
        #[prost(message, tag = "2")]
        AclGroup(super::IdentityAclGroup),
    }
}

impl From<EnclaveIdentityExpectation> for IdentityAclPredicate {
    fn from(expectation: EnclaveIdentityExpectation) -> Self {
        IdentityAclPredicate { item: Some(identity_acl_predicate::Item::Expectation(expectation)) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SgxTypeProto {
    UnknownSgxType = 0,
    Standard = 1,
    Scalable = 2,
    ScalableWithIntegrity = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttributesProto {
    #[prost(uint64, optional, tag = "1")]
    pub flags: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub xfrm: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignerAssignedIdentityProto {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub mrsigner: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "2")]
    pub isvprodid: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub isvsvn: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CodeIdentityProto {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub mrenclave: Option<Vec<u8>>,
    #[prost(message, optional, tag = "2")]
    pub signer_assigned_identity: Option<SignerAssignedIdentityProto>,
    #[prost(uint32, optional, tag = "3")]
    pub miscselect: Option<u32>,
    #[prost(message, optional, tag = "4")]
    pub attributes: Option<AttributesProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MachineConfigurationProto {
    #[prost(message, optional, tag = "1")]
    pub cpu_svn: Option<CpuSvn>,
    #[prost(enumeration = "SgxTypeProto", optional, tag = "2")]
    pub sgx_type: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SgxIdentityProto {
    #[prost(message, optional, tag = "1")]
    pub code_identity: Option<CodeIdentityProto>,
    #[prost(message, optional, tag = "2")]
    pub machine_configuration: Option<MachineConfigurationProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CodeIdentityMatchSpecProto {
    #[prost(bool, optional, tag = "1")]
    pub is_mrenclave_match_required: Option<bool>,
    #[prost(bool, optional, tag = "2")]
    pub is_mrsigner_match_required: Option<bool>,
    #[prost(uint32, optional, tag = "3")]
    pub miscselect_match_mask: Option<u32>,
    #[prost(message, optional, tag = "4")]
    pub attributes_match_mask: Option<AttributesProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MachineConfigurationMatchSpecProto {
    #[prost(bool, optional, tag = "1")]
    pub is_cpu_svn_match_required: Option<bool>,
    #[prost(bool, optional, tag = "2")]
    pub is_sgx_type_match_required: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SgxIdentityMatchSpecProto {
    #[prost(message, optional, tag = "1")]
    pub code_identity_match_spec: Option<CodeIdentityMatchSpecProto>,
    #[prost(message, optional, tag = "2")]
    pub machine_configuration_match_spec: Option<MachineConfigurationMatchSpecProto>,
}

// ---------------------------------------------------------------------------
// Sealed secrets
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SealingRootType {
    UnknownSealingRootType = 0,
    Local = 1,
    Remote = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AeadScheme {
    UnknownAeadScheme = 0,
    Aes128Gcm = 1,
    Aes256Gcm = 2,
    Aes128GcmSiv = 3,
    Aes256GcmSiv = 4,
}

impl AeadScheme {
    /// The canonical name, which is mixed into derived key ids.
    pub fn name(self) -> &'static str {
        match self {
            AeadScheme::UnknownAeadScheme => "UNKNOWN_AEAD_SCHEME",
            AeadScheme::Aes128Gcm => "AES128_GCM",
            AeadScheme::Aes256Gcm => "AES256_GCM",
            AeadScheme::Aes128GcmSiv => "AES128_GCM_SIV",
            AeadScheme::Aes256GcmSiv => "AES256_GCM_SIV",
        }
    }
}

/// Cipher suites of the legacy sealed-secret format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CipherSuite {
    UnknownCipherSuite = 0,
    Aes256GcmSiv = 1,
}

#[derive(Clone, PartialEq, Message)]
pub struct SealingRootInformation {
    #[prost(enumeration = "SealingRootType", tag = "1")]
    pub sealing_root_type: i32,
    #[prost(string, tag = "2")]
    pub sealing_root_name: String,
    /// Only written by the legacy format, as a [`SealedSecretAdditionalInfo`].
    #[prost(bytes = "vec", optional, tag = "3")]
    pub additional_info: Option<Vec<u8>>,
    #[prost(enumeration = "AeadScheme", tag = "4")]
    pub aead_scheme: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SealedSecretAdditionalInfo {
    #[prost(bytes = "vec", tag = "1")]
    pub cpusvn: Vec<u8>,
    #[prost(enumeration = "CipherSuite", tag = "2")]
    pub cipher_suite: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct SealedSecretHeader {
    #[prost(string, tag = "1")]
    pub secret_name: String,
    #[prost(string, tag = "2")]
    pub secret_version: String,
    #[prost(string, optional, tag = "3")]
    pub secret_purpose: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub root_info: Option<SealingRootInformation>,
    #[prost(message, optional, tag = "5")]
    pub client_acl: Option<IdentityAclPredicate>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SealedSecret {
    /// Serialized [`SealedSecretHeader`].
    #[prost(bytes = "vec", tag = "1")]
    pub sealed_secret_header: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub additional_authenticated_data: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub secret_ciphertext: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub iv: Vec<u8>,
}

// ---------------------------------------------------------------------------
// PCK certificates
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct Tcb {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub components: Option<Vec<u8>>,
    #[prost(message, optional, tag = "2")]
    pub pce_svn: Option<PceSvn>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawTcb {
    #[prost(message, optional, tag = "1")]
    pub cpu_svn: Option<CpuSvn>,
    #[prost(message, optional, tag = "2")]
    pub pce_svn: Option<PceSvn>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PckCertificateInfo {
    #[prost(message, optional, tag = "1")]
    pub tcb_level: Option<Tcb>,
    #[prost(message, optional, tag = "2")]
    pub tcbm: Option<RawTcb>,
    #[prost(message, optional, tag = "3")]
    pub cert: Option<Certificate>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PckCertificates {
    #[prost(message, repeated, tag = "1")]
    pub certs: Vec<PckCertificateInfo>,
}
