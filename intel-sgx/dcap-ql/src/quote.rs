/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Intel ECDSA quote produced by the DCAP Quoting Enclave.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header         48 bytes   IntelQeQuoteHeader
//! report body   384 bytes   application enclave REPORT body
//! sig_len         u32       length of everything that follows
//! signature     576 bytes   IntelEcdsaP256QuoteSignature
//! authn_len       u16
//! qe_authn_data   authn_len bytes
//! cert_type       u16
//! cert_len        u32
//! cert_data       cert_len bytes
//! ```

use std::convert::TryFrom;
use std::mem;

use anyhow::{anyhow, bail};
use byteorder::{ByteOrder, WriteBytesExt, LE};
use num_traits::FromPrimitive;
use sgx_isa::ReportBody;

pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

// ====================================================
// ================= TYPE DEFINITIONS =================
// ====================================================

pub const QUOTE_VERSION_3: u16 = 3;

pub const QE_VENDOR_ID_INTEL: [u8; 16] = [
    0x93, 0x9a, 0x72, 0x33, 0xf7, 0x9c, 0x4c, 0xa9, 0x94, 0x0a, 0x0d, 0xb3, 0x95, 0x7f, 0x06, 0x07,
];

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Quote3AttestationKeyType {
    EcdsaP256 = 2,
    EcdsaP384 = 3,
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum CertificationDataType {
    PpidCleartext = 1,
    PpidEncryptedRsa2048 = 2,
    PpidEncryptedRsa3072 = 3,
    PckCertificate = 4,
    PckCertificateChain = 5,
    EcdsaSignatureAuxiliaryData = 6,
    PlatformManifest = 7,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntelQeQuoteHeader {
    pub version: u16,
    pub algorithm: Quote3AttestationKeyType,
    pub qesvn: u16,
    pub pcesvn: u16,
    pub qe_vendor_id: [u8; 16],
    pub userdata: [u8; 20],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntelEcdsaP256QuoteSignature {
    /// Signature over the header and application report body, `r || s`.
    pub body_signature: [u8; 64],
    /// Attestation public key, `x || y`.
    pub public_key: [u8; 64],
    pub qe_report: ReportBody,
    pub qe_report_signature: [u8; 64],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntelCertData {
    pub qe_cert_data_type: CertificationDataType,
    pub qe_cert_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntelQeQuote {
    pub header: IntelQeQuoteHeader,
    pub body: ReportBody,
    pub signature: IntelEcdsaP256QuoteSignature,
    pub qe_authn_data: Vec<u8>,
    pub cert_data: IntelCertData,
}

const ECDSA_P256_SIGNATURE_LEN: usize = 64;
const ECDSA_P256_PUBLIC_KEY_LEN: usize = 64;
const HEADER_LEN: usize = 48;
const SIGNATURE_LEN: usize = ECDSA_P256_SIGNATURE_LEN * 2 + ECDSA_P256_PUBLIC_KEY_LEN + ReportBody::UNPADDED_SIZE;

/// The `sig_len` field: signature, authentication data and certification
/// data, with their length and type prefixes.
fn signature_data_len(authn_len: u16, cert_len: u32) -> Result<u32> {
    let fixed = (SIGNATURE_LEN + 2 + 2 + 4) as u32 + authn_len as u32;
    fixed
        .checked_add(cert_len)
        .ok_or_else(|| anyhow!("Signature data too long: certification data is {} bytes", cert_len))
}

// ===========================================
// ================= PARSING =================
// ===========================================

trait TakePrefix: Sized {
    fn take_prefix(&mut self, mid: usize) -> Result<Self>;

    fn take_u16(&mut self) -> Result<u16>;

    fn take_u32(&mut self) -> Result<u32>;
}

impl<'a> TakePrefix for &'a [u8] {
    fn take_prefix(&mut self, mid: usize) -> Result<Self> {
        if let (Some(prefix), Some(rest)) = (self.get(..mid), self.get(mid..)) {
            *self = rest;
            Ok(prefix)
        } else {
            bail!("Unexpected end of quote")
        }
    }

    fn take_u16(&mut self) -> Result<u16> {
        self.take_prefix(mem::size_of::<u16>()).map(LE::read_u16)
    }

    fn take_u32(&mut self) -> Result<u32> {
        self.take_prefix(mem::size_of::<u32>()).map(LE::read_u32)
    }
}

fn take_array<const N: usize>(data: &mut &[u8]) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(data.take_prefix(N)?);
    Ok(out)
}

fn take_report_body(data: &mut &[u8]) -> Result<ReportBody> {
    let bytes = data.take_prefix(ReportBody::UNPADDED_SIZE)?;
    ReportBody::try_copy_from(bytes).ok_or_else(|| anyhow!("Invalid report body"))
}

impl IntelQeQuoteHeader {
    fn parse(data: &mut &[u8]) -> Result<Self> {
        let version = data.take_u16()?;
        if version != QUOTE_VERSION_3 {
            bail!("Unknown quote version: {}", version);
        }
        let att_key_type = data.take_u16()?;
        let algorithm = Quote3AttestationKeyType::from_u16(att_key_type)
            .ok_or_else(|| anyhow!("Unknown attestation key type: {}", att_key_type))?;
        let reserved = data.take_u32()?;
        if reserved != 0 {
            bail!("Data in reserved field: {:08x}", reserved);
        }
        Ok(IntelQeQuoteHeader {
            version,
            algorithm,
            qesvn: data.take_u16()?,
            pcesvn: data.take_u16()?,
            qe_vendor_id: take_array(data)?,
            userdata: take_array(data)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.algorithm as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&self.qesvn.to_le_bytes());
        out.extend_from_slice(&self.pcesvn.to_le_bytes());
        out.extend_from_slice(&self.qe_vendor_id);
        out.extend_from_slice(&self.userdata);
    }
}

impl IntelEcdsaP256QuoteSignature {
    fn parse(data: &mut &[u8]) -> Result<Self> {
        Ok(IntelEcdsaP256QuoteSignature {
            body_signature: take_array(data)?,
            public_key: take_array(data)?,
            qe_report: take_report_body(data)?,
            qe_report_signature: take_array(data)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.body_signature);
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.qe_report.to_bytes());
        out.extend_from_slice(&self.qe_report_signature);
    }
}

impl IntelQeQuote {
    pub fn parse(quote: &[u8]) -> Result<IntelQeQuote> {
        let mut data = quote;

        let header = IntelQeQuoteHeader::parse(&mut data)?;
        if header.algorithm != Quote3AttestationKeyType::EcdsaP256 {
            bail!("Invalid attestation key type: {:?}", header.algorithm);
        }
        let body = take_report_body(&mut data)?;

        let sig_len = data.take_u32()?;
        if sig_len as usize != data.len() {
            bail!(
                "Invalid signature length. Got {}, expected {}",
                data.len(),
                sig_len
            );
        }
        let signature = IntelEcdsaP256QuoteSignature::parse(&mut data)?;

        let authdata_len = data.take_u16()?;
        let qe_authn_data = data.take_prefix(authdata_len as _)?.to_vec();

        let cd_type = data.take_u16()?;
        let qe_cert_data_type = CertificationDataType::from_u16(cd_type)
            .ok_or_else(|| anyhow!("Unknown certification data type: {}", cd_type))?;
        let certdata_len = data.take_u32()?;
        if certdata_len as usize != data.len() {
            bail!(
                "Invalid certification data length. Got {}, expected {}",
                data.len(),
                certdata_len
            );
        }

        Ok(IntelQeQuote {
            header,
            body,
            signature,
            qe_authn_data,
            cert_data: IntelCertData {
                qe_cert_data_type,
                qe_cert_data: data.to_vec(),
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let authn_len = u16::try_from(self.qe_authn_data.len())
            .map_err(|_| anyhow!("QE authentication data too long: {}", self.qe_authn_data.len()))?;
        let cert_len = u32::try_from(self.cert_data.qe_cert_data.len())
            .map_err(|_| anyhow!("Certification data too long: {}", self.cert_data.qe_cert_data.len()))?;
        let sig_len = signature_data_len(authn_len, cert_len)?;

        let mut out = Vec::with_capacity(HEADER_LEN + ReportBody::UNPADDED_SIZE + 4 + sig_len as usize);
        self.header.write(&mut out);
        out.extend_from_slice(&self.body.to_bytes());
        out.write_u32::<LE>(sig_len)?;
        self.signature.write(&mut out);
        out.write_u16::<LE>(authn_len)?;
        out.extend_from_slice(&self.qe_authn_data);
        out.write_u16::<LE>(self.cert_data.qe_cert_data_type as u16)?;
        out.write_u32::<LE>(cert_len)?;
        out.extend_from_slice(&self.cert_data.qe_cert_data);
        Ok(out)
    }

    // ===== ACCESSORS =====

    /// The bytes covered by `signature.body_signature`.
    pub fn signed_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + ReportBody::UNPADDED_SIZE);
        self.header.write(&mut out);
        out.extend_from_slice(&self.body.to_bytes());
        out
    }
}
