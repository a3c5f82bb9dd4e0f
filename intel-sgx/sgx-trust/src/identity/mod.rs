/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! SGX enclave identities, match specs and expectations.
//!
//! The typed values here are what the rest of the crate works with. The
//! `proto` conversions validate every field on the way in.

pub mod expectation;
pub mod matcher;

use std::convert::TryFrom;

use sgx_isa::hardware::Hardware;
use sgx_isa::{Attributes, AttributesFlags, Report, Targetinfo};

use crate::error::{Error, Result};
use crate::hardware::hardware_error;
use crate::proto::{
    AttributesProto, CodeIdentityMatchSpecProto, CodeIdentityProto, CpuSvn, MachineConfigurationMatchSpecProto,
    MachineConfigurationProto, SgxIdentityMatchSpecProto, SgxIdentityProto, SgxTypeProto,
    SignerAssignedIdentityProto,
};

pub use self::expectation::{parse_sgx_expectation, serialize_sgx_expectation};
pub use self::matcher::match_identity_to_expectation;

/// Authority type of every SGX enclave identity.
pub const SGX_AUTHORITY_TYPE: &str = "SGX";
/// Version tag of [`SgxIdentity`]-based enclave identities. Identities
/// without it use the legacy code-identity encoding.
pub const SGX_IDENTITY_VERSION: &str = "SGX identity v1";

pub const MEASUREMENT_SIZE: usize = 32;
pub const CPUSVN_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SgxType {
    Standard,
    Scalable,
    ScalableWithIntegrity,
}

impl SgxType {
    fn from_proto(value: i32) -> Result<Self> {
        match SgxTypeProto::try_from(value) {
            Ok(SgxTypeProto::Standard) => Ok(SgxType::Standard),
            Ok(SgxTypeProto::Scalable) => Ok(SgxType::Scalable),
            Ok(SgxTypeProto::ScalableWithIntegrity) => Ok(SgxType::ScalableWithIntegrity),
            _ => Err(Error::invalid_argument(format!("Invalid SGX type: {}", value))),
        }
    }

    fn to_proto(self) -> SgxTypeProto {
        match self {
            SgxType::Standard => SgxTypeProto::Standard,
            SgxType::Scalable => SgxTypeProto::Scalable,
            SgxType::ScalableWithIntegrity => SgxTypeProto::ScalableWithIntegrity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodeIdentity {
    pub mrenclave: [u8; MEASUREMENT_SIZE],
    pub mrsigner: [u8; MEASUREMENT_SIZE],
    pub isvprodid: u16,
    pub isvsvn: u16,
    pub miscselect: u32,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MachineConfiguration {
    pub cpu_svn: Option<[u8; CPUSVN_SIZE]>,
    pub sgx_type: Option<SgxType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SgxIdentity {
    pub code_identity: CodeIdentity,
    pub machine_configuration: MachineConfiguration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CodeIdentityMatchSpec {
    pub is_mrenclave_match_required: bool,
    pub is_mrsigner_match_required: bool,
    pub miscselect_match_mask: u32,
    pub attributes_match_mask: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MachineConfigurationMatchSpec {
    pub is_cpu_svn_match_required: bool,
    pub is_sgx_type_match_required: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SgxIdentityMatchSpec {
    pub code_identity_match_spec: CodeIdentityMatchSpec,
    pub machine_configuration_match_spec: MachineConfigurationMatchSpec,
}

/// Attribute bits that affect the security of an enclave.
fn security_attributes_mask() -> Attributes {
    Attributes {
        flags: AttributesFlags::INIT
            | AttributesFlags::DEBUG
            | AttributesFlags::MODE64BIT
            | AttributesFlags::PROVISIONKEY
            | AttributesFlags::EINITTOKENKEY
            | AttributesFlags::KSS,
        xfrm: 0,
    }
}

impl SgxIdentityMatchSpec {
    /// Matches on MRSIGNER, the security attributes and the CPUSVN.
    pub fn default_local() -> Self {
        SgxIdentityMatchSpec {
            code_identity_match_spec: CodeIdentityMatchSpec {
                is_mrenclave_match_required: false,
                is_mrsigner_match_required: true,
                miscselect_match_mask: u32::MAX,
                attributes_match_mask: security_attributes_mask(),
            },
            machine_configuration_match_spec: MachineConfigurationMatchSpec {
                is_cpu_svn_match_required: true,
                is_sgx_type_match_required: false,
            },
        }
    }

    /// Like [`default_local`](Self::default_local), but matching on
    /// MRENCLAVE instead of MRSIGNER.
    pub fn mrenclave_local() -> Self {
        let mut spec = Self::default_local();
        spec.code_identity_match_spec.is_mrenclave_match_required = true;
        spec.code_identity_match_spec.is_mrsigner_match_required = false;
        spec
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SgxIdentityExpectation {
    pub reference_identity: SgxIdentity,
    pub match_spec: SgxIdentityMatchSpec,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::invalid_argument(format!("Missing required field {}", field)))
}

fn fixed_bytes<const N: usize>(value: &[u8], field: &str) -> Result<[u8; N]> {
    <[u8; N]>::try_from(value).map_err(|_| {
        Error::invalid_argument(format!("{} is {} bytes, {} expected", field, value.len(), N))
    })
}

fn u16_field(value: u32, field: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::invalid_argument(format!("{} {} does not fit in 16 bits", field, value)))
}

fn attributes_from_proto(proto: &AttributesProto, field: &str) -> Result<Attributes> {
    Ok(Attributes {
        flags: AttributesFlags::from_bits_retain(required(proto.flags, field)?),
        xfrm: required(proto.xfrm, field)?,
    })
}

fn attributes_to_proto(attributes: &Attributes) -> AttributesProto {
    AttributesProto { flags: Some(attributes.flags.bits()), xfrm: Some(attributes.xfrm) }
}

impl CodeIdentity {
    pub fn from_proto(proto: &CodeIdentityProto) -> Result<Self> {
        let signer = required(proto.signer_assigned_identity.as_ref(), "signer_assigned_identity")?;
        Ok(CodeIdentity {
            mrenclave: fixed_bytes(required(proto.mrenclave.as_deref(), "mrenclave")?, "MRENCLAVE")?,
            mrsigner: fixed_bytes(required(signer.mrsigner.as_deref(), "mrsigner")?, "MRSIGNER")?,
            isvprodid: u16_field(required(signer.isvprodid, "isvprodid")?, "ISVPRODID")?,
            isvsvn: u16_field(required(signer.isvsvn, "isvsvn")?, "ISVSVN")?,
            miscselect: required(proto.miscselect, "miscselect")?,
            attributes: attributes_from_proto(required(proto.attributes.as_ref(), "attributes")?, "attributes")?,
        })
    }

    pub fn to_proto(&self) -> CodeIdentityProto {
        CodeIdentityProto {
            mrenclave: Some(self.mrenclave.to_vec()),
            signer_assigned_identity: Some(SignerAssignedIdentityProto {
                mrsigner: Some(self.mrsigner.to_vec()),
                isvprodid: Some(self.isvprodid.into()),
                isvsvn: Some(self.isvsvn.into()),
            }),
            miscselect: Some(self.miscselect),
            attributes: Some(attributes_to_proto(&self.attributes)),
        }
    }
}

impl MachineConfiguration {
    pub fn from_proto(proto: &MachineConfigurationProto) -> Result<Self> {
        let cpu_svn = match &proto.cpu_svn {
            Some(CpuSvn { value }) => Some(fixed_bytes(value, "CPUSVN")?),
            None => None,
        };
        let sgx_type = proto.sgx_type.map(SgxType::from_proto).transpose()?;
        Ok(MachineConfiguration { cpu_svn, sgx_type })
    }

    pub fn to_proto(&self) -> MachineConfigurationProto {
        MachineConfigurationProto {
            cpu_svn: self.cpu_svn.map(|v| CpuSvn { value: v.to_vec() }),
            sgx_type: self.sgx_type.map(|t| t.to_proto() as i32),
        }
    }
}

impl SgxIdentity {
    pub fn from_proto(proto: &SgxIdentityProto) -> Result<Self> {
        Ok(SgxIdentity {
            code_identity: CodeIdentity::from_proto(required(proto.code_identity.as_ref(), "code_identity")?)?,
            machine_configuration: match &proto.machine_configuration {
                Some(config) => MachineConfiguration::from_proto(config)?,
                None => MachineConfiguration::default(),
            },
        })
    }

    pub fn to_proto(&self) -> SgxIdentityProto {
        SgxIdentityProto {
            code_identity: Some(self.code_identity.to_proto()),
            machine_configuration: Some(self.machine_configuration.to_proto()),
        }
    }
}

impl CodeIdentityMatchSpec {
    pub fn from_proto(proto: &CodeIdentityMatchSpecProto) -> Result<Self> {
        Ok(CodeIdentityMatchSpec {
            is_mrenclave_match_required: required(proto.is_mrenclave_match_required, "is_mrenclave_match_required")?,
            is_mrsigner_match_required: required(proto.is_mrsigner_match_required, "is_mrsigner_match_required")?,
            miscselect_match_mask: required(proto.miscselect_match_mask, "miscselect_match_mask")?,
            attributes_match_mask: attributes_from_proto(
                required(proto.attributes_match_mask.as_ref(), "attributes_match_mask")?,
                "attributes_match_mask",
            )?,
        })
    }

    pub fn to_proto(&self) -> CodeIdentityMatchSpecProto {
        CodeIdentityMatchSpecProto {
            is_mrenclave_match_required: Some(self.is_mrenclave_match_required),
            is_mrsigner_match_required: Some(self.is_mrsigner_match_required),
            miscselect_match_mask: Some(self.miscselect_match_mask),
            attributes_match_mask: Some(attributes_to_proto(&self.attributes_match_mask)),
        }
    }
}

impl SgxIdentityMatchSpec {
    pub fn from_proto(proto: &SgxIdentityMatchSpecProto) -> Result<Self> {
        let machine = required(proto.machine_configuration_match_spec.as_ref(), "machine_configuration_match_spec")?;
        Ok(SgxIdentityMatchSpec {
            code_identity_match_spec: CodeIdentityMatchSpec::from_proto(required(
                proto.code_identity_match_spec.as_ref(),
                "code_identity_match_spec",
            )?)?,
            machine_configuration_match_spec: MachineConfigurationMatchSpec {
                is_cpu_svn_match_required: required(machine.is_cpu_svn_match_required, "is_cpu_svn_match_required")?,
                is_sgx_type_match_required: required(machine.is_sgx_type_match_required, "is_sgx_type_match_required")?,
            },
        })
    }

    pub fn to_proto(&self) -> SgxIdentityMatchSpecProto {
        let machine = &self.machine_configuration_match_spec;
        SgxIdentityMatchSpecProto {
            code_identity_match_spec: Some(self.code_identity_match_spec.to_proto()),
            machine_configuration_match_spec: Some(MachineConfigurationMatchSpecProto {
                is_cpu_svn_match_required: Some(machine.is_cpu_svn_match_required),
                is_sgx_type_match_required: Some(machine.is_sgx_type_match_required),
            }),
        }
    }
}

/// Extracts the identity of the enclave that produced `report`.
pub fn parse_identity_from_hardware_report(report: &Report) -> SgxIdentity {
    let body = &report.body;
    SgxIdentity {
        code_identity: CodeIdentity {
            mrenclave: body.mrenclave,
            mrsigner: body.mrsigner,
            isvprodid: body.isvprodid,
            isvsvn: body.isvsvn,
            miscselect: body.miscselect.bits(),
            attributes: body.attributes,
        },
        machine_configuration: MachineConfiguration {
            cpu_svn: Some(body.cpusvn),
            sgx_type: Some(SgxType::Standard),
        },
    }
}

/// The identity of the enclave this code runs in.
///
/// Constructed once, from a report of the enclave itself, and passed by
/// reference to whatever needs to check it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelfIdentity {
    pub sgx_identity: SgxIdentity,
}

impl SelfIdentity {
    pub fn from_report(report: &Report) -> Self {
        SelfIdentity { sgx_identity: parse_identity_from_hardware_report(report) }
    }

    pub fn from_hardware<H: Hardware>(hardware: &H) -> Result<Self> {
        let report = hardware
            .get_hardware_report(&Targetinfo::default(), &[0; 64])
            .map_err(hardware_error)?;
        Ok(Self::from_report(&report))
    }
}
