/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::convert::TryFrom;

use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader, DERWriter};

use super::oid::{self, child};
use crate::error::Error;
use crate::identity::{SgxType, CPUSVN_SIZE};

pub const PPID_SIZE: usize = 16;
pub const TCB_COMPONENTS_SIZE: usize = 16;
pub const FMSPC_SIZE: usize = 6;
pub const PLATFORM_INSTANCE_ID_SIZE: usize = 16;

quick_error! {
    #[derive(Debug)]
    pub enum ExtensionsError {
        Asn1(err: ASN1Error) {
            from()
            display("Malformed SGX extensions: {}", err)
        }
        InvalidLength(field: &'static str, len: usize) {
            display("SGX extension {} has invalid length {}", field, len)
        }
        InvalidSgxType(value: i64) {
            display("Unknown SGX type {}", value)
        }
    }
}

impl From<ExtensionsError> for Error {
    fn from(err: ExtensionsError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

impl SgxType {
    fn to_asn1(self) -> i64 {
        match self {
            SgxType::Standard => 0,
            SgxType::Scalable => 1,
            SgxType::ScalableWithIntegrity => 2,
        }
    }

    fn is_scalable(self) -> bool {
        self != SgxType::Standard
    }
}

impl TryFrom<i64> for SgxType {
    type Error = ExtensionsError;

    fn try_from(value: i64) -> Result<Self, ExtensionsError> {
        match value {
            0 => Ok(SgxType::Standard),
            1 => Ok(SgxType::Scalable),
            2 => Ok(SgxType::ScalableWithIntegrity),
            _ => Err(ExtensionsError::InvalidSgxType(value)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PlatformTcb {
    pub components: [u8; TCB_COMPONENTS_SIZE],
    pub pce_svn: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PlatformConfiguration {
    pub dynamic_platform: bool,
    pub cached_keys: bool,
    pub smt_enabled: bool,
}

/// The Intel extension of a PCK certificate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SgxExtensions {
    pub ppid: [u8; PPID_SIZE],
    pub tcb: PlatformTcb,
    pub cpu_svn: [u8; CPUSVN_SIZE],
    pub pce_id: u16,
    pub fmspc: [u8; FMSPC_SIZE],
    pub sgx_type: SgxType,
    /// Only present on scalable platforms.
    pub platform_instance_id: Option<[u8; PLATFORM_INSTANCE_ID_SIZE]>,
    /// Only present on scalable platforms.
    pub configuration: Option<PlatformConfiguration>,
}

fn read_tagged<'a, 'b, F, T>(reader: BERReader<'a, 'b>, oid: &ObjectIdentifier, callback: F) -> ASN1Result<T>
where
    F: for<'c> FnOnce(BERReader<'a, 'c>) -> ASN1Result<T>,
{
    reader.read_sequence(|reader| {
        if reader.next().read_oid()? != *oid {
            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
        }
        callback(reader.next())
    })
}

fn write_tagged<F: FnOnce(DERWriter)>(writer: DERWriter, oid: &ObjectIdentifier, callback: F) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(oid);
        callback(writer.next());
    })
}

fn fixed<const N: usize>(bytes: Vec<u8>, field: &'static str) -> Result<[u8; N], ExtensionsError> {
    let len = bytes.len();
    <[u8; N]>::try_from(bytes).map_err(|_| ExtensionsError::InvalidLength(field, len))
}

struct RawExtensions {
    ppid: Vec<u8>,
    components: [u8; TCB_COMPONENTS_SIZE],
    pce_svn: u16,
    cpu_svn: Vec<u8>,
    pce_id: Vec<u8>,
    fmspc: Vec<u8>,
    sgx_type: i64,
    platform_instance_id: Option<Vec<u8>>,
    configuration: Option<PlatformConfiguration>,
}

fn read_raw(der: &[u8]) -> ASN1Result<RawExtensions> {
    yasna::parse_der(der, |reader| {
        reader.read_sequence(|reader| {
            let ext = |n| child(&oid::SGX_EXTENSION, n);

            let ppid = read_tagged(reader.next(), &ext(oid::PPID), |r| r.read_bytes())?;
            let (components, pce_svn, cpu_svn) = read_tagged(reader.next(), &ext(oid::TCB), |r| {
                r.read_sequence(|reader| {
                    let mut components = [0u8; TCB_COMPONENTS_SIZE];
                    for (i, component) in components.iter_mut().enumerate() {
                        let oid = child(&oid::SGX_EXTENSION_TCB, i as u64 + 1);
                        *component = read_tagged(reader.next(), &oid, |r| r.read_u8())?;
                    }
                    let pce_svn =
                        read_tagged(reader.next(), &child(&oid::SGX_EXTENSION_TCB, oid::TCB_PCESVN), |r| r.read_u16())?;
                    let cpu_svn =
                        read_tagged(reader.next(), &child(&oid::SGX_EXTENSION_TCB, oid::TCB_CPUSVN), |r| r.read_bytes())?;
                    Ok((components, pce_svn, cpu_svn))
                })
            })?;
            let pce_id = read_tagged(reader.next(), &ext(oid::PCEID), |r| r.read_bytes())?;
            let fmspc = read_tagged(reader.next(), &ext(oid::FMSPC), |r| r.read_bytes())?;
            let sgx_type = read_tagged(reader.next(), &ext(oid::SGX_TYPE), |r| r.read_enum())?;

            let mut platform_instance_id = None;
            let mut configuration = None;
            if sgx_type != SgxType::Standard.to_asn1() {
                platform_instance_id =
                    Some(read_tagged(reader.next(), &ext(oid::PLATFORM_INSTANCE_ID), |r| r.read_bytes())?);
                configuration = Some(read_tagged(reader.next(), &ext(oid::CONFIGURATION), |r| {
                    r.read_sequence(|reader| {
                        Ok(PlatformConfiguration {
                            dynamic_platform: read_tagged(reader.next(), &oid::SGX_EXTENSION_CONF_DYNAMIC_PLATFORM, |r| {
                                r.read_bool()
                            })?,
                            cached_keys: read_tagged(reader.next(), &oid::SGX_EXTENSION_CONF_CACHED_KEYS, |r| {
                                r.read_bool()
                            })?,
                            smt_enabled: read_tagged(reader.next(), &oid::SGX_EXTENSION_CONF_SMT_ENABLED, |r| {
                                r.read_bool()
                            })?,
                        })
                    })
                })?);
            }

            Ok(RawExtensions {
                ppid,
                components,
                pce_svn,
                cpu_svn,
                pce_id,
                fmspc,
                sgx_type,
                platform_instance_id,
                configuration,
            })
        })
    })
}

/// Decodes the DER value of the SGX extension of a PCK certificate.
pub fn read_sgx_extensions(der: &[u8]) -> Result<SgxExtensions, ExtensionsError> {
    let raw = read_raw(der)?;
    let pce_id: [u8; 2] = fixed(raw.pce_id, "PCE-ID")?;
    Ok(SgxExtensions {
        ppid: fixed(raw.ppid, "PPID")?,
        tcb: PlatformTcb { components: raw.components, pce_svn: raw.pce_svn },
        cpu_svn: fixed(raw.cpu_svn, "CPUSVN")?,
        pce_id: u16::from_be_bytes(pce_id),
        fmspc: fixed(raw.fmspc, "FMSPC")?,
        sgx_type: SgxType::try_from(raw.sgx_type)?,
        platform_instance_id: raw
            .platform_instance_id
            .map(|id| fixed(id, "PlatformInstanceID"))
            .transpose()?,
        configuration: raw.configuration,
    })
}

/// Encodes `extensions` as the DER value of a PCK certificate extension.
pub fn write_sgx_extensions(extensions: &SgxExtensions) -> Vec<u8> {
    let ext = |n| child(&oid::SGX_EXTENSION, n);
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            write_tagged(writer.next(), &ext(oid::PPID), |w| w.write_bytes(&extensions.ppid));
            write_tagged(writer.next(), &ext(oid::TCB), |w| {
                w.write_sequence(|writer| {
                    for (i, component) in extensions.tcb.components.iter().enumerate() {
                        let oid = child(&oid::SGX_EXTENSION_TCB, i as u64 + 1);
                        write_tagged(writer.next(), &oid, |w| w.write_u8(*component));
                    }
                    write_tagged(writer.next(), &child(&oid::SGX_EXTENSION_TCB, oid::TCB_PCESVN), |w| {
                        w.write_u16(extensions.tcb.pce_svn)
                    });
                    write_tagged(writer.next(), &child(&oid::SGX_EXTENSION_TCB, oid::TCB_CPUSVN), |w| {
                        w.write_bytes(&extensions.cpu_svn)
                    });
                })
            });
            write_tagged(writer.next(), &ext(oid::PCEID), |w| w.write_bytes(&extensions.pce_id.to_be_bytes()));
            write_tagged(writer.next(), &ext(oid::FMSPC), |w| w.write_bytes(&extensions.fmspc));
            write_tagged(writer.next(), &ext(oid::SGX_TYPE), |w| w.write_enum(extensions.sgx_type.to_asn1()));
            if extensions.sgx_type.is_scalable() {
                let id = extensions.platform_instance_id.unwrap_or_default();
                write_tagged(writer.next(), &ext(oid::PLATFORM_INSTANCE_ID), |w| w.write_bytes(&id));
                let conf = extensions.configuration.unwrap_or_default();
                write_tagged(writer.next(), &ext(oid::CONFIGURATION), |w| {
                    w.write_sequence(|writer| {
                        write_tagged(writer.next(), &oid::SGX_EXTENSION_CONF_DYNAMIC_PLATFORM, |w| {
                            w.write_bool(conf.dynamic_platform)
                        });
                        write_tagged(writer.next(), &oid::SGX_EXTENSION_CONF_CACHED_KEYS, |w| {
                            w.write_bool(conf.cached_keys)
                        });
                        write_tagged(writer.next(), &oid::SGX_EXTENSION_CONF_SMT_ENABLED, |w| {
                            w.write_bool(conf.smt_enabled)
                        });
                    })
                });
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> SgxExtensions {
        SgxExtensions {
            ppid: [0xa1; 16],
            tcb: PlatformTcb { components: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 255], pce_svn: 0x0b0a },
            cpu_svn: [0xc5; 16],
            pce_id: 0x0102,
            fmspc: [0x00, 0x90, 0x6e, 0xa1, 0x00, 0x00],
            sgx_type: SgxType::Standard,
            platform_instance_id: None,
            configuration: None,
        }
    }

    #[test]
    fn ppid_entry_encoding() {
        let der = write_sgx_extensions(&standard());
        // SEQUENCE { SEQUENCE { OID 1.2.840.113741.1.13.1.1, OCTET STRING(16) } ...
        let ppid_oid = [0x06, 0x0a, 0x2a, 0x86, 0x48, 0x86, 0xf8, 0x4d, 0x01, 0x0d, 0x01, 0x01];
        assert_eq!(der[0], 0x30);
        let pos = der.windows(ppid_oid.len()).position(|w| w == ppid_oid).unwrap();
        assert_eq!(&der[pos + ppid_oid.len()..][..2], &[0x04, 0x10]);
        assert_eq!(&der[pos + ppid_oid.len() + 2..][..16], &[0xa1; 16]);
    }

    #[test]
    fn decode_reencoded() {
        let ext = standard();
        assert_eq!(read_sgx_extensions(&write_sgx_extensions(&ext)).unwrap(), ext);

        let mut scalable = standard();
        scalable.sgx_type = SgxType::ScalableWithIntegrity;
        scalable.platform_instance_id = Some([0x77; 16]);
        scalable.configuration =
            Some(PlatformConfiguration { dynamic_platform: true, cached_keys: false, smt_enabled: true });
        assert_eq!(read_sgx_extensions(&write_sgx_extensions(&scalable)).unwrap(), scalable);
    }

    #[test]
    fn rejects_malformed() {
        let der = write_sgx_extensions(&standard());
        assert!(read_sgx_extensions(&der[..der.len() - 1]).is_err());
        assert!(read_sgx_extensions(&[0x30, 0x00]).is_err());

        // TCB entry where the PPID belongs.
        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                write_tagged(writer.next(), &child(&oid::SGX_EXTENSION, oid::TCB), |w| w.write_bytes(&[0; 16]));
            })
        });
        let err: Error = read_sgx_extensions(&der).unwrap_err().into();
        assert_eq!(err.code(), crate::ErrorCode::InvalidArgument);
    }

    #[test]
    fn rejects_bad_lengths() {
        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                write_tagged(writer.next(), &child(&oid::SGX_EXTENSION, oid::PPID), |w| w.write_bytes(&[0; 15]));
            })
        });
        assert!(read_sgx_extensions(&der).is_err());
        assert!(matches!(fixed::<16>(vec![0; 15], "PPID"), Err(ExtensionsError::InvalidLength("PPID", 15))));
    }
}
