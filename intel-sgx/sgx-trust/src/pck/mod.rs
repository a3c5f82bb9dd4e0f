/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Provisioning Certification Key certificates: the collection a platform
//! hands out for each TCB level, and the Intel extension those certificates
//! carry.

mod extensions;
pub mod oid;

use std::convert::TryFrom;

pub use self::extensions::{
    read_sgx_extensions, write_sgx_extensions, ExtensionsError, PlatformConfiguration, PlatformTcb, SgxExtensions,
    TCB_COMPONENTS_SIZE,
};

use crate::error::{Error, Result};
use crate::identity::CPUSVN_SIZE;
use crate::proto::{Certificate, CertificateFormat, PceSvn, PckCertificateInfo, PckCertificates, RawTcb, Tcb};

fn validate_pce_svn(pce_svn: Option<&PceSvn>, what: &str) -> Result<u16> {
    let value = pce_svn
        .and_then(|svn| svn.value)
        .ok_or_else(|| Error::invalid_argument(format!("{} does not have a pce_svn", what)))?;
    u16::try_from(value).map_err(|_| Error::invalid_argument(format!("{} has a pce_svn {} out of range", what, value)))
}

/// Checks that `tcb` has 16 components and a 16-bit PCESVN.
pub fn validate_tcb(tcb: &Tcb) -> Result<()> {
    match tcb.components {
        Some(ref components) if components.len() == TCB_COMPONENTS_SIZE => {}
        Some(ref components) => {
            return Err(Error::invalid_argument(format!(
                "Tcb has {} components, {} expected",
                components.len(),
                TCB_COMPONENTS_SIZE
            )))
        }
        None => return Err(Error::invalid_argument("Tcb does not have components")),
    }
    validate_pce_svn(tcb.pce_svn.as_ref(), "Tcb").map(|_| ())
}

/// Checks that `tcbm` has a 16-byte CPUSVN and a 16-bit PCESVN.
pub fn validate_raw_tcb(tcbm: &RawTcb) -> Result<()> {
    match tcbm.cpu_svn {
        Some(ref cpu_svn) if cpu_svn.value.len() == CPUSVN_SIZE => {}
        Some(ref cpu_svn) => {
            return Err(Error::invalid_argument(format!(
                "RawTcb has a cpu_svn of {} bytes, {} expected",
                cpu_svn.value.len(),
                CPUSVN_SIZE
            )))
        }
        None => return Err(Error::invalid_argument("RawTcb does not have a cpu_svn")),
    }
    validate_pce_svn(tcbm.pce_svn.as_ref(), "RawTcb").map(|_| ())
}

pub fn validate_certificate(cert: &Certificate) -> Result<()> {
    match CertificateFormat::try_from(cert.format).ok() {
        None | Some(CertificateFormat::UnknownFormat) => {
            return Err(Error::invalid_argument("Certificate has an unknown format"))
        }
        Some(_) => {}
    }
    if cert.data.is_none() {
        return Err(Error::invalid_argument("Certificate does not have data"));
    }
    Ok(())
}

fn validate_entry(info: &PckCertificateInfo) -> Result<()> {
    let tcb_level = info
        .tcb_level
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("PckCertificateInfo does not have a tcb_level"))?;
    let tcbm = info
        .tcbm
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("PckCertificateInfo does not have a tcbm"))?;
    let cert = info
        .cert
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("PckCertificateInfo does not have a cert"))?;

    validate_tcb(tcb_level)?;
    validate_raw_tcb(tcbm)?;
    validate_certificate(cert)?;

    if tcb_level.pce_svn != tcbm.pce_svn {
        return Err(Error::invalid_argument(
            "PckCertificateInfo has a tcb_level pce_svn that differs from its tcbm pce_svn",
        ));
    }
    Ok(())
}

/// Validates a collection of PCK certificates.
///
/// Every entry must be complete and well formed, and distinct entries may not
/// share a TCB level or a TCBM. Duplicates of a single entry are allowed.
pub fn validate_pck_certificates(certs: &PckCertificates) -> Result<()> {
    for info in &certs.certs {
        validate_entry(info)?;
    }

    for (i, a) in certs.certs.iter().enumerate() {
        for b in certs.certs[i + 1..].iter().filter(|b| *b != a) {
            if a.tcb_level == b.tcb_level {
                return Err(Error::invalid_argument("PckCertificates contains distinct entries with the same tcb_level"));
            }
            if a.tcbm == b.tcbm {
                return Err(Error::invalid_argument("PckCertificates contains distinct entries with the same tcbm"));
            }
        }
    }
    Ok(())
}
