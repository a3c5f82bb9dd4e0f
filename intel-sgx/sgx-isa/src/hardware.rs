/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{Keyrequest, Report, Targetinfo};

/// A 128-bit key as returned by `EGETKEY`.
pub type HardwareKey = [u8; 16];

/// The two SGX primitives the trust core relies on.
///
/// Errors are the raw `EGETKEY` status value; see [`ErrorCode`](crate::ErrorCode).
pub trait Hardware {
    fn get_hardware_key(&self, request: &Keyrequest) -> Result<HardwareKey, u32>;

    fn get_hardware_report(&self, targetinfo: &Targetinfo, reportdata: &[u8; 64]) -> Result<Report, u32>;
}

impl<'a, H: Hardware + ?Sized> Hardware for &'a H {
    fn get_hardware_key(&self, request: &Keyrequest) -> Result<HardwareKey, u32> {
        (**self).get_hardware_key(request)
    }

    fn get_hardware_report(&self, targetinfo: &Targetinfo, reportdata: &[u8; 64]) -> Result<Report, u32> {
        (**self).get_hardware_report(targetinfo, reportdata)
    }
}

/// The `ENCLU` instruction of the enclave this code runs in.
#[cfg(all(target_arch = "x86_64", target_env = "sgx"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct EnclaveHardware;

#[cfg(all(target_arch = "x86_64", target_env = "sgx"))]
impl Hardware for EnclaveHardware {
    fn get_hardware_key(&self, request: &Keyrequest) -> Result<HardwareKey, u32> {
        crate::arch::egetkey(request)
    }

    fn get_hardware_report(&self, targetinfo: &Targetinfo, reportdata: &[u8; 64]) -> Result<Report, u32> {
        Ok(crate::arch::ereport(targetinfo, reportdata))
    }
}
