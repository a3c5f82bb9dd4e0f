/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! `ENCLU` leaves used by [`EnclaveHardware`](crate::hardware::EnclaveHardware).
//!
//! Structures are encoded into aligned architectural images right before the
//! instruction executes and decoded right after.

use core::arch::asm;

use crate::hardware::HardwareKey;
use crate::{Enclu, Keyrequest, Report, Targetinfo};

#[repr(C, align(16))]
struct KeyImage([u8; 16]);

#[repr(C, align(128))]
struct ReportDataImage([u8; 64]);

#[repr(C, align(512))]
struct KeyrequestImage([u8; Keyrequest::UNPADDED_SIZE]);

#[repr(C, align(512))]
struct TargetinfoImage([u8; Targetinfo::UNPADDED_SIZE]);

#[repr(C, align(512))]
struct ReportImage([u8; Report::UNPADDED_SIZE]);

/// Derives the key selected by `request`. On failure the status left in
/// `EAX` is returned.
pub fn egetkey(request: &Keyrequest) -> Result<HardwareKey, u32> {
    let request = KeyrequestImage(request.to_bytes());
    let mut key = KeyImage([0; 16]);
    let status: u32;

    unsafe {
        asm!(
            // rbx is reserved by LLVM
            "xchg %rbx, {0}",
            "enclu",
            "mov {0}, %rbx",
            inout(reg) &request => _,
            inlateout("eax") Enclu::EGetkey as u32 => status,
            in("rcx") &mut key,
            options(att_syntax, nostack),
        );
    }

    match status {
        0 => Ok(key.0),
        status => Err(status),
    }
}

/// Reports on the current enclave, targeted at the enclave in `targetinfo`.
pub fn ereport(targetinfo: &Targetinfo, reportdata: &[u8; 64]) -> Report {
    let targetinfo = TargetinfoImage(targetinfo.to_bytes());
    let reportdata = ReportDataImage(*reportdata);
    let mut report = ReportImage([0; Report::UNPADDED_SIZE]);

    unsafe {
        asm!(
            "xchg %rbx, {0}",
            "enclu",
            "mov {0}, %rbx",
            inout(reg) &targetinfo => _,
            in("eax") Enclu::EReport as u32,
            in("rcx") &reportdata,
            in("rdx") &mut report,
            options(att_syntax, preserves_flags, nostack),
        );
    }

    Report::from_bytes(&report.0)
}
