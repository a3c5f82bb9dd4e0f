/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use sgx_isa::ErrorCode as HwError;

use crate::error::Error;

/// Maps an `EGETKEY`/`EREPORT` status to the crate error taxonomy.
pub fn hardware_error(code: u32) -> Error {
    match HwError::from_repr(code) {
        Some(HwError::InvalidAttribute) => {
            Error::PermissionDenied("EGETKEY: requested key is not accessible to this enclave".into())
        }
        Some(HwError::InvalidCpusvn) => Error::InvalidArgument("EGETKEY: CPUSVN is beyond the platform's".into()),
        Some(HwError::InvalidIsvsvn) => Error::InvalidArgument("EGETKEY: ISVSVN is beyond the enclave's".into()),
        Some(HwError::InvalidKeyname) => Error::InvalidArgument("EGETKEY: unsupported key name".into()),
        Some(other) => Error::Unknown(format!("SGX hardware error {:?}", other)),
        None => Error::Unknown(format!("SGX hardware error {:#x}", code)),
    }
}
