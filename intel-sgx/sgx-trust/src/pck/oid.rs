/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

// Intel SGX PCK certificate extension, see the Intel SGX PCK Certificate and
// CRL Profile Specification, section 3.5.

use yasna::models::ObjectIdentifier;

lazy_static! {
    pub static ref SGX_EXTENSION:                      ObjectIdentifier = ObjectIdentifier::from_slice(&[1, 2, 840, 113741, 1, 13, 1]);
    pub static ref SGX_EXTENSION_TCB:                  ObjectIdentifier = ObjectIdentifier::from_slice(&[1, 2, 840, 113741, 1, 13, 1, 2]);
    pub static ref SGX_EXTENSION_CONFIGURATION:        ObjectIdentifier = ObjectIdentifier::from_slice(&[1, 2, 840, 113741, 1, 13, 1, 7]);
    pub static ref SGX_EXTENSION_CONF_DYNAMIC_PLATFORM: ObjectIdentifier = ObjectIdentifier::from_slice(&[1, 2, 840, 113741, 1, 13, 1, 7, 1]);
    pub static ref SGX_EXTENSION_CONF_CACHED_KEYS:     ObjectIdentifier = ObjectIdentifier::from_slice(&[1, 2, 840, 113741, 1, 13, 1, 7, 2]);
    pub static ref SGX_EXTENSION_CONF_SMT_ENABLED:     ObjectIdentifier = ObjectIdentifier::from_slice(&[1, 2, 840, 113741, 1, 13, 1, 7, 3]);
}

/// Last component of the top-level extension entries.
pub const PPID: u64 = 1;
pub const TCB: u64 = 2;
pub const PCEID: u64 = 3;
pub const FMSPC: u64 = 4;
pub const SGX_TYPE: u64 = 5;
pub const PLATFORM_INSTANCE_ID: u64 = 6;
pub const CONFIGURATION: u64 = 7;

/// Last component of the TCB entries after the sixteen component SVNs.
pub const TCB_PCESVN: u64 = 17;
pub const TCB_CPUSVN: u64 = 18;

/// `base` extended by `last`.
pub fn child(base: &ObjectIdentifier, last: u64) -> ObjectIdentifier {
    let mut components = base.components().clone();
    components.push(last);
    ObjectIdentifier::new(components)
}
