/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Hardware-rooted trust for SGX enclaves.
//!
//! * [`attestation_key`]: verification of the certificate by which the PCE
//!   vouches for an attestation key.
//! * [`sealing`]: secrets sealed to enclave identities with keys derived by
//!   `EGETKEY`.
//! * [`pck`]: validation of PCK certificate collections and the PCK
//!   certificate extension.
//! * [`manager`]: the provisioning flow through the PCE and the Assertion
//!   Generator Enclave.

#![doc(html_logo_url = "https://edp.fortanix.com/img/docs/edp-logo.svg",
       html_favicon_url = "https://edp.fortanix.com/favicon.ico",
       html_root_url = "https://edp.fortanix.com/docs/api/")]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;

pub mod age;
pub mod attestation_key;
pub mod certificate;
pub mod config;
pub mod crypto;
mod error;
pub mod hardware;
pub mod identity;
pub mod intel_ae;
pub mod manager;
pub mod pck;
pub mod proto;
pub mod sealing;

#[cfg(test)]
mod test_support;

pub use crate::error::{Error, ErrorCode, Result};
