/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::error::Result;

/// Checks an issuer must pass, in addition to the signature, when a
/// certificate is verified against it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerificationConfig {
    pub issuer_ca: bool,
    pub issuer_key_usage: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyUsageInformation {
    pub certificate_signing: bool,
    pub crl_signing: bool,
    pub digital_signature: bool,
}

/// A certificate in a chain of trust.
pub trait CertificateInterface {
    /// The subject public key as DER.
    fn subject_key_der(&self) -> Result<Vec<u8>>;

    /// Verifies this certificate's signature with the key of `issuer`.
    fn verify(&self, issuer: &dyn CertificateInterface, config: &VerificationConfig) -> Result<()>;

    /// `None` if the certificate does not say.
    fn is_ca(&self) -> Option<bool>;

    fn cert_path_length(&self) -> Option<i64>;

    fn key_usage(&self) -> Option<KeyUsageInformation>;
}
