/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Node configuration, read from JSON.
//!
//! ```json
//! {
//!     "intel_enclave_dir": "/usr/lib/x86_64-linux-gnu",
//!     "ppid_encryption_scheme": "rsa3072_oaep",
//!     "default_seal_policy": "mrsigner"
//! }
//! ```
//!
//! Every field is optional.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sgx_isa::hardware::Hardware;

use crate::error::{Error, Result};
use crate::identity::SelfIdentity;
use crate::intel_ae::IntelArchitecturalEnclaveInterface;
use crate::proto::AsymmetricEncryptionScheme;
use crate::sealing::SgxLocalSecretSealer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PpidEncryptionScheme {
    Rsa2048Oaep,
    Rsa3072Oaep,
}

impl Default for PpidEncryptionScheme {
    fn default() -> Self {
        PpidEncryptionScheme::Rsa3072Oaep
    }
}

impl From<PpidEncryptionScheme> for AsymmetricEncryptionScheme {
    fn from(scheme: PpidEncryptionScheme) -> Self {
        match scheme {
            PpidEncryptionScheme::Rsa2048Oaep => AsymmetricEncryptionScheme::Rsa2048Oaep,
            PpidEncryptionScheme::Rsa3072Oaep => AsymmetricEncryptionScheme::Rsa3072Oaep,
        }
    }
}

/// Which measurement secrets are sealed to by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealPolicy {
    Mrenclave,
    Mrsigner,
}

impl Default for SealPolicy {
    fn default() -> Self {
        SealPolicy::Mrsigner
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the Intel PCE and QE. The DCAP library default is
    /// used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intel_enclave_dir: Option<PathBuf>,
    pub ppid_encryption_scheme: PpidEncryptionScheme,
    pub default_seal_policy: SealPolicy,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::invalid_argument(format!("Invalid configuration: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::invalid_argument(format!("Could not open configuration {}: {}", path.display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::invalid_argument(format!("Invalid configuration {}: {}", path.display(), e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::internal(e.to_string()))
    }

    pub fn ppid_encryption_scheme(&self) -> AsymmetricEncryptionScheme {
        self.ppid_encryption_scheme.into()
    }

    /// Points `intel_ae` at the configured enclave directory, if any.
    pub fn apply_to(&self, intel_ae: &dyn IntelArchitecturalEnclaveInterface) -> Result<()> {
        let dir = match self.intel_enclave_dir {
            Some(ref dir) => dir,
            None => return Ok(()),
        };
        let dir = dir
            .to_str()
            .ok_or_else(|| Error::invalid_argument(format!("Enclave directory {} is not UTF-8", dir.display())))?;
        debug!("Loading Intel enclaves from {}", dir);
        intel_ae.set_enclave_dir(dir)
    }

    /// A sealer following the configured seal policy.
    pub fn secret_sealer<H: Hardware>(&self, hardware: H, self_identity: SelfIdentity) -> SgxLocalSecretSealer<H> {
        match self.default_seal_policy {
            SealPolicy::Mrenclave => SgxLocalSecretSealer::create_mrenclave_secret_sealer(hardware, self_identity),
            SealPolicy::Mrsigner => SgxLocalSecretSealer::create_mrsigner_secret_sealer(hardware, self_identity),
        }
    }
}
