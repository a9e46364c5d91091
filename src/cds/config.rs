//! CDS API credentials.
//!
//! Read from the `CDSAPI_URL` and `CDSAPI_KEY` environment variables, or
//! from a `.cdsapirc` file in the home directory:
//!
//! ```text
//! url: https://cds.climate.copernicus.eu/api/v2
//! key: 12345:abcdef01-2345-6789-abcd-ef0123456789
//! verify: 1
//! ```
//!
//! Only the legacy `UID:KEY` key form is understood, since requests are sent
//! with basic auth to the `resources`/`tasks` API. Bare personal access
//! tokens issued by the newer CDS are rejected with `InvalidKey` before any
//! request is made.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use super::CdsError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsConfig {
    pub url: String,
    pub key: String,
    pub verify: bool,
}

impl CdsConfig {
    /// Environment first, then the rc file.
    pub fn load() -> Result<Self, CdsError> {
        if let (Ok(url), Ok(key)) = (env::var("CDSAPI_URL"), env::var("CDSAPI_KEY")) {
            return Ok(CdsConfig {
                url,
                key,
                verify: true,
            });
        }

        let path = match env::var_os("CDSAPI_RC") {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir()
                .ok_or(CdsError::HomeDirResolution)?
                .join(".cdsapirc"),
        };

        Self::from_rc_file(&path)
    }

    pub fn from_rc_file(path: &Path) -> Result<Self, CdsError> {
        let text =
            fs::read_to_string(path).map_err(|e| CdsError::ConfigRead(path.to_path_buf(), e))?;

        Self::parse_rc(&text)
    }

    pub fn parse_rc(text: &str) -> Result<Self, CdsError> {
        let mut url = None;
        let mut key = None;
        let mut verify = true;

        for line in text.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match name.trim() {
                "url" => url = Some(value.to_string()),
                "key" => key = Some(value.to_string()),
                "verify" => verify = value != "0",
                _ => {}
            }
        }

        Ok(CdsConfig {
            url: url.ok_or(CdsError::MissingSetting("url"))?,
            key: key.ok_or(CdsError::MissingSetting("key"))?,
            verify,
        })
    }

    /// The key split into user id and API key for basic auth.
    pub fn credentials(&self) -> Result<(&str, &str), CdsError> {
        match self.key.split_once(':') {
            Some((uid, key)) if !uid.is_empty() && !key.is_empty() => Ok((uid, key)),
            _ => Err(CdsError::InvalidKey),
        }
    }
}

// -- Tests -------------------------------------------------------------------
