//! Value overrides forwarded to the renderer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CoreError, Result};

/// `--set` entries and `-f` files, in the order the user gave them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOverrides {
    /// `key=value` pairs
    #[serde(default)]
    pub set: Vec<String>,

    /// Values files, later files win
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl ValueOverrides {
    pub fn new(set: Vec<String>, files: Vec<PathBuf>) -> Self {
        Self { set, files }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.files.is_empty()
    }

    /// Check every `--set` entry has a key and every values file exists
    pub fn validate(&self) -> Result<()> {
        for entry in &self.set {
            parse_set_value(entry)?;
        }

        for file in &self.files {
            if !file.is_file() {
                return Err(CoreError::ValuesFileNotFound {
                    path: file.display().to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Split a `key=value` pair; the value may itself contain `=`
pub fn parse_set_value(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(CoreError::InvalidSetValue {
            value: arg.to_string(),
        }),
    }
}
