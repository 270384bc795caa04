//! Save options for the ABR encoder

use serde::{Deserialize, Serialize};

use super::error::AbrError;

/// On-disk version written by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbrFileVersion {
    /// Records without names
    Version1,
    #[default]
    Version2,
}

impl AbrFileVersion {
    pub fn as_i16(self) -> i16 {
        match self {
            AbrFileVersion::Version1 => 1,
            AbrFileVersion::Version2 => 2,
        }
    }

    pub fn has_names(self) -> bool {
        self == AbrFileVersion::Version2
    }
}

/// Encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SaveOptions {
    pub version: AbrFileVersion,
    /// PackBits-compress pixel rows
    pub rle: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            version: AbrFileVersion::Version2,
            rle: true,
        }
    }
}

impl SaveOptions {
    pub fn from_json(json: &str) -> Result<Self, AbrError> {
        serde_json::from_str(json)
            .map_err(|e| AbrError::InvalidArgument(format!("invalid save options: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, AbrError> {
        serde_json::to_string(self)
            .map_err(|e| AbrError::InvalidArgument(format!("invalid save options: {}", e)))
    }
}
