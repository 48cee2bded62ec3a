//! Serialization options.

use crate::error::OptionsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of rows per record batch.
pub const DEFAULT_BATCH_SIZE: usize = 65_536;

/// Buffer compression applied to the IPC stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compression {
    #[default]
    Uncompressed,
    Zstd,
    Lz4,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Uncompressed => "UNCOMPRESSED",
            Compression::Zstd => "ZSTD",
            Compression::Lz4 => "LZ4",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNCOMPRESSED" | "NONE" => Ok(Compression::Uncompressed),
            "ZSTD" => Ok(Compression::Zstd),
            "LZ4" | "LZ4_FRAME" => Ok(Compression::Lz4),
            _ => Err(OptionsError::InvalidValue {
                key: "compression".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Options passed to a serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializationOptions {
    /// Maximum rows per record batch.
    pub batch_size: usize,
    /// Buffer compression codec.
    pub compression: Compression,
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            compression: Compression::Uncompressed,
        }
    }
}

impl SerializationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Builds options from name/value pairs. Keys not given keep their
    /// defaults; unknown keys are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "batch_size" => {
                    options.batch_size =
                        value
                            .trim()
                            .parse()
                            .map_err(|_| OptionsError::InvalidValue {
                                key: key.to_string(),
                                value: value.to_string(),
                            })?;
                }
                "compression" => options.compression = value.parse()?,
                other => return Err(OptionsError::UnknownOption(other.to_string())),
            }
        }
        options.validate()?;
        Ok(options)
    }

    /// Returns the options as name/value pairs.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("batch_size", self.batch_size.to_string()),
            ("compression", self.compression.to_string()),
        ]
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.batch_size == 0 {
            return Err(OptionsError::ZeroBatchSize);
        }
        Ok(())
    }
}
