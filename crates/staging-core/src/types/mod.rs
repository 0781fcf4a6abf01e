//! Shared core types used across resolution, configuration and execution.

use serde::{Deserialize, Serialize};

use crate::error::{StagingError, StagingResult};

/// External download tool family used for network sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderFlavor {
    #[default]
    Curl,
    Wget,
    /// Platform-native downloader (PowerShell `System.Net.WebClient`).
    Powershell,
}

impl DownloaderFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloaderFlavor::Curl => "curl",
            DownloaderFlavor::Wget => "wget",
            DownloaderFlavor::Powershell => "powershell",
        }
    }

    /// Parse a flavor name, rejecting anything outside the closed set.
    pub fn parse(value: &str) -> StagingResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "curl" => Ok(Self::Curl),
            "wget" => Ok(Self::Wget),
            "powershell" => Ok(Self::Powershell),
            _ => Err(StagingError::UnknownFlavor {
                flavor: value.to_string(),
            }),
        }
    }

    /// Parse a flavor name, falling back to curl for unknown values.
    pub fn parse_lenient(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|_| {
            tracing::warn!(flavor = value, "unknown downloader flavor, using curl");
            Self::Curl
        })
    }
}

impl std::fmt::Display for DownloaderFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source class derived from the prefix of a source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Absolute POSIX path.
    Local,
    /// Windows path starting with a drive letter.
    Drive,
    File,
    Puppet,
    Http,
    Https,
    Ftp,
    S3,
}

impl Transport {
    /// Classify a source string. Returns `None` for unsupported schemes.
    pub fn classify(source: &str) -> Option<Self> {
        if source.starts_with('/') {
            return Some(Self::Local);
        }
        if has_drive_prefix(source) {
            return Some(Self::Drive);
        }

        const SCHEMES: [(&str, Transport); 6] = [
            ("file://", Transport::File),
            ("puppet://", Transport::Puppet),
            ("http://", Transport::Http),
            ("https://", Transport::Https),
            ("ftp://", Transport::Ftp),
            ("s3://", Transport::S3),
        ];
        SCHEMES
            .iter()
            .find(|(prefix, _)| source.starts_with(prefix))
            .map(|(_, transport)| *transport)
    }

    /// True for sources fetched by an external command.
    pub fn is_network(self) -> bool {
        matches!(self, Self::Http | Self::Https | Self::Ftp | Self::S3)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Local => "local",
            Transport::Drive => "drive",
            Transport::File => "file",
            Transport::Puppet => "puppet",
            Transport::Http => "http",
            Transport::Https => "https",
            Transport::Ftp => "ftp",
            Transport::S3 => "s3",
        }
    }
}

fn has_drive_prefix(source: &str) -> bool {
    let mut chars = source.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}
