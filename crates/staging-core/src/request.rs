//! Declaration of a single staged file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Subdirectory used when a declaration does not name one.
pub const DEFAULT_SUBDIR: &str = "staging";

/// Everything a caller declares about one staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    /// Local path or URL to fetch from
    pub source: String,
    /// Explicit destination; computed from the staging root when absent
    pub target: Option<PathBuf>,
    /// Logical identifier, also the default filename
    pub name: String,
    /// Grouping folder under the staging root
    pub subdir: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client certificate path (https only)
    pub certificate: Option<String>,
    /// Disable TLS validation (PowerShell downloader only)
    pub novalidate: bool,
    pub curl_option: Option<String>,
    pub wget_option: Option<String>,
    /// `KEY=VALUE` pairs for the download command
    pub environment: Vec<String>,
    /// Seconds before a single try is abandoned
    pub timeout: Option<u64>,
    pub tries: Option<u32>,
    /// Seconds between tries
    pub try_sleep: Option<u64>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<String>,
}

impl RetrievalRequest {
    /// Create a request with only a source and a name.
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
            name: name.into(),
            subdir: DEFAULT_SUBDIR.to_string(),
            username: None,
            password: None,
            certificate: None,
            novalidate: false,
            curl_option: None,
            wget_option: None,
            environment: Vec::new(),
            timeout: None,
            tries: None,
            try_sleep: None,
            owner: None,
            group: None,
            mode: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    /// Set username and password for basic authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_certificate(mut self, certificate: impl Into<String>) -> Self {
        self.certificate = Some(certificate.into());
        self
    }

    pub fn with_novalidate(mut self, novalidate: bool) -> Self {
        self.novalidate = novalidate;
        self
    }

    pub fn with_curl_option(mut self, option: impl Into<String>) -> Self {
        self.curl_option = Some(option.into());
        self
    }

    pub fn with_wget_option(mut self, option: impl Into<String>) -> Self {
        self.wget_option = Some(option.into());
        self
    }

    pub fn with_environment<I, S>(mut self, environment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment = environment.into_iter().map(Into::into).collect();
        self
    }

    /// Set the runner's timeout, tries and delay between tries.
    pub fn with_retry(
        mut self,
        timeout: Option<u64>,
        tries: Option<u32>,
        try_sleep: Option<u64>,
    ) -> Self {
        self.timeout = timeout;
        self.tries = tries;
        self.try_sleep = try_sleep;
        self
    }

    pub fn with_ownership(
        mut self,
        owner: Option<String>,
        group: Option<String>,
        mode: Option<String>,
    ) -> Self {
        self.owner = owner;
        self.group = group;
        self.mode = mode;
        self
    }
}
