//! Downloader command templates keyed by flavor, transport and credentials.

use crate::request::RetrievalRequest;
use crate::shell;
use crate::types::{DownloaderFlavor, Transport};

/// Which credentials shape the download command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialMode {
    Anonymous,
    Password,
    Certificate,
    NoValidate,
}

impl CredentialMode {
    /// Username wins over certificate, which wins over novalidate.
    /// Certificate and novalidate only apply to https.
    pub fn for_request(request: &RetrievalRequest, transport: Transport) -> Self {
        if request.username.is_some() {
            return Self::Password;
        }
        if transport != Transport::Https {
            return Self::Anonymous;
        }
        if request.certificate.is_some() {
            Self::Certificate
        } else if request.novalidate {
            Self::NoValidate
        } else {
            Self::Anonymous
        }
    }
}

/// A fragment of a command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Lit(&'static str),
    /// Flavor option string plus a trailing space; nothing when unset
    ToolOption,
    Target,
    Source,
    UserPass,
    Username,
    Password,
    Certificate,
    /// `:password` appended to the certificate; nothing when unset
    CertificatePassword,
}

type Template = &'static [Piece];

use Piece::*;

const CURL_HTTP: Template = &[
    Lit("curl "),
    ToolOption,
    Lit("-f -L -o "),
    Target,
    Lit(" "),
    Source,
];
const CURL_HTTP_PASSWORD: Template = &[
    Lit("curl "),
    ToolOption,
    Lit("-f -L -o "),
    Target,
    Lit(" -u "),
    UserPass,
    Lit(" "),
    Source,
];
const CURL_HTTPS_CERTIFICATE: Template = &[
    Lit("curl "),
    ToolOption,
    Lit("-f -L -o "),
    Target,
    Lit(" -E "),
    Certificate,
    CertificatePassword,
    Lit(" "),
    Source,
];
const CURL_FTP: Template = &[
    Lit("curl "),
    ToolOption,
    Lit("-o "),
    Target,
    Lit(" "),
    Source,
];
const CURL_FTP_PASSWORD: Template = &[
    Lit("curl "),
    ToolOption,
    Lit("-o "),
    Target,
    Lit(" -u "),
    UserPass,
    Lit(" "),
    Source,
];

const WGET: Template = &[
    Lit("wget "),
    ToolOption,
    Lit("-O "),
    Target,
    Lit(" "),
    Source,
];
const WGET_PASSWORD: Template = &[
    Lit("wget "),
    ToolOption,
    Lit("-O "),
    Target,
    Lit(" --user="),
    Username,
    Lit(" --password="),
    Password,
    Lit(" "),
    Source,
];
const WGET_CERTIFICATE: Template = &[
    Lit("wget "),
    ToolOption,
    Lit("-O "),
    Target,
    Lit(" --certificate="),
    Certificate,
    Lit(" "),
    Source,
];

const POWERSHELL: Template = &[
    Lit("$webclient = New-Object System.Net.WebClient; $webclient.DownloadFile('"),
    Source,
    Lit("', '"),
    Target,
    Lit("')"),
];
const POWERSHELL_PASSWORD: Template = &[
    Lit("$webclient = New-Object System.Net.WebClient; "),
    Lit("$webclient.Credentials = New-Object System.Net.NetworkCredential('"),
    Username,
    Lit("', '"),
    Password,
    Lit("'); $webclient.DownloadFile('"),
    Source,
    Lit("', '"),
    Target,
    Lit("')"),
];
// Validation is restored in `finally` so a failed download cannot leave it disabled.
const POWERSHELL_NOVALIDATE: Template = &[
    Lit("$webclient = New-Object System.Net.WebClient; "),
    Lit("[System.Net.ServicePointManager]::ServerCertificateValidationCallback = { $true }; "),
    Lit("try { $webclient.DownloadFile('"),
    Source,
    Lit("', '"),
    Target,
    Lit("') } finally { "),
    Lit("[System.Net.ServicePointManager]::ServerCertificateValidationCallback = $null }"),
];

use CredentialMode::{Anonymous, Certificate as Cert, NoValidate, Password as Pass};
use DownloaderFlavor::{Curl, Powershell, Wget};
use Transport::{Ftp, Http, Https};

/// Every reachable (flavor, transport, credential mode) combination.
static TABLE: &[(DownloaderFlavor, Transport, CredentialMode, Template)] = &[
    (Curl, Http, Anonymous, CURL_HTTP),
    (Curl, Http, Pass, CURL_HTTP_PASSWORD),
    (Curl, Https, Anonymous, CURL_HTTP),
    (Curl, Https, Pass, CURL_HTTP_PASSWORD),
    (Curl, Https, Cert, CURL_HTTPS_CERTIFICATE),
    (Curl, Https, NoValidate, CURL_HTTP),
    (Curl, Ftp, Anonymous, CURL_FTP),
    (Curl, Ftp, Pass, CURL_FTP_PASSWORD),
    (Wget, Http, Anonymous, WGET),
    (Wget, Http, Pass, WGET_PASSWORD),
    (Wget, Https, Anonymous, WGET),
    (Wget, Https, Pass, WGET_PASSWORD),
    (Wget, Https, Cert, WGET_CERTIFICATE),
    (Wget, Https, NoValidate, WGET),
    (Wget, Ftp, Anonymous, WGET),
    (Wget, Ftp, Pass, WGET_PASSWORD),
    (Powershell, Http, Anonymous, POWERSHELL),
    (Powershell, Http, Pass, POWERSHELL_PASSWORD),
    (Powershell, Https, Anonymous, POWERSHELL),
    (Powershell, Https, Pass, POWERSHELL_PASSWORD),
    // WebClient has no client-certificate form.
    (Powershell, Https, Cert, POWERSHELL),
    (Powershell, Https, NoValidate, POWERSHELL_NOVALIDATE),
    (Powershell, Ftp, Anonymous, POWERSHELL),
    (Powershell, Ftp, Pass, POWERSHELL_PASSWORD),
];

fn lookup(
    flavor: DownloaderFlavor,
    transport: Transport,
    mode: CredentialMode,
) -> Option<Template> {
    TABLE
        .iter()
        .find(|(f, t, m, _)| *f == flavor && *t == transport && *m == mode)
        .map(|(_, _, _, template)| *template)
}

/// Build the download command for an http, https or ftp source.
///
/// Returns `None` when the combination has no template.
pub fn download_command(
    flavor: DownloaderFlavor,
    transport: Transport,
    request: &RetrievalRequest,
    target_file: &str,
) -> Option<String> {
    let mode = CredentialMode::for_request(request, transport);
    let template = lookup(flavor, transport, mode)?;
    Some(render(template, flavor, request, target_file))
}

fn render(
    template: Template,
    flavor: DownloaderFlavor,
    request: &RetrievalRequest,
    target_file: &str,
) -> String {
    let powershell = flavor == Powershell;
    let quote = |value: &str| {
        if powershell {
            shell::powershell_literal(value)
        } else {
            shell::quote(value)
        }
    };
    let verbatim = |value: &str| {
        if powershell {
            shell::powershell_literal(value)
        } else {
            value.to_string()
        }
    };

    let username = request.username.as_deref().unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();

    let mut command = String::new();
    for piece in template {
        match piece {
            Lit(text) => command.push_str(text),
            ToolOption => {
                let option = match flavor {
                    Curl => request.curl_option.as_deref(),
                    Wget => request.wget_option.as_deref(),
                    Powershell => None,
                };
                if let Some(option) = option.map(str::trim).filter(|o| !o.is_empty()) {
                    command.push_str(option);
                    command.push(' ');
                }
            }
            Target => command.push_str(&verbatim(target_file)),
            Source => command.push_str(&quote(&request.source)),
            UserPass => command.push_str(&quote(&format!("{username}:{password}"))),
            Username => command.push_str(&verbatim(username)),
            Password => command.push_str(&quote(password)),
            Certificate => {
                command.push_str(&verbatim(request.certificate.as_deref().unwrap_or_default()))
            }
            CertificatePassword => {
                if let Some(password) = request.password.as_deref() {
                    command.push(':');
                    command.push_str(&quote(password));
                }
            }
        }
    }
    command
}
