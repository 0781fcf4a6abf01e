//! TOML parser with helpful error messages

use super::schema::StagingSettings;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse staging.toml with detailed error messages
pub fn parse_settings(path: &Path) -> Result<StagingSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_settings_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse staging.toml content from string
pub fn parse_settings_str(content: &str) -> Result<StagingSettings> {
    let settings: StagingSettings =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    settings.validate()?;

    Ok(settings)
}

/// Turn a TOML error into a message that points at the offending line.
pub(crate) fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let Some(offset) = error.span().map(|span| span.start.min(content.len())) else {
        return anyhow::anyhow!("TOML parsing error: {}", error.message());
    };

    let before = content.get(..offset).unwrap_or_default();
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line_num = before.matches('\n').count() + 1;
    let column = before[line_start..].chars().count();
    let line = content[line_start..].lines().next().unwrap_or_default();

    anyhow::anyhow!(
        "TOML parsing error at line {}, column {}: {}\n{:>5} | {}\n      | {}^",
        line_num,
        column + 1,
        error.message(),
        line_num,
        line,
        " ".repeat(column)
    )
}

/// Serialize settings to a TOML string
pub fn to_toml(settings: &StagingSettings) -> Result<String> {
    toml::to_string_pretty(settings).with_context(|| "Failed to serialize settings to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DownloaderFlavor;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_settings() {
        let toml = r#"
flavor = "wget"
path = "/srv/staging"
owner = "deploy"
group = "deploy"
mode = "0750"
exec_path = "/opt/bin:/usr/bin"
"#;

        let settings = parse_settings_str(toml).unwrap();
        assert_eq!(settings.flavor().unwrap(), DownloaderFlavor::Wget);
        assert_eq!(settings.path, PathBuf::from("/srv/staging"));
        assert_eq!(settings.owner.as_deref(), Some("deploy"));
        assert_eq!(settings.mode_bits().unwrap(), 0o750);
        assert_eq!(settings.exec_path, "/opt/bin:/usr/bin");
    }

    #[test]
    fn test_parse_empty_settings() {
        let settings = parse_settings_str("").unwrap();
        assert_eq!(settings, StagingSettings::default());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let toml = r#"
flavor = "curl
path = "/srv/staging"
"#; // Unterminated string

        let result = parse_settings_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_enhance_toml_error_points_at_line() {
        let toml = "flavor = \"wget\"\nmode = 755\n";
        let err = parse_settings_str(toml).unwrap_err().to_string();
        assert!(err.contains("line 2"), "{err}");
        assert!(err.contains("    2 | mode = 755"), "{err}");
        assert!(err.trim_end().ends_with('^'), "{err}");
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let err = parse_settings_str("mode = \"rwxr-xr-x\"").unwrap_err();
        assert!(err.to_string().contains("Invalid mode"));
    }

    #[test]
    fn test_strict_unknown_flavor_fails_on_resolution() {
        let toml = r#"
flavor = "aria2"
strict_flavor = true
"#;
        let settings = parse_settings_str(toml).unwrap();
        let err = settings.flavor().unwrap_err();
        assert!(err.to_string().contains("unknown downloader flavor"));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let mut original = StagingSettings::with_path("/data/staging");
        original.flavor = "powershell".to_string();
        original.fileserver_root = Some(PathBuf::from("/etc/puppetlabs/code"));

        let toml_str = to_toml(&original).unwrap();
        let parsed = parse_settings_str(&toml_str).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "flavor = \"wget\"").unwrap();

        let settings = parse_settings(temp_file.path()).unwrap();
        assert_eq!(settings.flavor, "wget");
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = parse_settings(Path::new("/nonexistent/path/staging.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }
}
