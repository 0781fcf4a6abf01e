//! Owner, group and mode application.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::parse_octal_mode;
use crate::error::{StagingError, StagingResult};

/// Desired owner, group and mode of a managed path. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<String>,
}

impl Ownership {
    pub fn new(owner: Option<String>, group: Option<String>, mode: Option<String>) -> Self {
        Self { owner, group, mode }
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.group.is_none() && self.mode.is_none()
    }

    /// Apply to `path`. Returns a short description of what was set.
    pub fn apply(&self, path: &Path) -> StagingResult<String> {
        if self.is_empty() {
            return Ok("unchanged".to_string());
        }
        let mode = self
            .mode
            .as_deref()
            .map(|value| {
                parse_octal_mode(value).map_err(|e| StagingError::permission(path, e.to_string()))
            })
            .transpose()?;

        apply_platform(path, self.owner.as_deref(), self.group.as_deref(), mode)
    }
}

#[cfg(unix)]
fn apply_platform(
    path: &Path,
    owner: Option<&str>,
    group: Option<&str>,
    mode: Option<u32>,
) -> StagingResult<String> {
    use nix::unistd::chown;
    use std::os::unix::fs::PermissionsExt;

    let mut detail = Vec::new();

    let uid = owner.map(|spec| resolve_owner(path, spec)).transpose()?;
    let gid = group.map(|spec| resolve_group(path, spec)).transpose()?;
    if uid.is_some() || gid.is_some() {
        chown(path, uid, gid)
            .map_err(|errno| StagingError::permission(path, format!("chown: {errno}")))?;
        if let Some(uid) = uid {
            detail.push(format!("owner={}", uid.as_raw()));
        }
        if let Some(gid) = gid {
            detail.push(format!("group={}", gid.as_raw()));
        }
    }

    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| StagingError::permission(path, format!("chmod: {e}")))?;
        detail.push(format!("mode=0o{mode:o}"));
    }

    Ok(detail.join(","))
}

#[cfg(not(unix))]
fn apply_platform(
    path: &Path,
    owner: Option<&str>,
    group: Option<&str>,
    mode: Option<u32>,
) -> StagingResult<String> {
    let mut requested = Vec::new();
    if owner.is_some() {
        requested.push("owner");
    }
    if group.is_some() {
        requested.push("group");
    }
    if mode.is_some() {
        requested.push("mode");
    }
    Err(StagingError::Unsupported {
        operation: "apply_ownership",
        detail: format!("{} on {}", requested.join(","), path.display()),
    })
}

#[cfg(unix)]
fn resolve_owner(path: &Path, spec: &str) -> StagingResult<nix::unistd::Uid> {
    use nix::unistd::{Uid, User};

    let trimmed = spec.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Uid::from_raw(id));
    }
    User::from_name(trimmed)
        .map_err(|errno| StagingError::permission(path, format!("user lookup {trimmed}: {errno}")))?
        .map(|user| user.uid)
        .ok_or_else(|| StagingError::permission(path, format!("no such user: {trimmed}")))
}

#[cfg(unix)]
fn resolve_group(path: &Path, spec: &str) -> StagingResult<nix::unistd::Gid> {
    use nix::unistd::{Gid, Group};

    let trimmed = spec.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Gid::from_raw(id));
    }
    Group::from_name(trimmed)
        .map_err(|errno| {
            StagingError::permission(path, format!("group lookup {trimmed}: {errno}"))
        })?
        .map(|group| group.gid)
        .ok_or_else(|| StagingError::permission(path, format!("no such group: {trimmed}")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn empty_ownership_is_a_noop() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Ownership::default().apply(temp.path()).unwrap(), "unchanged");
    }

    #[test]
    fn mode_is_applied() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a");
        std::fs::write(&file, "a").unwrap();

        let ownership = Ownership::new(None, None, Some("0600".to_string()));
        ownership.apply(&file).unwrap();

        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o600);
    }

    #[test]
    fn current_owner_by_id_is_accepted() {
        let temp = TempDir::new().unwrap();
        let uid = nix::unistd::getuid().as_raw().to_string();
        let gid = nix::unistd::getgid().as_raw().to_string();

        let ownership = Ownership::new(Some(uid), Some(gid), None);
        assert!(ownership.apply(temp.path()).is_ok());
    }

    #[test]
    fn unknown_user_is_a_permission_error() {
        let temp = TempDir::new().unwrap();
        let ownership = Ownership::new(Some("no-such-user-staging-test".to_string()), None, None);
        let err = ownership.apply(temp.path()).unwrap_err();
        assert!(matches!(err, StagingError::Permission { .. }));
    }

    #[test]
    fn invalid_mode_is_a_permission_error() {
        let temp = TempDir::new().unwrap();
        let ownership = Ownership::new(None, None, Some("rw-r--r--".to_string()));
        assert!(matches!(
            ownership.apply(temp.path()).unwrap_err(),
            StagingError::Permission { .. }
        ));
    }
}
