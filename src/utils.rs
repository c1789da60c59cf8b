use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SecretError};

/// Normalizes a user-supplied file path and rejects system directories.
/// - the deepest existing ancestor is canonicalized and the rest re-appended
/// - `..` in the part that does not exist yet is refused
pub fn validate_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(SecretError::Validation("path must not be empty".to_string()));
    }

    let canonical_path = if path.exists() {
        path.canonicalize()?
    } else {
        let mut existing = path;
        let mut missing = Vec::new();
        loop {
            match existing.parent() {
                Some(parent) => {
                    if let Some(name) = existing.file_name() {
                        missing.push(name.to_os_string());
                    } else if existing.components().next_back() == Some(Component::ParentDir) {
                        return Err(SecretError::Validation(format!(
                            "path {} must not contain '..' below a missing directory",
                            path.display()
                        )));
                    }
                    existing = parent;
                    if existing.as_os_str().is_empty() || existing.exists() {
                        break;
                    }
                }
                None => break,
            }
        }

        let base = if existing.as_os_str().is_empty() {
            std::env::current_dir()?
        } else {
            existing.canonicalize()?
        };
        missing.iter().rev().fold(base, |acc, name| acc.join(name))
    };

    if is_blocked_path(&canonical_path) {
        return Err(SecretError::Validation(format!(
            "access to system directory {} is blocked",
            canonical_path.display()
        )));
    }

    Ok(canonical_path)
}

fn is_blocked_path(path: &Path) -> bool {
    #[cfg(target_os = "windows")]
    {
        let lower = path.to_string_lossy().to_lowercase();
        if lower.contains(r"c:\windows")
            || lower.contains(r"c:\program files")
            || lower.contains(r"c:\program files (x86)")
        {
            return true;
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        const BLOCKED: &[&str] = &[
            "/etc", "/proc", "/sys", "/dev", "/boot", "/bin", "/sbin", "/usr/bin", "/usr/sbin",
        ];
        if BLOCKED.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_existing_file_is_canonicalized() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".env");
        std::fs::write(&file, "A=1").unwrap();

        let dotted = dir.path().join(".").join(".env");
        assert_eq!(validate_path(&dotted).unwrap(), file.canonicalize().unwrap());
    }

    #[test]
    fn test_missing_directories_are_appended() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("backups").join("daily").join("secure_env.db.backup");

        let resolved = validate_path(&target).unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
        assert!(resolved.ends_with("backups/daily/secure_env.db.backup"));
    }

    #[test]
    fn test_parent_traversal_below_missing_dir_is_rejected() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("missing").join("..").join("x.backup");
        assert!(matches!(validate_path(&target), Err(SecretError::Validation(_))));
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(matches!(validate_path(Path::new("")), Err(SecretError::Validation(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_directories_are_blocked() {
        assert!(matches!(
            validate_path(Path::new("/etc/secure_env.db.backup")),
            Err(SecretError::Validation(msg)) if msg.contains("system directory")
        ));
        assert!(matches!(
            validate_path(Path::new("/proc/self/environ")),
            Err(SecretError::Validation(_))
        ));
    }
}
