//! `.env` credential storage
//!
//! Values are written double-quoted with `\`, `"` and `$` escaped so that
//! dotenv reads them back verbatim. Every rewrite of an existing file first
//! copies it to `<file>.bak`.

use crate::config::{ENV_SA_ROLE, ENV_SA_USER, ENV_SNOWFLAKE_PASSWORD};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: dotenv::Error,
    },

    #[error("Failed to back up {} to {}: {source}", path.display(), backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },
}

/// Quote a value for a `.env` file
pub fn escape_value(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{escaped}\"")
}

fn value_of<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.trim_start()
        .strip_prefix(key)
        .and_then(|rest| rest.trim_start().strip_prefix('='))
}

/// Replace `key`'s line, or append one, with an already-escaped value
pub fn upsert(content: &str, key: &str, escaped: &str) -> String {
    let replacement = format!("{key}={escaped}");
    let mut found = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if value_of(line, key).is_some() {
                found = true;
                replacement.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        lines.push(replacement);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// `<file>.bak` next to `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

fn read(path: &Path) -> Result<Option<String>, EnvFileError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(EnvFileError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn backup(path: &Path) -> Result<PathBuf, EnvFileError> {
    let backup = backup_path(path);
    std::fs::copy(path, &backup).map_err(|source| EnvFileError::Backup {
        path: path.to_path_buf(),
        backup: backup.clone(),
        source,
    })?;
    Ok(backup)
}

fn write(path: &Path, content: &str) -> Result<(), EnvFileError> {
    std::fs::write(path, content).map_err(|source| EnvFileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Store a freshly issued token with its user and role
///
/// Creates the file when missing; returns the backup path when an existing
/// file was rewritten.
pub fn store_credentials(
    path: &Path,
    user: &str,
    token: &str,
    role: &str,
) -> Result<Option<PathBuf>, EnvFileError> {
    let existing = read(path)?;
    let backup = match existing {
        Some(_) => Some(backup(path)?),
        None => None,
    };
    let mut content = existing.unwrap_or_default();
    content = upsert(&content, ENV_SNOWFLAKE_PASSWORD, &escape_value(token));
    content = upsert(&content, ENV_SA_USER, &escape_value(user));
    content = upsert(&content, ENV_SA_ROLE, &escape_value(role));
    write(path, &content)?;
    info!(path = %path.display(), "Stored PAT credentials");
    Ok(backup)
}

/// Blank the stored token; `false` when the file does not exist
pub fn clear_token(path: &Path) -> Result<bool, EnvFileError> {
    let Some(content) = read(path)? else {
        return Ok(false);
    };
    backup(path)?;
    let cleared: Vec<String> = content
        .lines()
        .map(|line| {
            if value_of(line, ENV_SNOWFLAKE_PASSWORD).is_some() {
                format!("{ENV_SNOWFLAKE_PASSWORD}=\"\"")
            } else {
                line.to_string()
            }
        })
        .collect();
    let mut out = cleared.join("\n");
    out.push('\n');
    write(path, &out)?;
    info!(path = %path.display(), "Cleared stored PAT");
    Ok(true)
}

/// Token stored in the file, if any
///
/// Lines dotenv cannot parse are skipped; an empty token counts as absent.
pub fn read_token(path: &Path) -> Result<Option<String>, EnvFileError> {
    let entries = match dotenv::from_path_iter(path) {
        Ok(entries) => entries,
        Err(dotenv::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(EnvFileError::Parse {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    for entry in entries {
        match entry {
            Ok((key, value)) if key == ENV_SNOWFLAKE_PASSWORD => {
                return Ok(Some(value).filter(|v| !v.is_empty()));
            }
            Ok(_) => {}
            Err(dotenv::Error::LineParse(line, index)) => {
                warn!(path = %path.display(), index, line = %line, "Skipping unparsable .env line");
            }
            Err(source) => {
                return Err(EnvFileError::Parse {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value(r#"ab"c\d"#), r#""ab\"c\\d""#);
        assert_eq!(escape_value("p$ss"), r#""p\$ss""#);
    }

    #[test]
    fn test_read_token_through_dotenv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        let token = r#"ab"c\d$HOME"#;
        std::fs::write(
            &path,
            format!("# comment\nSNOWFLAKE_ACCOUNT=acct\nSNOWFLAKE_PASSWORD={}\n", escape_value(token)),
        )
        .unwrap();
        assert_eq!(read_token(&path).unwrap().as_deref(), Some(token));
    }

    #[test]
    fn test_read_token_accepts_single_quotes_and_bare_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "SNOWFLAKE_PASSWORD='single'\n").unwrap();
        assert_eq!(read_token(&path).unwrap().as_deref(), Some("single"));

        std::fs::write(&path, "SNOWFLAKE_PASSWORD=bare\n").unwrap();
        assert_eq!(read_token(&path).unwrap().as_deref(), Some("bare"));

        std::fs::write(&path, "SA_USER=svc\n").unwrap();
        assert_eq!(read_token(&path).unwrap(), None);
    }

    #[test]
    fn test_read_token_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_token(&dir.path().join(".env")).unwrap(), None);
    }

    #[test]
    fn test_upsert_replaces_and_appends() {
        let content = "SNOWFLAKE_ACCOUNT=acct\nSNOWFLAKE_PASSWORD=old\n\n";
        let updated = upsert(content, "SNOWFLAKE_PASSWORD", "\"new\"");
        assert_eq!(updated, "SNOWFLAKE_ACCOUNT=acct\nSNOWFLAKE_PASSWORD=\"new\"\n\n");

        let appended = upsert(content, "SA_USER", "\"svc\"");
        assert_eq!(
            appended,
            "SNOWFLAKE_ACCOUNT=acct\nSNOWFLAKE_PASSWORD=old\nSA_USER=\"svc\"\n"
        );
    }

    #[test]
    fn test_upsert_does_not_match_longer_keys() {
        let content = "SA_USER_EXTRA=x\n";
        let updated = upsert(content, "SA_USER", "\"svc\"");
        assert_eq!(updated, "SA_USER_EXTRA=x\nSA_USER=\"svc\"\n");
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(backup_path(Path::new("/tmp/.env")), PathBuf::from("/tmp/.env.bak"));
        assert_eq!(backup_path(Path::new("conf/app.env")), PathBuf::from("conf/app.env.bak"));
    }

    #[test]
    fn test_store_and_read_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "SNOWFLAKE_ACCOUNT=acct\nSNOWFLAKE_PASSWORD=\"old\"\n").unwrap();

        let backup = store_credentials(&path, "SVC", "tok\"en", "PAT_ROLE").unwrap();
        assert_eq!(backup, Some(dir.path().join(".env.bak")));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".env.bak")).unwrap(),
            "SNOWFLAKE_ACCOUNT=acct\nSNOWFLAKE_PASSWORD=\"old\"\n"
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SNOWFLAKE_ACCOUNT=acct\n"));
        assert!(content.contains("SA_USER=\"SVC\"\n"));
        assert!(content.contains("SA_ROLE=\"PAT_ROLE\"\n"));
        assert_eq!(read_token(&path).unwrap().as_deref(), Some("tok\"en"));
    }

    #[test]
    fn test_store_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        assert_eq!(store_credentials(&path, "SVC", "t", "R").unwrap(), None);
        assert_eq!(read_token(&path).unwrap().as_deref(), Some("t"));
    }

    #[test]
    fn test_clear_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        assert!(!clear_token(&path).unwrap());

        std::fs::write(&path, "SNOWFLAKE_PASSWORD=\"secret\"\nSA_USER=\"SVC\"\n").unwrap();
        assert!(clear_token(&path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "SNOWFLAKE_PASSWORD=\"\"\nSA_USER=\"SVC\"\n"
        );
        assert_eq!(read_token(&path).unwrap(), None);
    }
}
