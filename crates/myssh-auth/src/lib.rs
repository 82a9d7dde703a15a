use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One entry of the flat user file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
}

/// Flat JSON credential store: an array of `{"username", "password"}`
/// objects. The file is read fresh on every lookup, so edits take effect on
/// the next authentication attempt without a restart. Lookups are exact
/// string matches; no hashing.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a user's password, re-reading the store from disk.
    pub fn lookup(&self, username: &str) -> Result<Option<String>> {
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read user file {}", self.path.display()))?;
        let users: Vec<UserRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse user file {}", self.path.display()))?;

        tracing::debug!("Loaded {} user records from {}", users.len(), self.path.display());

        Ok(users
            .into_iter()
            .find(|user| user.username == username)
            .map(|user| user.password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(records: &str) -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(records.as_bytes()).unwrap();
        (dir, CredentialStore::new(path))
    }

    #[test]
    fn test_lookup_finds_matching_user() {
        let (_dir, store) = store_with(
            r#"[
                {"username": "alice", "password": "secret"},
                {"username": "bob", "password": "hunter2"}
            ]"#,
        );

        assert_eq!(store.lookup("alice").unwrap(), Some("secret".to_string()));
        assert_eq!(store.lookup("bob").unwrap(), Some("hunter2".to_string()));
        assert_eq!(store.lookup("mallory").unwrap(), None);
    }

    #[test]
    fn test_lookup_rereads_file_each_call() {
        let (dir, store) = store_with(r#"[{"username": "alice", "password": "old"}]"#);

        assert_eq!(store.lookup("alice").unwrap(), Some("old".to_string()));

        std::fs::write(
            dir.path().join("users.json"),
            r#"[{"username": "alice", "password": "new"}]"#,
        )
        .unwrap();

        assert_eq!(store.lookup("alice").unwrap(), Some("new".to_string()));
    }

    #[test]
    fn test_missing_or_malformed_file_is_an_error() {
        let store = CredentialStore::new("/no/such/users.json");
        assert!(store.lookup("alice").is_err());

        let (_dir, store) = store_with("not json at all");
        assert!(store.lookup("alice").is_err());
    }
}
