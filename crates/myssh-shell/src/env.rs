use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Search path exported to every spawned process.
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
pub const DEFAULT_HOME: &str = "/home";

/// Per-session shell environment. Each session owns its own map, including
/// the working directory (`PWD`): `cd` never touches the server process's
/// own cwd, it only rewrites this entry, and the executor applies it when
/// spawning children and resolving redirection paths.
#[derive(Debug, Clone)]
pub struct SessionEnv {
    vars: HashMap<String, String>,
}

impl SessionEnv {
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), DEFAULT_PATH.to_string());
        vars.insert("HOME".to_string(), DEFAULT_HOME.to_string());

        let pwd = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "/".to_string());
        vars.insert("PWD".to_string(), pwd);

        SessionEnv { vars }
    }

    pub fn cwd(&self) -> &str {
        self.vars.get("PWD").map(String::as_str).unwrap_or("/")
    }

    pub fn home(&self) -> &str {
        self.vars
            .get("HOME")
            .map(String::as_str)
            .unwrap_or(DEFAULT_HOME)
    }

    /// Full map, for exporting into a child's (cleared) environment.
    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Resolve a possibly relative path against the session's `PWD`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(self.cwd()).join(path)
        }
    }

    /// The `cd` built-in. With no target, go to `HOME`. On success `PWD` is
    /// replaced with the canonicalized directory; on failure nothing
    /// changes and the error carries the user-visible message.
    pub fn change_dir(&mut self, target: Option<&str>) -> Result<()> {
        let target = target.unwrap_or_else(|| self.home()).to_string();
        let resolved = self.resolve(&target);

        let canonical = std::fs::canonicalize(&resolved)
            .map_err(|_| anyhow::anyhow!("cd: No such file or directory"))?;
        if !canonical.is_dir() {
            anyhow::bail!("cd: Not a directory");
        }

        tracing::debug!("cd: {} -> {}", self.cwd(), canonical.display());
        self.vars
            .insert("PWD".to_string(), canonical.display().to_string());
        Ok(())
    }
}

impl Default for SessionEnv {
    fn default() -> Self {
        SessionEnv::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_populates_required_vars() {
        let env = SessionEnv::new();
        assert_eq!(env.vars().get("PATH").unwrap(), DEFAULT_PATH);
        assert_eq!(env.vars().get("HOME").unwrap(), DEFAULT_HOME);
        assert!(env.vars().contains_key("PWD"));
    }

    #[test]
    fn test_cd_updates_pwd() {
        let mut env = SessionEnv::new();
        env.change_dir(Some("/tmp")).unwrap();
        // /tmp may be a symlink (e.g. to /private/tmp); canonicalization is
        // what the executor will use either way.
        assert_eq!(
            env.cwd(),
            std::fs::canonicalize("/tmp").unwrap().display().to_string()
        );
    }

    #[test]
    fn test_cd_failure_leaves_pwd_unchanged() {
        let mut env = SessionEnv::new();
        let before = env.cwd().to_string();

        let err = env.change_dir(Some("/no/such/dir")).unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
        assert_eq!(env.cwd(), before);
    }

    #[test]
    fn test_cd_without_target_goes_home() {
        let mut env = SessionEnv::new();
        let result = env.change_dir(None);
        // HOME is /home, which exists on typical Linux hosts; either way the
        // outcome must be consistent with PWD.
        match result {
            Ok(()) => assert_eq!(
                env.cwd(),
                std::fs::canonicalize(DEFAULT_HOME)
                    .unwrap()
                    .display()
                    .to_string()
            ),
            Err(_) => assert_ne!(env.cwd(), DEFAULT_HOME),
        }
    }

    #[test]
    fn test_resolve_relative_against_pwd() {
        let mut env = SessionEnv::new();
        env.change_dir(Some("/tmp")).unwrap();
        let resolved = env.resolve("out.txt");
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("out.txt"));
        assert_eq!(env.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
