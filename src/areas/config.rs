//! Repository configuration
//!
//! `.source/config` is a flat text file of `key = value` lines. The core
//! consults `user.name` and `user.email` for commit authorship when the
//! `GIT_AUTHOR_NAME` / `GIT_AUTHOR_EMAIL` environment is not set.

use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug)]
pub struct Config {
    path: Box<Path>,
}

impl Config {
    pub fn new(path: Box<Path>) -> Self {
        Config { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("unable to read config at {}", self.path.display()))?;

        let mut values = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Ok(values)
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());

        let mut content = String::new();
        for (key, value) in &values {
            content.push_str(&format!("{} = {}\n", key, value));
        }

        std::fs::write(&self.path, content)
            .with_context(|| format!("unable to write config at {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_then_get() {
        let temp = TempDir::new().unwrap();
        let config = Config::new(temp.path().join("config").into_boxed_path());

        config.set("user.name", "T").unwrap();
        config.set("user.email", "t@x").unwrap();

        assert_eq!(config.get("user.name").unwrap(), Some("T".to_string()));
        assert_eq!(config.get("user.email").unwrap(), Some("t@x".to_string()));
        assert_eq!(config.get("core.missing").unwrap(), None);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let temp = TempDir::new().unwrap();
        let config = Config::new(temp.path().join("config").into_boxed_path());

        assert_eq!(config.get("user.name").unwrap(), None);
    }
}
