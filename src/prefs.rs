//! 界面偏好：深色模式开关，持久化为 TOML 文件
//!
//! 文件不存在时使用默认值（浅色）；保存时自动创建父目录。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid preferences file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to encode preferences: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub dark_mode: bool,
}

/// 绑定到文件路径的偏好存储
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
    current: Preferences,
}

impl PrefsStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let current = read_prefs(&path)?;
        Ok(Self { path, current })
    }

    /// 读取失败时记录警告并回退默认值
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = read_prefs(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "preferences unreadable, using defaults");
            Preferences::default()
        });
        Self { path, current }
    }

    pub fn get(&self) -> &Preferences {
        &self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string(&self.current)?)?;
        Ok(())
    }

    /// 切换深色模式并立即保存，返回新值
    pub fn toggle_dark_mode(&mut self) -> Result<bool, PrefsError> {
        self.current.dark_mode = !self.current.dark_mode;
        self.save()?;
        Ok(self.current.dark_mode)
    }
}

fn read_prefs(path: &Path) -> Result<Preferences, PrefsError> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(toml::from_str(&s)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_defaults_to_light() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::load(dir.path().join("prefs.toml")).unwrap();
        assert!(!store.get().dark_mode);
    }

    #[test]
    fn test_toggle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.toml");
        let mut store = PrefsStore::load(&path).unwrap();
        assert!(store.toggle_dark_mode().unwrap());

        let reloaded = PrefsStore::load(&path).unwrap();
        assert!(reloaded.get().dark_mode);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "dark_mode = true");
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "dark_mode = \"maybe\"").unwrap();
        assert!(matches!(PrefsStore::load(&path), Err(PrefsError::Parse(_))));
        assert_eq!(PrefsStore::load_or_default(&path).get(), &Preferences::default());
    }
}
