//! Scratch sqlite database files that disappear with the fixture.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A not-yet-created sqlite file inside a private temp directory
pub struct TempSqlite {
    _dir: TempDir,
    path: PathBuf,
}

impl TempSqlite {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("app.db");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `sqlite:////abs/path/app.db`
    pub fn url(&self) -> String {
        format!("sqlite:///{}", self.path.display())
    }
}
