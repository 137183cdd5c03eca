//! Shim (compatibility layer) launch strategy
//!
//! Runs the Windows game binary through a Wine-style shim on non-Windows
//! hosts. The shim keeps its state in a prefix directory that is created
//! and initialized on first use.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::launch::error::{LaunchError, Result};
use crate::launch::{GameProcess, LaunchStrategy};

pub struct ShimLaunch {
    shim_binary: PathBuf,
    prefix: PathBuf,
    executable: String,
}

impl ShimLaunch {
    pub fn new(shim_binary: PathBuf, prefix: PathBuf, executable: impl Into<String>) -> Self {
        Self {
            shim_binary,
            prefix,
            executable: executable.into(),
        }
    }

    /// Create and initialize the prefix environment on first use.
    async fn ensure_prefix(&self) -> Result<()> {
        if self.prefix.join("system.reg").is_file() {
            return Ok(());
        }
        info!("initializing shim prefix at {}", self.prefix.display());
        fs::create_dir_all(&self.prefix)
            .await
            .map_err(|e| LaunchError::Io {
                path: self.prefix.clone(),
                source: e,
            })?;

        let status = Command::new(&self.shim_binary)
            .arg("wineboot")
            .arg("--init")
            .env("WINEPREFIX", &self.prefix)
            .status()
            .await
            .map_err(|e| LaunchError::Spawn {
                program: self.shim_binary.clone(),
                source: e,
            })?;
        if !status.success() {
            return Err(LaunchError::ProcessLifecycle {
                detail: format!("prefix initialization exited with {}", status),
            });
        }
        debug!("prefix initialized");
        Ok(())
    }
}

#[async_trait]
impl LaunchStrategy for ShimLaunch {
    fn executable_path(&self, game_dir: &Path) -> PathBuf {
        game_dir.join(&self.executable)
    }

    fn validate_path(&self, game_dir: &Path) -> Result<()> {
        let exe = self.executable_path(game_dir);
        if exe.is_file() {
            Ok(())
        } else {
            Err(LaunchError::ExecutableNotFound(exe))
        }
    }

    async fn launch(
        &self,
        game_dir: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<GameProcess> {
        self.validate_path(game_dir)?;
        self.ensure_prefix().await?;

        let exe = self.executable_path(game_dir);
        info!("launching {} through {}", exe.display(), self.shim_binary.display());

        let mut command = Command::new(&self.shim_binary);
        command
            .arg(&exe)
            .args(args)
            .current_dir(game_dir)
            .env("WINEPREFIX", &self.prefix);
        for (key, value) in env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| LaunchError::Spawn {
            program: self.shim_binary.clone(),
            source: e,
        })?;
        Ok(GameProcess::new(child))
    }
}
