//! Direct (native) launch strategy

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

use crate::launch::error::{LaunchError, Result};
use crate::launch::{GameProcess, LaunchStrategy};

/// Starts the game executable natively. Used on Windows hosts.
pub struct DirectLaunch {
    executable: String,
}

impl DirectLaunch {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

#[async_trait]
impl LaunchStrategy for DirectLaunch {
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
        let exe = self.executable_path(game_dir);
        info!("launching {} directly", exe.display());

        let mut command = Command::new(&exe);
        command.current_dir(game_dir).args(args);
        for (key, value) in env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| LaunchError::Spawn {
            program: exe,
            source: e,
        })?;
        Ok(GameProcess::new(child))
    }
}
