//! git and svn primitives behind a trait so the engine can be driven without
//! real repositories

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::deploy::process::run_command;
use crate::errors::SyncError;

/// What a git working copy tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOrigin {
    pub url: String,
    pub branch: String,
}

/// Version-control operations used by the reconciliation engine
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone only `branch` of `source` into `path`
    async fn clone_branch(&self, source: &str, branch: &str, path: &Path) -> Result<(), SyncError>;

    /// Fetch `branch` from origin and force the working tree onto it
    async fn fetch_and_reset(&self, path: &Path, branch: &str) -> Result<(), SyncError>;

    /// Read the origin URL and checked-out branch of a git working copy
    async fn inspect(&self, path: &Path) -> Result<GitOrigin, SyncError>;

    /// Bring an svn working copy up to date
    async fn svn_update(&self, path: &Path) -> Result<(), SyncError>;
}

/// [`Vcs`] backed by the git and svn command line clients
#[derive(Debug, Clone)]
pub struct CommandVcs {
    git_cmd: PathBuf,
    svn_cmd: PathBuf,
    timeout: Duration,
}

impl CommandVcs {
    pub fn new(git_cmd: impl Into<PathBuf>, svn_cmd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            git_cmd: git_cmd.into(),
            svn_cmd: svn_cmd.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Vcs for CommandVcs {
    async fn clone_branch(&self, source: &str, branch: &str, path: &Path) -> Result<(), SyncError> {
        info!("Checking out {} ({}) as {}...", source, branch, path.display());
        let args = [
            OsStr::new("clone"),
            OsStr::new("-b"),
            OsStr::new(branch),
            OsStr::new("--single-branch"),
            OsStr::new(source),
            path.as_os_str(),
        ];
        run_command(&self.git_cmd, args, None, self.timeout).await?;
        info!("Checkout of {} worked", path.display());
        Ok(())
    }

    async fn fetch_and_reset(&self, path: &Path, branch: &str) -> Result<(), SyncError> {
        run_command(&self.git_cmd, ["fetch", "origin", branch], Some(path), self.timeout).await?;
        info!("Successfully completed `git fetch` into {}", path.display());

        let remote_ref = format!("origin/{branch}");
        info!(
            "Refreshing content in {} with: git reset --hard {}",
            path.display(),
            remote_ref
        );
        run_command(
            &self.git_cmd,
            ["reset", "--hard", remote_ref.as_str()],
            Some(path),
            self.timeout,
        )
        .await?;
        info!("{} was successfully updated", path.display());
        Ok(())
    }

    async fn inspect(&self, path: &Path) -> Result<GitOrigin, SyncError> {
        let url = run_command(
            &self.git_cmd,
            ["config", "--get", "remote.origin.url"],
            Some(path),
            self.timeout,
        )
        .await?;
        let branch = run_command(
            &self.git_cmd,
            ["symbolic-ref", "--short", "HEAD"],
            Some(path),
            self.timeout,
        )
        .await?;
        Ok(GitOrigin { url, branch })
    }

    async fn svn_update(&self, path: &Path) -> Result<(), SyncError> {
        run_command(&self.svn_cmd, ["up"], Some(path), self.timeout).await?;
        info!("Successfully completed `svn up` into {}", path.display());
        Ok(())
    }
}
