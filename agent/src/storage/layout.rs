//! On-disk layout of the deployed sites

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::models::deployment::{DeployType, DeploymentRequest};

/// Where site and blog checkouts live
#[derive(Debug, Clone)]
pub struct SiteLayout {
    /// Root directory every site checkout is beneath
    pub root_dir: PathBuf,

    /// Root directory for blog checkouts
    pub blogs_root_dir: PathBuf,
}

impl SiteLayout {
    /// Create a new site layout
    pub fn new(root_dir: impl Into<PathBuf>, blogs_root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            blogs_root_dir: blogs_root_dir.into(),
        }
    }

    /// Root as a string without a trailing separator
    pub fn root_str(&self) -> String {
        let root = self.root_dir.to_string_lossy();
        match root.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        }
    }

    /// Join a target directory onto the root without normalizing it.
    ///
    /// An absolute target replaces the root, as routed svn targets are
    /// configured with full paths.
    pub fn join_target(&self, target_dir: &str) -> String {
        if target_dir.starts_with('/') {
            target_dir.to_string()
        } else {
            let root = self.root_str();
            if root.ends_with('/') {
                format!("{root}{target_dir}")
            } else {
                format!("{root}/{target_dir}")
            }
        }
    }

    /// Whether `path` lies strictly beneath the deployment root
    pub fn contains(&self, path: &str) -> bool {
        let root = self.root_str();
        let prefix = if root.ends_with('/') {
            root
        } else {
            format!("{root}/")
        };
        path.len() > prefix.len() && path.starts_with(&prefix)
    }

    /// First directory of `path` beneath the root, if it is beneath it
    pub fn site_dir_of<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !self.contains(path) {
            return None;
        }
        let rest = &path[self.root_str().len()..];
        rest.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty())
    }

    /// Checkout directory for a request
    pub fn checkout_dir(&self, request: &DeploymentRequest) -> Dir {
        match request.deploy_type {
            DeployType::Blog => {
                let name = request.target_dir.strip_suffix(".blog").unwrap_or(&request.target_dir);
                Dir::new(self.blogs_root_dir.join(name))
            }
            _ => Dir::new(PathBuf::from(self.join_target(&request.target_dir))),
        }
    }
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self::new("/www", "/www/blogs")
    }
}

/// Lexically normalize an absolute path: collapse repeated separators, drop
/// `.` segments and resolve `..` against the preceding segment.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
