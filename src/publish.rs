//! Publishing build output and discarding cached state.
//!
//! After the executor finishes, the generator's output directory is copied
//! to the publish directory (typically `docs/` for GitHub Pages):
//!
//! ```text
//! .next-build/**   ─┐
//!                   ├─▶  docs/**   (replaced wholesale)  ─▶  `after` command
//! public/**        ─┘    static files merged on top
//! ```
//!
//! [`clean`] is the coarse cancellation path: it removes the manifest cache,
//! the build output, and the generator's own caches so the next run starts
//! from scratch.

use crate::config::{BuildConfig, PublishConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Build output directory not found: {0}")]
    MissingBuildDir(PathBuf),
    #[error("IO error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed to start post-publish command `{program}`: {source}")]
    AfterSpawn { program: String, source: io::Error },
    #[error("Post-publish command `{program}` exited with {status}")]
    AfterFailed { program: String, status: ExitStatus },
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> PublishError + '_ {
    move |source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What a publish copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Files copied from the build output.
    pub build_files: usize,
    /// Files copied from static directories.
    pub static_files: usize,
}

/// Replace `publish_dir` with the build output plus static files, then run
/// the `after` command.
pub fn publish(config: &PublishConfig) -> Result<PublishReport, PublishError> {
    if !config.build_dir.is_dir() {
        return Err(PublishError::MissingBuildDir(config.build_dir.clone()));
    }

    remove_dir_if_exists(&config.publish_dir)?;
    std::fs::create_dir_all(&config.publish_dir).map_err(io_at(&config.publish_dir))?;

    let build_files = copy_tree(&config.build_dir, &config.publish_dir)?;
    let mut static_files = 0;
    for dir in &config.static_dirs {
        if dir.is_dir() {
            static_files += copy_tree(dir, &config.publish_dir)?;
        } else {
            tracing::debug!(dir = %dir.display(), "static directory missing, skipped");
        }
    }
    tracing::info!(
        publish_dir = %config.publish_dir.display(),
        build_files,
        static_files,
        "published"
    );

    if let Some((program, args)) = config.after.split_first() {
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| PublishError::AfterSpawn {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(PublishError::AfterFailed {
                program: program.clone(),
                status,
            });
        }
    }

    Ok(PublishReport {
        build_files,
        static_files,
    })
}

/// Copy every file under `src` to the same relative path under `dst`,
/// overwriting existing files. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize, PublishError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_at(&target))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(io_at(entry.path()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove all cached build state. Missing directories are not errors.
///
/// Returns the directories that were actually removed.
pub fn clean(config: &BuildConfig) -> Result<Vec<PathBuf>, PublishError> {
    let mut targets = vec![config.cache_dir.clone(), config.publish.build_dir.clone()];
    targets.extend(config.executor.cache_dirs.iter().cloned());

    let mut removed = Vec::new();
    for dir in targets {
        if dir.as_os_str().is_empty() {
            continue;
        }
        if remove_dir_if_exists(&dir)? {
            tracing::info!(dir = %dir.display(), "removed");
            removed.push(dir);
        }
    }
    Ok(removed)
}

fn remove_dir_if_exists(dir: &Path) -> Result<bool, PublishError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_at(dir)(err)),
    }
}
