//! Local-directory implementation of the `FileSource` port.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use crate::application::ports::FileSource;
use crate::domain::instance::InstanceDockerFile;

/// Reads project files below a fixed root directory.
///
/// Returned paths are relative to the root, use `/` separators, and never
/// start with `./`.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_sync(root: &Path, path: &str) -> Result<Vec<InstanceDockerFile>> {
        let relative = normalize(path)?;
        let full = if relative.is_empty() {
            root.to_path_buf()
        } else {
            root.join(&relative)
        };
        let metadata = std::fs::metadata(&full)
            .with_context(|| format!("cannot access {}", full.display()))?;

        if metadata.is_file() {
            let contents =
                std::fs::read(&full).with_context(|| format!("reading {}", full.display()))?;
            return Ok(vec![InstanceDockerFile::new(relative, contents)]);
        }

        let mut files = Vec::new();
        collect_dir(&full, &relative, &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

#[async_trait]
impl FileSource for LocalDirSource {
    async fn read(&self, path: &str) -> Result<Vec<InstanceDockerFile>> {
        let root = self.root.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || Self::read_sync(&root, &path))
            .await
            .context("file read task panicked")?
    }
}

fn collect_dir(dir: &Path, relative: &str, out: &mut Vec<InstanceDockerFile>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            bail!("non UTF-8 file name in {}", dir.display());
        };
        let child = if relative.is_empty() {
            name.to_string()
        } else {
            format!("{relative}/{name}")
        };
        let file_type = entry
            .file_type()
            .with_context(|| format!("inspecting {}", entry.path().display()))?;
        if file_type.is_dir() {
            collect_dir(&entry.path(), &child, out)?;
        } else if file_type.is_file() {
            let contents = std::fs::read(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            out.push(InstanceDockerFile::new(child, contents));
        }
    }
    Ok(())
}

/// Canonical `/`-joined form of a project-relative path. The project root
/// itself (`.`) normalizes to the empty string.
fn normalize(path: &str) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => bail!("{path} is not valid UTF-8"),
            },
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("{path} points outside the project directory");
            }
        }
    }
    Ok(parts.join("/"))
}
