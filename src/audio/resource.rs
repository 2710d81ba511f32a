use std::path::{Component, Path, PathBuf};

use log::{debug, trace};

use crate::error::ResourceError;

/// A bundled audio file that exists on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Name the caller asked for
    pub name: String,
    pub path: PathBuf,
}

impl ResourceRef {
    /// Extension used as a format hint by the decoder
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

/// Maps logical track names onto files under a resource root.
///
/// Accepted forms: `book1`, `book1.mp3`, `/book1.mp3/`,
/// `Learning/Audiobooks/book1` and `Audio/Learning/Audiobooks/book1.mp3`.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    root: PathBuf,
    default_extension: String,
}

impl ResourceLocator {
    pub fn new(root: impl Into<PathBuf>, default_extension: impl Into<String>) -> Self {
        let default_extension = default_extension.into();
        Self {
            root: root.into(),
            default_extension: default_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, name: &str) -> Result<ResourceRef, ResourceError> {
        let not_found = || ResourceError::NotFound {
            name: name.to_string(),
        };

        let trimmed = name.trim().trim_matches(|c: char| c == '/' || c == '\\');
        if trimmed.is_empty() {
            return Err(not_found());
        }

        let relative = Path::new(trimmed);
        let mut subdirectory = PathBuf::new();
        let mut file_name = None;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    if let Some(previous) = file_name.replace(part) {
                        subdirectory.push(previous);
                    }
                }
                Component::CurDir => {}
                // `..`, roots and prefixes never resolve outside the resource root
                _ => {
                    debug!("Rejecting resource name '{}': escapes resource root", name);
                    return Err(not_found());
                }
            }
        }
        let file_name = Path::new(file_name.ok_or_else(not_found)?);

        let stem = file_name.file_stem().ok_or_else(not_found)?;
        let extension = file_name
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or(self.default_extension.as_str());

        let mut file = stem.to_os_string();
        file.push(".");
        file.push(extension);

        let mut candidates = vec![self.root.join(&subdirectory).join(&file)];
        if !subdirectory.as_os_str().is_empty() {
            // flattened bundle: folders were not copied, only their files
            candidates.push(self.root.join(&file));
        }

        for candidate in candidates {
            trace!("Trying resource candidate {}", candidate.display());
            if candidate.is_file() {
                return Ok(ResourceRef {
                    name: name.to_string(),
                    path: candidate,
                });
            }
        }

        Err(not_found())
    }
}
