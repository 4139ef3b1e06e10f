use std::path::{Path, PathBuf};

use crate::UploadError;

/// Maps client supplied file names onto paths inside the storage root.
///
/// The name is treated as a bare file name: everything up to the last `/` or `\`
/// is discarded, so `../../etc/passwd` lands on `<root>/passwd`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the bare name that `raw` stands for.
    pub fn file_name<'a>(&self, raw: &'a str) -> Result<&'a str, UploadError> {
        let name = raw
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .ok_or_else(|| UploadError::InvalidName(raw.to_string()))?;

        if name == "." || name == ".." || name.contains('\0') {
            return Err(UploadError::InvalidName(raw.to_string()));
        }

        Ok(name)
    }

    /// Resolves `raw` to its destination path.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, UploadError> {
        let name = self.file_name(raw)?;

        Ok(self.root.join(name))
    }
}
