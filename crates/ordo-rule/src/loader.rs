use crate::error::{Result, RuleError};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// 规则文件
#[derive(Debug, Clone)]
pub struct RuleFile {
    pub path: PathBuf,
    pub text: String,
}

/// 规则目录加载器
///
/// Walks a directory tree depth-first, visiting the entries of each
/// directory in lexical file-name order, and reads every regular file.
/// Symlinks are followed; a link cycle is reported as a walk error.
#[derive(Debug, Clone, Default)]
pub struct RuleLoader {
    extension: Option<String>,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only read files with this extension (without the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        match &self.extension {
            Some(ext) => path.extension().is_some_and(|e| e == ext.as_str()),
            None => true,
        }
    }

    /// Lazily reads the rule files under `root`.
    ///
    /// Files are read one at a time, so a caller that stops at the first
    /// error has already consumed every file before it.
    pub fn files<'a>(&'a self, root: &Path) -> impl Iterator<Item = Result<RuleFile>> + 'a {
        WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(RuleError::from(e))),
                };

                if !entry.file_type().is_file() || !self.accepts(entry.path()) {
                    return None;
                }

                let path = entry.into_path();
                debug!(path = %path.display(), "Reading rule file");

                Some(
                    std::fs::read_to_string(&path)
                        .map(|text| RuleFile {
                            path: path.clone(),
                            text,
                        })
                        .map_err(|source| RuleError::Load { path, source }),
                )
            })
    }
}
