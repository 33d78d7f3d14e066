use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// One catalog source document: a markdown file on disk or inline text
/// (tests, embedded catalogs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    name: String,
    kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Path(PathBuf),
    Text(String),
}

impl Source {
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.to_string_lossy().replace('\\', "/");
        Self {
            name,
            kind: SourceKind::Path(path),
        }
    }

    #[must_use]
    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Text(text.into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }
}

/// Discover catalog documents under a root directory.
///
/// Walks the tree for `.md` files, skipping hidden directories and files too
/// large to be hand-written catalogs. Results are sorted by path so loads
/// are deterministic.
#[must_use]
pub fn discover(root: impl AsRef<Path>) -> Vec<Source> {
    let mut paths: Vec<PathBuf> = Vec::new();

    for result in WalkDir::new(root.as_ref()).follow_links(false) {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Failed to read entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_hidden(path, root.as_ref()) {
            continue;
        }
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            if meta.len() > MAX_FILE_SIZE_BYTES {
                log::debug!(
                    "Skipping large file {} ({} bytes > {})",
                    path.display(),
                    meta.len(),
                    MAX_FILE_SIZE_BYTES
                );
                continue;
            }
        }
        paths.push(path.to_path_buf());
    }

    paths.sort();
    log::info!("Found {} catalog documents", paths.len());
    paths.into_iter().map(Source::path).collect()
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|component| {
        matches!(component, std::path::Component::Normal(name)
            if name.to_string_lossy().starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discovers_markdown_sorted_and_skips_noise() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("stacks")).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join("stacks").join("docker.md"), "# docker").unwrap();
        fs::write(temp.path().join("cmake.md"), "# cmake").unwrap();
        fs::write(temp.path().join("notes.txt"), "not a catalog").unwrap();
        fs::write(temp.path().join(".git").join("hidden.md"), "# nope").unwrap();

        let sources = discover(temp.path());
        let names: Vec<&str> = sources
            .iter()
            .map(|s| {
                s.name()
                    .rsplit('/')
                    .next()
                    .expect("file name")
            })
            .collect();
        assert_eq!(names, vec!["cmake.md", "docker.md"]);
    }

    #[test]
    fn skips_oversized_documents() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.md"), vec![b'x'; 2 * 1024 * 1024]).unwrap();
        fs::write(temp.path().join("small.md"), "# ok").unwrap();

        let sources = discover(temp.path());
        assert_eq!(sources.len(), 1);
        assert!(sources[0].name().ends_with("small.md"));
    }

    #[test]
    fn inline_sources_carry_their_name() {
        let source = Source::inline("embedded.md", "## HC-GIT-001: x");
        assert_eq!(source.name(), "embedded.md");
        assert!(matches!(source.kind(), SourceKind::Text(_)));
    }
}
