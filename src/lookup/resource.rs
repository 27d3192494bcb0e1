use std::path::{Component, Path, PathBuf};

use crate::errors::{Error, Result};

/// Loads resources referenced from a compose file, `env_file` entries and
/// build contexts mostly. Paths resolve relative to the referencing file.
pub trait ResourceLookup: Send + Sync {
    fn lookup(&self, path: &str, relative_to: &str) -> Result<(Vec<u8>, String)>;
}

/// Plain filesystem lookup.
pub struct FileResourceLookup;

impl ResourceLookup for FileResourceLookup {
    fn lookup(&self, path: &str, relative_to: &str) -> Result<(Vec<u8>, String)> {
        let resolved = resolve_path(path, relative_to);

        let contents = std::fs::read(&resolved).map_err(|err| Error::ResourceLookup {
            path: resolved.display().to_string(),
            file: relative_to.to_string(),
            reason: err.to_string(),
        })?;

        Ok((contents, resolved.display().to_string()))
    }
}

pub fn resolve_path(path: &str, relative_to: &str) -> PathBuf {
    let path = Path::new(path);

    if path.is_absolute() {
        return path.to_path_buf();
    }

    let base = Path::new(relative_to).parent().unwrap_or(Path::new(""));

    join_clean(base, path)
}

/// Join and fold `.`/`..` components without touching the filesystem.
pub fn join_clean(base: &Path, relative: &Path) -> PathBuf {
    let mut joined = base.to_path_buf();

    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                joined.pop();
            }
            other => joined.push(other),
        }
    }

    joined
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_resolve_relative_to_file() {
        assert_eq!(
            resolve_path("vars.env", "a/b/compose.yml"),
            PathBuf::from("a/b/vars.env")
        );
        assert_eq!(
            resolve_path("./sub/vars.env", "a/b/compose.yml"),
            PathBuf::from("a/b/sub/vars.env")
        );
        assert_eq!(
            resolve_path("../vars.env", "a/b/compose.yml"),
            PathBuf::from("a/vars.env")
        );
    }
}
