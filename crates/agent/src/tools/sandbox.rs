//! Working-directory sandbox
//!
//! Every tool resolves its user-supplied path through [`Sandbox::resolve`].
//! A path is accepted only if its normalized form stays beneath the root,
//! compared component by component, and, when part of it already exists on
//! disk, its canonical form does too (so a symlink cannot point outside).

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use super::ToolError;

/// Operation being attempted, used in rejection messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Read,
    Write,
    Execute,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Action::List => "list",
            Action::Read => "read",
            Action::Write => "write to",
            Action::Execute => "execute",
        };
        f.write_str(verb)
    }
}

/// Fixed root all tool operations are confined to
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl Sandbox {
    /// Anchor a relative root at the current directory and normalize it.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let root = normalize(&absolute);
        let canonical_root = canonicalize_missing(&root);

        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` beneath the root, or explain why it was rejected.
    pub async fn resolve(&self, path: &str, action: Action) -> Result<PathBuf, ToolError> {
        let candidate = normalize(&self.root.join(path));

        if !is_within(&candidate, &self.root) {
            warn!("rejected {} of {:?}: outside sandbox", action, path);
            return Err(self.rejection(path, action));
        }

        if let Some(existing) = self.nearest_existing(&candidate).await {
            let canonical = tokio::fs::canonicalize(&existing)
                .await
                .map_err(|e| ToolError::io(path, e))?;
            if !is_within(&canonical, &self.canonical_root) {
                warn!(
                    "rejected {} of {:?}: resolves to {:?} outside sandbox",
                    action, path, canonical
                );
                return Err(self.rejection(path, action));
            }
        }

        debug!("resolved {:?} to {:?}", path, candidate);
        Ok(candidate)
    }

    /// Deepest ancestor of `candidate` (itself included) that exists and is
    /// still lexically inside the root.
    async fn nearest_existing(&self, candidate: &Path) -> Option<PathBuf> {
        for ancestor in candidate.ancestors() {
            if !is_within(ancestor, &self.root) {
                return None;
            }
            if tokio::fs::symlink_metadata(ancestor).await.is_ok() {
                return Some(ancestor.to_path_buf());
            }
        }
        None
    }

    fn rejection(&self, path: &str, action: Action) -> ToolError {
        ToolError::OutsideSandbox {
            path: path.to_string(),
            action,
        }
    }
}

/// Canonical form of a root that may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing tail appended to it.
fn canonicalize_missing(root: &Path) -> PathBuf {
    for ancestor in root.ancestors() {
        if let Ok(canonical) = std::fs::canonicalize(ancestor) {
            return match root.strip_prefix(ancestor) {
                Ok(tail) => canonical.join(tail),
                Err(_) => canonical,
            };
        }
    }
    root.to_path_buf()
}

/// Lexical normalization: drops `.`, folds `..` into its parent. Never touches
/// the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Component-wise prefix check, so `/work-evil` is not inside `/work`
fn is_within(path: &Path, root: &Path) -> bool {
    let mut path_components = path.components();
    root.components()
        .all(|root_comp| path_components.next() == Some(root_comp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_within() {
        let root = Path::new("/home/user/work");

        assert!(is_within(Path::new("/home/user/work/file.txt"), root));
        assert!(is_within(Path::new("/home/user/work/a/b/c.py"), root));
        assert!(is_within(root, root));

        assert!(!is_within(Path::new("/home/user/work-evil/file.txt"), root));
        assert!(!is_within(Path::new("/home/user"), root));
        assert!(!is_within(Path::new("/etc/passwd"), root));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/work/./pkg/../main.py")),
            PathBuf::from("/work/main.py")
        );
        assert_eq!(normalize(Path::new("/work/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("/work/pkg/")), PathBuf::from("/work/pkg"));
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::List.to_string(), "list");
        assert_eq!(Action::Read.to_string(), "read");
        assert_eq!(Action::Write.to_string(), "write to");
        assert_eq!(Action::Execute.to_string(), "execute");
    }

    #[test]
    fn test_new_normalizes_root() {
        let sandbox = Sandbox::new("/srv/work/./calc/..").unwrap();
        assert_eq!(sandbox.root(), Path::new("/srv/work"));
    }

    #[test]
    fn test_new_anchors_relative_root() {
        let sandbox = Sandbox::new("calculator").unwrap();
        assert!(sandbox.root().is_absolute());
        assert!(sandbox.root().ends_with("calculator"));
    }

    #[tokio::test]
    async fn test_resolve_inside() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("main.py"), "print(1)").unwrap();
        let sandbox = Sandbox::new(temp_dir.path()).unwrap();

        let resolved = sandbox.resolve("main.py", Action::Read).await.unwrap();

        assert_eq!(resolved, sandbox.root().join("main.py"));
    }

    #[tokio::test]
    async fn test_resolve_nonexistent_inside_is_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(temp_dir.path()).unwrap();

        let resolved = sandbox
            .resolve("new/dir/file.txt", Action::Write)
            .await
            .unwrap();

        assert_eq!(resolved, sandbox.root().join("new/dir/file.txt"));
    }

    #[tokio::test]
    async fn test_resolve_dot_is_root() {
        let temp_dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(temp_dir.path()).unwrap();

        let resolved = sandbox.resolve(".", Action::List).await.unwrap();

        assert_eq!(resolved, sandbox.root());
    }

    #[tokio::test]
    async fn test_resolve_traversal_escape() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        fs::create_dir(&work).unwrap();
        fs::write(temp_dir.path().join("secret.txt"), "secret").unwrap();
        let sandbox = Sandbox::new(&work).unwrap();

        let err = sandbox
            .resolve("../secret.txt", Action::Read)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Cannot read \"../secret.txt\" as it is outside the permitted working directory"
        );
    }

    #[tokio::test]
    async fn test_resolve_sibling_prefix_is_outside() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        let evil = temp_dir.path().join("work-evil");
        fs::create_dir(&work).unwrap();
        fs::create_dir(&evil).unwrap();
        let sandbox = Sandbox::new(&work).unwrap();

        let result = sandbox.resolve("../work-evil/x.txt", Action::Write).await;

        assert!(matches!(result, Err(ToolError::OutsideSandbox { .. })));
    }

    #[tokio::test]
    async fn test_resolve_absolute_path_outside() {
        let temp_dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(temp_dir.path()).unwrap();

        let result = sandbox.resolve("/bin", Action::List).await;

        assert!(matches!(
            result,
            Err(ToolError::OutsideSandbox {
                action: Action::List,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_resolve_when_root_missing() {
        let temp_dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(temp_dir.path().join("not-yet")).unwrap();

        assert!(sandbox.resolve("a.txt", Action::Write).await.is_ok());
        assert!(sandbox.resolve("../a.txt", Action::Write).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_root_under_symlinked_parent() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, temp_dir.path().join("link")).unwrap();
        let sandbox = Sandbox::new(temp_dir.path().join("link").join("work")).unwrap();

        let before = sandbox.resolve("a.txt", Action::Write).await.unwrap();
        fs::create_dir_all(before.parent().unwrap()).unwrap();
        fs::write(&before, "hi").unwrap();

        let after = sandbox.resolve("a.txt", Action::Read).await.unwrap();
        assert_eq!(before, after);
        assert!(real.join("work").join("a.txt").exists());
        assert!(sandbox.resolve("../escape.txt", Action::Write).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_symlink_escape() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        let outside = temp_dir.path().join("outside");
        fs::create_dir(&work).unwrap();
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, work.join("link")).unwrap();
        let sandbox = Sandbox::new(&work).unwrap();

        let existing = sandbox.resolve("link/secret.txt", Action::Read).await;
        let fresh = sandbox.resolve("link/new.txt", Action::Write).await;

        assert!(matches!(existing, Err(ToolError::OutsideSandbox { .. })));
        assert!(matches!(fresh, Err(ToolError::OutsideSandbox { .. })));
    }
}
