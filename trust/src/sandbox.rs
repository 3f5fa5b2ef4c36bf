//! Sandbox Path Guard.
//!
//! Resolves a caller-supplied path against a session working directory and a
//! sandbox root, rejecting traversal outside the root, rejecting paths that
//! match a fixed blocklist of credential/secret locations, and rejecting any
//! resolved path whose ancestor chain contains a symlink.
//!
//! The sensitive-pattern table is adapted from the mandatory-deny constant
//! groups (shell/git/IDE/package-manager configs, security files, agent
//! configs) used to gate filesystem access in sandboxed skill execution,
//! generalized here into the flat substring blocklist this guard's contract
//! calls for.

use crate::error::TrustError;
use std::path::{Path, PathBuf};

/// Result of resolving a path against a sandbox root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxResolution {
    pub resolved_absolute: PathBuf,
    pub relative_to_root: PathBuf,
}

/// Unicode space characters normalized to ASCII space before resolution,
/// defeating homoglyph-based bypass of the traversal/sensitive-path checks.
const UNICODE_SPACES: &[char] = &[
    '\u{00A0}', '\u{2000}', '\u{2001}', '\u{2002}', '\u{2003}', '\u{2004}', '\u{2005}', '\u{2006}',
    '\u{2007}', '\u{2008}', '\u{2009}', '\u{200A}', '\u{202F}', '\u{205F}', '\u{3000}',
];

/// Substrings checked against the lowercased resolved absolute path. Any
/// match raises `SensitivePath`. This table is closed: adding an entry
/// changes the guard's observable behavior and must be reflected in tests.
const SENSITIVE_SUBSTRINGS: &[&str] = &[
    // SSH
    "/.ssh/",
    // cloud credentials
    "/.aws/credentials",
    "/.aws/config",
    "/.config/gcloud/application_default_credentials.json",
    "/.azure/",
    // kubernetes
    "/.kube/config",
    // gnupg
    "/.gnupg/",
    // password stores
    "/.password-store/",
    "/.config/gopass/",
    // shell history
    "/.bash_history",
    "/.zsh_history",
    "/.histfile",
    // npm / git / docker credentials
    "/.npmrc",
    "/.git-credentials",
    "/.netrc",
    "/.docker/config.json",
    // this product's own config/auth files
    "/.wardline/",
    "/.clawdbot/",
];

fn is_sensitive(absolute_lower: &str) -> bool {
    if SENSITIVE_SUBSTRINGS.iter().any(|p| absolute_lower.contains(p)) {
        return true;
    }
    // .env / .env.local / .env.production, any directory depth.
    absolute_lower
        .rsplit('/')
        .next()
        .map(|basename| basename.starts_with(".env"))
        .unwrap_or(false)
}

fn normalize_unicode_spaces(input: &str) -> String {
    input
        .chars()
        .map(|c| if UNICODE_SPACES.contains(&c) { ' ' } else { c })
        .collect()
}

fn expand_tilde(input: &str, home_dir: &Path) -> PathBuf {
    if input == "~" {
        return home_dir.to_path_buf();
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return home_dir.join(rest);
    }
    PathBuf::from(input)
}

/// Walk the ancestor chain of `path` (which need not exist in full) and
/// reject if any existing component is a symlink. A missing component
/// terminates the scan without error — writes to new files must be possible.
fn has_symlink_ancestor(path: &Path) -> bool {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) => {
                if meta.file_type().is_symlink() {
                    return true;
                }
            }
            Err(_) => return false,
        }
    }
    false
}

/// Resolve `file_path` against `cwd` (for relative paths) and validate it
/// sits inside `root`, matches no sensitive pattern, and contains no symlink
/// along its resolved ancestor chain.
pub fn resolve_sandbox_path(
    file_path: &str,
    cwd: &Path,
    root: &Path,
) -> Result<SandboxResolution, TrustError> {
    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    let normalized = normalize_unicode_spaces(file_path);
    let expanded = expand_tilde(&normalized, &home_dir);

    let unresolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    let resolved_absolute = lexically_normalize(&unresolved);

    let root_absolute = lexically_normalize(&if root.is_absolute() {
        root.to_path_buf()
    } else {
        cwd.join(root)
    });

    let relative_to_root = resolved_absolute
        .strip_prefix(&root_absolute)
        .map_err(|_| TrustError::PathEscapesSandbox)?
        .to_path_buf();

    if relative_to_root
        .components()
        .next()
        .map(|c| c.as_os_str() == "..")
        .unwrap_or(false)
    {
        return Err(TrustError::PathEscapesSandbox);
    }

    let absolute_lower = resolved_absolute.to_string_lossy().to_lowercase();
    if is_sensitive(&absolute_lower) {
        return Err(TrustError::SensitivePath);
    }

    if has_symlink_ancestor(&resolved_absolute) {
        return Err(TrustError::SymlinkForbidden);
    }

    Ok(SandboxResolution {
        resolved_absolute,
        relative_to_root,
    })
}

/// Lexical path normalization (`.`/`..` resolution without touching the
/// filesystem) so non-existent leaves resolve cleanly.
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_outside_root() {
        let cwd = PathBuf::from("/workspace/session");
        let root = PathBuf::from("/workspace/session");
        let err = resolve_sandbox_path("../../etc/passwd", &cwd, &root).unwrap_err();
        assert_eq!(err, TrustError::PathEscapesSandbox);
    }

    #[test]
    fn allows_path_inside_root() {
        let cwd = PathBuf::from("/workspace/session");
        let root = PathBuf::from("/workspace/session");
        let res = resolve_sandbox_path("notes/todo.md", &cwd, &root).unwrap();
        assert_eq!(res.resolved_absolute, PathBuf::from("/workspace/session/notes/todo.md"));
        assert_eq!(res.relative_to_root, PathBuf::from("notes/todo.md"));
    }

    #[test]
    fn rejects_ssh_key_via_tilde() {
        let cwd = PathBuf::from("/tmp");
        let root = PathBuf::from("/");
        let err = resolve_sandbox_path("~/.ssh/id_rsa", &cwd, &root).unwrap_err();
        assert_eq!(err, TrustError::SensitivePath);
    }

    #[test]
    fn rejects_dotenv_files() {
        let cwd = PathBuf::from("/workspace/session");
        let root = PathBuf::from("/workspace/session");
        let err = resolve_sandbox_path(".env.production", &cwd, &root).unwrap_err();
        assert_eq!(err, TrustError::SensitivePath);
    }

    #[test]
    fn normalizes_unicode_space_homoglyph() {
        let cwd = PathBuf::from("/workspace/session");
        let root = PathBuf::from("/workspace/session");
        // U+00A0 NBSP inside an otherwise-normal relative path.
        let input = "notes/todo\u{00A0}.md";
        let res = resolve_sandbox_path(input, &cwd, &root).unwrap();
        assert_eq!(res.relative_to_root, PathBuf::from("notes/todo .md"));
    }

    #[test]
    fn rejects_symlink_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let real_dir = root.join("real");
        std::fs::create_dir(&real_dir).unwrap();
        let link = root.join("link");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&real_dir, &link).unwrap();
        #[cfg(unix)]
        {
            let err = resolve_sandbox_path("link/file.txt", &root, &root).unwrap_err();
            assert_eq!(err, TrustError::SymlinkForbidden);
        }
    }
}
