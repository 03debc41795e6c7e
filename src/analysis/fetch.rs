//! "Fetch project files": shallow git clone plus a filesystem walk.
//!
//! The clone goes to a throwaway directory under the system temp dir, which
//! is removed again on every path out of `fetch_repository`.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use uuid::Uuid;

use crate::types::{AppError, AppResult};

/// Most files are sampled by prefix only; full contents never leave disk.
const READ_CAP: usize = 3000;
const SECRET_READ_CAP: usize = 5000;
const MAX_FILES: usize = 30;

const SECRET_PATTERNS: &[&str] = &[
    "*.key",
    "*.pem",
    "*.p12",
    "*.pfx",
    ".env",
    ".env.*",
    "secrets.*",
    "id_rsa",
    "id_dsa",
    "*.keystore",
    "credentials.json",
    "service-account.json",
];

const CODE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".php", ".go", ".rs", ".java", ".cpp", ".c", ".rb",
];

#[derive(Debug, Clone)]
pub struct FileSample {
    /// Path relative to the repository root.
    pub path: String,
    /// Capped prefix of the file contents.
    pub content: String,
    pub size: u64,
    pub is_secret: bool,
}

/// What to keep from the cloned tree.
#[derive(Debug, Clone)]
pub enum FileFilter {
    /// User-supplied comma-separated patterns (`*.py,*.js,...`), smallest
    /// files first.
    Patterns(Vec<String>),
    /// Security scan: secret-looking files first, then code files.
    Security,
}

impl FileFilter {
    pub fn from_patterns(patterns: &str) -> Self {
        FileFilter::Patterns(
            patterns
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }
}

/// Match a file name against a single `*`-wildcard pattern. Supports the
/// shapes used here: `*.py`, `.env.*`, `secrets.*`, exact names.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return name == pattern;
    }

    let mut rest = name;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

fn is_secret_file(name: &str) -> bool {
    SECRET_PATTERNS.iter().any(|p| matches_pattern(name, p))
}

fn is_code_file(name: &str) -> bool {
    CODE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Shallow-clone `repo_url` and collect file samples per `filter`.
pub async fn fetch_repository(
    repo_url: &str,
    branch: &str,
    filter: FileFilter,
) -> AppResult<Vec<FileSample>> {
    let temp_dir = std::env::temp_dir().join(format!("docudecipher-{}", Uuid::new_v4().simple()));

    let result = clone_and_collect(repo_url, branch, &temp_dir, filter).await;

    // Cleanup in all paths; the clone may have partially succeeded.
    let _ = tokio::fs::remove_dir_all(&temp_dir).await;

    result
}

async fn clone_and_collect(
    repo_url: &str,
    branch: &str,
    temp_dir: &Path,
    filter: FileFilter,
) -> AppResult<Vec<FileSample>> {
    let output = Command::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--branch")
        .arg(branch)
        .arg(repo_url)
        .arg(temp_dir)
        .output()
        .await
        .map_err(|e| AppError::Internal(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(repo_url = %repo_url, "git clone failed: {}", stderr.trim());
        return Err(AppError::Validation(
            "Failed to clone repository. Check URL and visibility.".to_string(),
        ));
    }

    let root = temp_dir.to_path_buf();
    let mut files = tokio::task::spawn_blocking(move || collect_files(&root, &filter))
        .await
        .map_err(|e| AppError::Internal(format!("file walk panicked: {e}")))??;

    if files.is_empty() {
        return Err(AppError::Validation(
            "No matching files found in the repository.".to_string(),
        ));
    }

    files.truncate(MAX_FILES);
    Ok(files)
}

fn collect_files(root: &PathBuf, filter: &FileFilter) -> AppResult<Vec<FileSample>> {
    let mut files = Vec::new();
    walk(root, root, filter, &mut files);

    match filter {
        // Smallest first keeps many small entry points over one huge bundle
        FileFilter::Patterns(_) => files.sort_by_key(|f| f.size),
        FileFilter::Security => {
            files.sort_by_key(|f| (!f.is_secret, f.size));
        }
    }
    Ok(files)
}

fn walk(root: &Path, dir: &Path, filter: &FileFilter, files: &mut Vec<FileSample>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        // Never follow symlinks: a link cycle would duplicate the whole
        // tree, and a link out of the clone would pull host files into
        // the prompt.
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            if name == ".git" {
                continue;
            }
            walk(root, &path, filter, files);
            continue;
        }

        let (wanted, is_secret) = match filter {
            FileFilter::Patterns(patterns) => {
                (patterns.iter().any(|p| matches_pattern(&name, p)), false)
            }
            FileFilter::Security => {
                let secret = is_secret_file(&name);
                (secret || is_code_file(&name), secret)
            }
        };
        if !wanted {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let cap = if is_secret { SECRET_READ_CAP } else { READ_CAP };
        let content = match fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                crate::analysis::prompts::truncate(&text, cap).to_string()
            }
            Err(_) => continue,
        };

        let rel_path = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        files.push(FileSample {
            path: rel_path,
            content,
            size,
            is_secret,
        });
    }
}
