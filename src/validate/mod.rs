//! Broken link/image checker for generated Markdown.
//!
//! Every `*.md` under the docs directory is scanned for references (Markdown
//! links and images, `<img src>` from galleries, and frontmatter redirects).
//! Each local reference is resolved against its document's directory:
//! - outside the root: error, whether or not the file exists
//! - missing in every letter case: error (optionally a warning for page links)
//! - present only under another letter case: warning

mod finding;

pub use finding::{Finding, FindingKind, RefKind, Report, Severity};

use std::error::Error;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::config::ValidateOptions;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)!\[[^\]]*\]\((.+?\.(?:png|jpg|jpeg|gif|svg|webp|mp4))\)").unwrap()
});

// image syntax shares the `[..](..)` shape; `!`-prefixed matches are dropped
// in `extract_references`.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]\(([^)]+)\)").unwrap());

static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\s[^>]*?\bsrc\s*=\s*"([^"]*)""#).unwrap());

const IGNORED_PREFIXES: [&str; 5] = ["#", "?", "http://", "https://", "mailto:"];

/// A reference found in a document, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: RefKind,
    pub target: String,
}

/// All references in a document, in the order they are checked: images,
/// links, `<img>` tags, then the redirect target.
pub fn extract_references(text: &str) -> Vec<Reference> {
    let mut out = Vec::new();

    for caps in IMAGE_RE.captures_iter(text) {
        out.push(Reference {
            kind: RefKind::Image,
            target: caps[1].trim().to_string(),
        });
    }

    for caps in LINK_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if text[..whole.start()].ends_with('!') {
            continue;
        }
        out.push(Reference {
            kind: RefKind::Link,
            target: caps[1].trim().to_string(),
        });
    }

    for caps in IMG_TAG_RE.captures_iter(text) {
        out.push(Reference {
            kind: RefKind::Image,
            target: html_escape::decode_html_entities(caps[1].trim()).into_owned(),
        });
    }

    if let Some(target) = crate::frontmatter::redirect_target(text) {
        out.push(Reference {
            kind: RefKind::Redirect,
            target,
        });
    }

    out
}

/// The local path part of a reference, or `None` if it is not checked
/// (external URLs, anchors, queries, empty targets).
pub fn local_path(target: &str) -> Option<&str> {
    let mut t = target.trim();
    if let Some(inner) = t.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        t = inner.trim();
    }
    if t.is_empty() || IGNORED_PREFIXES.iter().any(|p| t.starts_with(p)) {
        return None;
    }

    let end = t.find(['#', '?']).unwrap_or(t.len());
    let path = &t[..end];
    (!path.is_empty()).then_some(path)
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Name of an entry next to `path` that matches its file name ignoring case.
fn find_case_insensitive(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let wanted = path.file_name()?.to_string_lossy().to_lowercase();
    fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .find(|name| name.to_lowercase() == wanted)
}

fn absolute(path: &Path) -> Result<PathBuf, Box<dyn Error>> {
    Ok(normalize_lexically(&std::path::absolute(path)?))
}

struct Checker<'a> {
    root: PathBuf,
    options: &'a ValidateOptions,
}

impl Checker<'_> {
    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn check_reference(&self, doc: &Path, reference: &Reference) -> Option<Finding> {
        let path = local_path(&reference.target)?;
        let base = doc.parent().unwrap_or(Path::new(""));
        let resolved = normalize_lexically(&base.join(path));

        let finding = |severity, kind, resolved: Option<String>, found: Option<String>| Finding {
            severity,
            kind,
            reference: reference.kind,
            file: self.display(doc),
            target: reference.target.clone(),
            resolved,
            found,
        };

        if !resolved.starts_with(&self.root) {
            return Some(finding(Severity::Error, FindingKind::EscapesRoot, None, None));
        }
        if resolved.exists() {
            return None;
        }

        match find_case_insensitive(&resolved) {
            Some(found) => Some(finding(
                Severity::Warning,
                FindingKind::CaseMismatch,
                resolved
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string()),
                Some(found),
            )),
            None => {
                let severity = if self.options.missing_links_as_warnings
                    && reference.kind == RefKind::Link
                {
                    Severity::Warning
                } else {
                    Severity::Error
                };
                Some(finding(
                    severity,
                    FindingKind::Missing,
                    Some(self.display(&resolved)),
                    None,
                ))
            }
        }
    }

    fn check_document(&self, doc: &Path, text: &str) -> Vec<Finding> {
        extract_references(text)
            .iter()
            .filter_map(|r| self.check_reference(doc, r))
            .collect()
    }
}

/// Every `*.md` file under `docs_dir`, sorted by path.
pub fn markdown_files(docs_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(docs_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "md"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Checks one document's text as if it lived at `doc`.
pub fn check_text(
    doc: &Path,
    text: &str,
    options: &ValidateOptions,
) -> Result<Vec<Finding>, Box<dyn Error>> {
    let checker = Checker {
        root: absolute(&options.root)?,
        options,
    };
    Ok(checker.check_document(&absolute(doc)?, text))
}

/// Validates every document under the docs directory.
///
/// Fails only when the docs directory is missing or a path cannot be made
/// absolute; unreadable documents are logged and skipped.
pub fn validate_docs(options: &ValidateOptions) -> Result<Report, Box<dyn Error>> {
    if !options.docs_dir.is_dir() {
        return Err(format!("docs directory not found at {}", options.docs_dir.display()).into());
    }

    let checker = Checker {
        root: absolute(&options.root)?,
        options,
    };
    let mut report = Report::default();

    for path in markdown_files(&absolute(&options.docs_dir)?) {
        let text = match fs::read(&path) {
            Ok(bytes) => crate::decode_lossy(bytes),
            Err(e) => {
                log::warn!("Failed to read {:?}: {}", path, e);
                continue;
            }
        };
        report.files_checked += 1;
        report.findings.extend(checker.check_document(&path, &text));
    }

    log::debug!(
        "Checked {} file(s), {} finding(s)",
        report.files_checked,
        report.findings.len()
    );
    Ok(report)
}
