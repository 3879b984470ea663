use std::fmt;

use serde::Serialize;

/// Severity level of a validator finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Where in a document the reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// `[text](target)`
    Link,
    /// `![alt](file)` or `<img src="file">`
    Image,
    /// `redirect_to:` in the frontmatter.
    Redirect,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefKind::Link => "link",
            RefKind::Image => "image",
            RefKind::Redirect => "redirect",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// The target resolves outside the root directory.
    EscapesRoot,
    /// Nothing exists at the target, in any letter case.
    Missing,
    /// The target exists only under a different letter case.
    CaseMismatch,
}

/// One broken or suspicious reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub reference: RefKind,

    /// Document containing the reference, relative to the root when possible.
    pub file: String,

    /// The reference exactly as written.
    pub target: String,

    /// Resolved path, relative to the root when possible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,

    /// Name actually present on disk, for case mismatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<String>,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FindingKind::EscapesRoot => write!(
                f,
                "{}: {} escapes repo root: {}",
                self.file, self.reference, self.target
            ),
            FindingKind::Missing => write!(
                f,
                "{}: missing {}: {} -> {}",
                self.file,
                self.reference,
                self.target,
                self.resolved.as_deref().unwrap_or("?")
            ),
            FindingKind::CaseMismatch => write!(
                f,
                "{}: case-mismatch for {}: {} -> wanted {}, found {}",
                self.file,
                self.reference,
                self.target,
                self.resolved.as_deref().unwrap_or("?"),
                self.found.as_deref().unwrap_or("?")
            ),
        }
    }
}

/// Everything the validator found in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub files_checked: usize,
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// `2` when any error was found, else `0`.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() { 2 } else { 0 }
    }

    /// Human-readable report. At most `max_warnings` warnings are listed.
    pub fn render_text(&self, max_warnings: usize) -> String {
        let warnings: Vec<&Finding> = self.warnings().collect();
        let errors: Vec<&Finding> = self.errors().collect();
        let mut out = String::new();

        if !warnings.is_empty() {
            out.push_str(&format!("Found {} warning(s):\n", warnings.len()));
            for w in warnings.iter().take(max_warnings) {
                out.push_str(&format!("   {}\n", w));
            }
            if warnings.len() > max_warnings {
                out.push_str(&format!(
                    "  ... and {} more\n",
                    warnings.len() - max_warnings
                ));
            }
        }

        if !errors.is_empty() {
            out.push_str(&format!("\nFound {} error(s):\n", errors.len()));
            for e in &errors {
                out.push_str(&format!("   {}\n", e));
            }
            return out;
        }

        out.push_str("\nDocumentation validation passed!\n");
        if !warnings.is_empty() {
            out.push_str(&format!("({} warnings)\n", warnings.len()));
        }
        out
    }
}
