//! YAML frontmatter for redirect stubs.
//!
//! A redirect page on the wiki becomes a tiny Markdown document whose
//! frontmatter names the canonical document, followed by a readable link:
//!
//! ```text
//! ---
//! redirect_to: Target_Page.md
//! ---
//!
//! [Redirected to Target Page](Target_Page.md)
//! ```
//!
//! A target that YAML would misread as a plain scalar (`@Home.md`, `&Co.md`)
//! is written double-quoted.

use serde::Deserialize;

use crate::config::ConvertConfig;

/// A generated stub pointing at the document of a canonical page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectStub {
    /// Title of the canonical page, shown in the link text.
    pub target_title: String,

    /// Relative href of the canonical page's document.
    pub target_file: String,
}

impl RedirectStub {
    pub fn new(target_title: &str, config: &ConvertConfig) -> Self {
        Self {
            target_title: target_title.to_string(),
            target_file: config.doc_href(target_title),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("---\n");
        out.push_str(&format!("redirect_to: {}\n", yaml_scalar(&self.target_file)));
        out.push_str("---\n");
        out.push('\n');
        out.push_str(&format!(
            "[Redirected to {}]({})\n",
            self.target_title, self.target_file
        ));
        out
    }
}

#[derive(Debug, Deserialize)]
struct StubFrontmatter {
    #[serde(default)]
    redirect_to: Option<String>,
}

/// `s` as a YAML scalar: plain when it reads back unchanged, double-quoted otherwise.
///
/// Titles may start with indicators (`@`, `&`, `'`, ...) or hold characters
/// that a plain scalar cannot carry.
fn yaml_scalar(s: &str) -> String {
    let plain = format!("redirect_to: {s}\n");
    match serde_yaml::from_str::<StubFrontmatter>(&plain) {
        Ok(fm) if fm.redirect_to.as_deref() == Some(s) => s.to_string(),
        _ => yaml_quote(s),
    }
}

fn yaml_quote(s: &str) -> String {
    // escape backslashes, double quotes and anything YAML won't take literally.
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control()
                || matches!(c, '\u{2028}' | '\u{2029}' | '\u{FEFF}' | '\u{FFFE}' | '\u{FFFF}') =>
            {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// If `text` starts with YAML frontmatter (`---` ... `---`), return the frontmatter
/// block verbatim (including both `---` lines and their original newlines) and
/// the remainder of the document.
pub fn split_yaml_frontmatter(text: &str) -> Option<(String, &str)> {
    // "---" must be exactly on the first line; accept both \n and \r\n.
    if !(text.starts_with("---\n") || text.starts_with("---\r\n")) {
        return None;
    }

    let mut pos = 0usize;
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    pos += first.len();

    for line in lines {
        pos += line.len();
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" {
            let fm = text[..pos].to_string();
            let rest = &text[pos..];
            return Some((fm, rest));
        }
    }
    None
}

fn yaml_inner(frontmatter_block: &str) -> String {
    let mut out = String::new();
    for line in frontmatter_block.lines().skip(1) {
        if line.trim_end() == "---" {
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// The `redirect_to` target of a document, if its frontmatter has one.
///
/// Unparseable frontmatter is treated as absent.
pub fn redirect_target(text: &str) -> Option<String> {
    let (block, _rest) = split_yaml_frontmatter(text)?;
    let parsed: StubFrontmatter = serde_yaml::from_str(&yaml_inner(&block)).ok()?;
    parsed
        .redirect_to
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
