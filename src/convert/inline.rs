//! Inline and single-line rewrites: categories, headings, emphasis, links.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::ConvertConfig;

static BOLD_ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)'''''(.*?)'''''").unwrap());
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)'''(.*?)'''").unwrap());
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)''(.*?)''").unwrap());

static EXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(https?://[^\s\]]+)(?:\s+([^\]]+))?\]").unwrap());

static INT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^|\]]+)(?:\|([^\]]+))?\]\]").unwrap());

const MAX_HEADING_LEVEL: usize = 6;

/// Builds the matcher for `[[<category ns>:...]]`. `None` when no namespace
/// is configured.
pub(crate) fn category_regex(namespaces: &[String]) -> Option<Regex> {
    if namespaces.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = namespaces.iter().map(|ns| regex::escape(ns)).collect();
    Regex::new(&format!(r"(?i)\[\[(?:{}):[^\]]+\]\]", alternatives.join("|"))).ok()
}

/// Deletes category links entirely.
pub fn strip_categories(input: &str, category_re: Option<&Regex>) -> String {
    match category_re {
        Some(re) => re.replace_all(input, "").into_owned(),
        None => input.to_string(),
    }
}

fn convert_heading_line(line: &str) -> Option<String> {
    let line = line.trim_end();
    let leading = line.bytes().take_while(|&b| b == b'=').count();

    // widest symmetric marker wins.
    for level in (1..=leading.min(MAX_HEADING_LEVEL)).rev() {
        let marker = &"======"[..level];
        if line.len() <= level * 2 || !line.ends_with(marker) {
            continue;
        }
        let title = line[level..line.len() - level].trim();
        if title.is_empty() {
            continue;
        }
        return Some(format!("{} {}", "#".repeat(level), title));
    }
    None
}

/// `== Title ==` -> `## Title`, one line at a time.
pub fn convert_headings(input: &str) -> String {
    let out: Vec<String> = input
        .lines()
        .map(|line| convert_heading_line(line).unwrap_or_else(|| line.to_string()))
        .collect();
    super::join_lines(&out, input.ends_with('\n'))
}

/// MediaWiki bold/italic:
/// - ''italic''
/// - '''bold'''
/// - '''''bold+italic'''''
pub fn convert_emphasis(input: &str) -> String {
    let mut text = BOLD_ITALIC_RE.replace_all(input, "***$1***").into_owned();
    text = BOLD_RE.replace_all(&text, "**$1**").into_owned();
    ITALIC_RE.replace_all(&text, "*$1*").into_owned()
}

/// `[https://example.org Label]` -> `[Label](https://example.org)`.
///
/// Bare URLs are left for the Markdown renderer to autolink.
pub fn convert_external_links(input: &str) -> String {
    EXT_LINK_RE
        .replace_all(input, |caps: &Captures| {
            let url = caps[1].trim();
            let label = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|l| !l.is_empty())
                .unwrap_or(url);
            format!("[{}]({})", label, url)
        })
        .into_owned()
}

/// Converts `[[Page]]`, `[[Page|Label]]` and `[[File:img.png|...|caption]]`.
pub fn convert_internal_links(input: &str, config: &ConvertConfig) -> String {
    INT_LINK_RE
        .replace_all(input, |caps: &Captures| {
            let target = caps[1].trim();
            let label = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

            if let Some(rest) = config.strip_file_namespace(target) {
                let filename = rest.trim();
                // label may carry options (`thumb|left|...`); the caption is last.
                let caption = label
                    .split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .next_back()
                    .unwrap_or(filename);
                return format!("![{}]({})", caption, config.asset_href(filename));
            }

            // page links share the output file naming rule.
            let label = if label.is_empty() { target } else { label };
            format!("[{}]({})", label, config.doc_href(target))
        })
        .into_owned()
}

/// Filenames of every `[[File:...]]` link in raw markup.
pub(crate) fn file_link_targets(input: &str, config: &ConvertConfig) -> BTreeSet<String> {
    INT_LINK_RE
        .captures_iter(input)
        .filter_map(|caps| {
            let target = caps.get(1)?.as_str().trim();
            let filename = config.strip_file_namespace(target)?.trim();
            (!filename.is_empty()).then(|| filename.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(input: &str) -> String {
        convert_internal_links(input, &ConvertConfig::default())
    }

    #[test]
    fn test_headings() {
        assert_eq!(convert_headings("==Title=="), "## Title");
        assert_eq!(convert_headings("======H6======"), "###### H6");
        assert_eq!(convert_headings("= Spaced =  \n"), "# Spaced\n");
        assert_eq!(convert_headings("=== Level 3 ===\ntext"), "### Level 3\ntext");
    }

    #[test]
    fn test_heading_needs_symmetric_markers() {
        // the widest marker that closes the line is used.
        assert_eq!(convert_headings("===Title=="), "## =Title");
        assert_eq!(convert_headings("=======x======="), "###### =x=");
    }

    #[test]
    fn test_non_headings_untouched() {
        for input in ["==", "= =", "a == b ==", " ==Indented==", "==Open"] {
            assert_eq!(convert_headings(input), input, "{input:?}");
        }
    }

    #[test]
    fn test_headings_do_not_swallow_blank_lines() {
        assert_eq!(convert_headings("==A==\n\nText"), "## A\n\nText");
    }

    #[test]
    fn test_emphasis() {
        assert_eq!(
            convert_emphasis("'''a''' ''b'' '''''c'''''"),
            "**a** *b* ***c***"
        );
    }

    #[test]
    fn test_emphasis_may_span_lines() {
        assert_eq!(convert_emphasis("'''one\ntwo'''"), "**one\ntwo**");
    }

    #[test]
    fn test_unbalanced_emphasis_is_left_alone() {
        assert_eq!(convert_emphasis("it's '''open"), "it's '''open");
    }

    #[test]
    fn test_external_links() {
        assert_eq!(
            convert_external_links("[https://x.org Label]"),
            "[Label](https://x.org)"
        );
        assert_eq!(
            convert_external_links("[https://x.org]"),
            "[https://x.org](https://x.org)"
        );
        assert_eq!(
            convert_external_links("see [http://a.b/c?d=e two words] now"),
            "see [two words](http://a.b/c?d=e) now"
        );
    }

    #[test]
    fn test_bare_urls_untouched() {
        let input = "visit https://x.org or [ftp://x.org files]";
        assert_eq!(convert_external_links(input), input);
    }

    #[test]
    fn test_page_links() {
        assert_eq!(links("[[Foo Bar]]"), "[Foo Bar](Foo_Bar.md)");
        assert_eq!(links("[[Foo Bar|the foo]]"), "[the foo](Foo_Bar.md)");
        assert_eq!(
            links("[[What? A/B: \"x\"]]"),
            "[What? A/B: \"x\"](What__A_B___x_.md)"
        );
    }

    #[test]
    fn test_file_links() {
        assert_eq!(
            links("[[Файл:pic.png|caption]]"),
            "![caption](assets/pic.png)"
        );
        assert_eq!(links("[[File:pic.png]]"), "![pic.png](assets/pic.png)");
        assert_eq!(
            links("[[file: pic.png |thumb|300px| Some caption |]]"),
            "![Some caption](assets/pic.png)"
        );
    }

    #[test]
    fn test_strip_categories() {
        let re = category_regex(&["category".to_string(), "категория".to_string()]);
        let input = "Text[[Category:One]] more [[КАТЕГОРИЯ:Два]][[category:three|sort]]";
        assert_eq!(strip_categories(input, re.as_ref()), "Text more ");
    }

    #[test]
    fn test_strip_categories_without_namespaces() {
        assert!(category_regex(&[]).is_none());
        assert_eq!(strip_categories("[[Category:X]]", None), "[[Category:X]]");
    }

    #[test]
    fn test_file_link_targets() {
        let targets = file_link_targets(
            "[[File:a.png]] [[Page]] [[ФАЙЛ:b.png|x]] [[File:]]",
            &ConvertConfig::default(),
        );
        assert_eq!(
            targets.into_iter().collect::<Vec<_>>(),
            vec!["a.png".to_string(), "b.png".to_string()]
        );
    }
}
