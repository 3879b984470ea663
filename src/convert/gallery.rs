//! `<gallery>...</gallery>` blocks -> a compact HTML image list.

use crate::config::ConvertConfig;

const GALLERY_OPEN: &str = "<gallery";
const GALLERY_CLOSE: &str = "</gallery>";

/// One parsed gallery entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryImage {
    pub filename: String,

    /// Last `|` segment of the entry; empty when the entry has no options.
    pub caption: String,
}

impl GalleryImage {
    pub fn alt_text(&self) -> &str {
        if self.caption.is_empty() {
            &self.filename
        } else {
            &self.caption
        }
    }
}

#[derive(Debug)]
enum Segment<'a> {
    Line(&'a str),
    Gallery(Vec<&'a str>),
}

/// Splits text into plain lines and gallery blocks (inner lines only).
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out: Vec<Segment<'_>> = Vec::new();
    let mut collected: Option<Vec<&str>> = None;

    for line in text.lines() {
        let gallery_line = match collected {
            Some(_) => Some(line),
            None => match open_tag_remainder(line) {
                Some(rest) => {
                    collected = Some(Vec::new());
                    (!rest.trim().is_empty()).then_some(rest)
                }
                None => {
                    out.push(Segment::Line(line));
                    None
                }
            },
        };

        let (Some(line), Some(lines)) = (gallery_line, collected.as_mut()) else {
            continue;
        };

        match find_ascii_case_insensitive(line, GALLERY_CLOSE) {
            Some(idx) => {
                let before = &line[..idx];
                let after = &line[idx + GALLERY_CLOSE.len()..];
                if !before.trim().is_empty() {
                    lines.push(before);
                }
                out.push(Segment::Gallery(collected.take().unwrap_or_default()));
                if !after.trim().is_empty() {
                    out.push(Segment::Line(after));
                }
            }
            None => lines.push(line),
        }
    }

    // unclosed gallery: keep whatever was collected.
    if let Some(lines) = collected.take() {
        out.push(Segment::Gallery(lines));
    }

    out
}

/// If `line` opens a gallery, returns the text after the opening tag.
fn open_tag_remainder(line: &str) -> Option<&str> {
    let stripped = line.trim();
    let head = stripped.get(..GALLERY_OPEN.len())?;
    if !head.eq_ignore_ascii_case(GALLERY_OPEN) {
        return None;
    }
    Some(match stripped.find('>') {
        Some(i) => &stripped[i + 1..],
        None => "",
    })
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    // ASCII lowercasing keeps byte offsets intact.
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Inner lines of every gallery block in `text`.
pub(crate) fn gallery_blocks(text: &str) -> Vec<Vec<&str>> {
    segments(text)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Gallery(lines) => Some(lines),
            Segment::Line(_) => None,
        })
        .collect()
}

/// Parses gallery lines of the form `File:name[|option]*[|caption]`.
/// Lines without a file-namespace prefix are ignored.
pub fn parse_gallery(lines: &[&str], config: &ConvertConfig) -> Vec<GalleryImage> {
    lines
        .iter()
        .filter_map(|raw| parse_gallery_line(raw, config))
        .collect()
}

fn parse_gallery_line(raw: &str, config: &ConvertConfig) -> Option<GalleryImage> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }
    let rest = config.strip_file_namespace(line)?;
    let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
    let filename = parts.first().copied().unwrap_or_default();
    if filename.is_empty() {
        return None;
    }
    let caption = match parts.len() {
        0 | 1 => "",
        n => parts[n - 1],
    };
    Some(GalleryImage {
        filename: filename.to_string(),
        caption: caption.to_string(),
    })
}

fn render_gallery(lines: &[&str], config: &ConvertConfig) -> String {
    let images = parse_gallery(lines, config);
    if images.is_empty() {
        // nothing recognizable: keep the content rather than dropping it.
        return lines.join("\n");
    }

    let mut out = String::from("<div class=\"gallery-compact\">\n");
    for image in &images {
        let src = config.asset_href(&image.filename);
        out.push_str(&format!(
            "  <img src=\"{}\" alt=\"{}\" />\n",
            html_escape::encode_double_quoted_attribute(&src),
            html_escape::encode_double_quoted_attribute(image.alt_text()),
        ));
    }
    out.push_str("</div>");
    out
}

/// Replaces each gallery block with an HTML image list.
pub fn convert_galleries(text: &str, config: &ConvertConfig) -> String {
    let out: Vec<String> = segments(text)
        .into_iter()
        .map(|s| match s {
            Segment::Line(line) => line.to_string(),
            Segment::Gallery(lines) => render_gallery(&lines, config),
        })
        .collect();
    super::join_lines(&out, text.ends_with('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str) -> String {
        convert_galleries(text, &ConvertConfig::default())
    }

    #[test]
    fn test_gallery_with_captions_and_options() {
        let input = "Before\n<gallery widths=\"200\">\nFile:a.png|thumb|Caption A\nФайл:b.jpg\n</gallery>\nAfter";
        let expected = "Before\n<div class=\"gallery-compact\">\n  <img src=\"assets/a.png\" alt=\"Caption A\" />\n  <img src=\"assets/b.jpg\" alt=\"b.jpg\" />\n</div>\nAfter";
        assert_eq!(convert(input), expected);
    }

    #[test]
    fn test_gallery_without_images_keeps_lines() {
        let input = "<gallery>\nsome text\nmore text\n</gallery>\n";
        assert_eq!(convert(input), "some text\nmore text\n");
    }

    #[test]
    fn test_trailing_content_after_close_is_kept() {
        let input = "<gallery>\nFile:a.png</gallery> tail text";
        let expected =
            "<div class=\"gallery-compact\">\n  <img src=\"assets/a.png\" alt=\"a.png\" />\n</div>\n tail text";
        assert_eq!(convert(input), expected);
    }

    #[test]
    fn test_single_line_gallery() {
        let input = "<gallery>File:x.png|X</gallery>";
        let expected =
            "<div class=\"gallery-compact\">\n  <img src=\"assets/x.png\" alt=\"X\" />\n</div>";
        assert_eq!(convert(input), expected);
    }

    #[test]
    fn test_unclosed_gallery_is_flushed() {
        let input = "<gallery>\nfile:a.png|A\n";
        let expected = "<div class=\"gallery-compact\">\n  <img src=\"assets/a.png\" alt=\"A\" />\n</div>\n";
        assert_eq!(convert(input), expected);
    }

    #[test]
    fn test_alt_text_is_attribute_escaped() {
        let input = "<gallery>\nFile:q.png|say \"hi\"\n</gallery>";
        let out = convert(input);
        assert!(out.contains("alt=\"say &quot;hi&quot;\""), "{out}");
    }

    #[test]
    fn test_text_outside_gallery_untouched() {
        let input = "File:not-in-gallery.png|x\nplain";
        assert_eq!(convert(input), input);
    }
}
