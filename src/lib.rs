pub mod batch;
pub mod config;
pub mod convert;
pub mod frontmatter;
pub mod validate;
pub mod wiki;

use std::time::Duration;

pub use convert::{Converter, convert_text};

/// Characters that may not appear in a generated filename. Spaces are
/// replaced too, so titles and filenames read the same way wiki URLs do.
pub const INVALID_FILENAME_CHARS: [char; 9] = [' ', '/', '<', '>', ':', '"', '|', '?', '*'];

/// Maps a page title to the stem of its output document.
///
/// This is the only title -> filename rule: both output naming and internal
/// link hrefs go through it, so links between generated documents resolve.
pub fn sanitize_title(title: &str) -> String {
    title.replace(INVALID_FILENAME_CHARS, "_")
}

/// Decodes page bytes, replacing invalid UTF-8 sequences instead of failing.
pub fn decode_lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(&e.into_bytes()).to_string())
}

/// `mm:ss.mmm`, used in progress lines.
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let mins = total_ms / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{:02}:{:02}.{:03}", mins, secs, ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_sanitized_titles_have_no_reserved_chars(title in "\\PC*") {
            let name = sanitize_title(&title);
            prop_assert!(!name.contains(INVALID_FILENAME_CHARS));
            prop_assert_eq!(name.chars().count(), title.chars().count());
        }

        #[test]
        fn prop_sanitize_is_idempotent(title in "[ a-zA-Zа-я/<>:\"|?*._-]{0,40}") {
            let once = sanitize_title(&title);
            prop_assert_eq!(sanitize_title(&once), once);
        }

        #[test]
        fn prop_links_point_at_output_names(tail in "[a-zA-Z0-9]([ a-zA-Z0-9/:?]{0,20}[a-zA-Z0-9])?") {
            // the internal-link rewriter and output naming must agree.
            let config = config::ConvertConfig::default();
            let title = format!("Page {tail}");
            let out = convert_text(&format!("[[{title}]]"));
            let href = format!("({})", config.doc_href(&title));
            prop_assert!(out.ends_with(&href), "{} vs {}", out, href);
        }
    }

    #[test]
    fn sanitize_replaces_every_invalid_char() {
        assert_eq!(sanitize_title("Foo Bar"), "Foo_Bar");
        assert_eq!(sanitize_title(r#"a/b<c>d:e"f|g?h*i"#), "a_b_c_d_e_f_g_h_i");
        assert_eq!(sanitize_title("Станция ВЕГА"), "Станция_ВЕГА");
    }

    #[test]
    fn sanitize_keeps_other_chars() {
        // backslash and dots are left alone; only the listed set is replaced.
        assert_eq!(sanitize_title(r"a\b.c"), r"a\b.c");
        assert_eq!(sanitize_title(""), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_title("What? A/B: \"x\"");
        assert_eq!(sanitize_title(&once), once);
    }

    #[test]
    fn decode_lossy_replaces_invalid_bytes() {
        assert_eq!(decode_lossy(b"ok".to_vec()), "ok");
        assert_eq!(decode_lossy(vec![b'a', 0xff, b'b']), "a\u{fffd}b");
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::from_millis(61_042)), "01:01.042");
    }
}
