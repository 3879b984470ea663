//! MediaWiki markup -> Markdown.
//!
//! The conversion is a fixed sequence of independent textual passes over the
//! whole page body. Order matters:
//! - tables and galleries are detected by line prefixes, so they run before
//!   any link rewriting touches `|` or `[[`.
//! - lists run before headings so `#` list markers are consumed before any
//!   `#` heading prefix exists in the text.
//!
//! Every pass is total: input it does not recognize is passed through as-is.

mod gallery;
mod inline;
mod list;
mod table;

use std::collections::BTreeSet;

use regex::Regex;

use crate::config::ConvertConfig;

pub use gallery::{GalleryImage, convert_galleries, parse_gallery};
pub use inline::{
    convert_emphasis, convert_external_links, convert_headings, convert_internal_links,
    strip_categories,
};
pub use list::convert_lists;
pub use table::{convert_tables, render_markdown_table};

/// The conversion pipeline, bound to one immutable configuration.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConvertConfig,
    category_re: Option<Regex>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertConfig::default())
    }
}

impl Converter {
    pub fn new(config: ConvertConfig) -> Self {
        let category_re = inline::category_regex(&config.category_namespaces);
        Self {
            config,
            category_re,
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Runs every pass over a page body.
    pub fn convert(&self, input: &str) -> String {
        let mut text = convert_tables(input);
        text = convert_galleries(&text, &self.config);
        text = strip_categories(&text, self.category_re.as_ref());
        text = convert_lists(&text);
        text = convert_headings(&text);
        text = convert_emphasis(&text);
        text = convert_external_links(&text);
        convert_internal_links(&text, &self.config)
    }

    /// Every image filename referenced by the raw markup, from file links and
    /// gallery blocks. Used to decide what to download.
    pub fn image_filenames(&self, raw: &str) -> BTreeSet<String> {
        let mut out = inline::file_link_targets(raw, &self.config);
        for block in gallery::gallery_blocks(raw) {
            for image in parse_gallery(&block, &self.config) {
                out.insert(image.filename);
            }
        }
        out
    }
}

/// Converts with the default configuration.
pub fn convert_text(input: &str) -> String {
    Converter::default().convert(input)
}

/// Joins lines produced by a line-based pass, keeping the input's trailing
/// newline (if it had one).
pub(crate) fn join_lines<S: AsRef<str>>(lines: &[S], trailing_newline: bool) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.as_ref());
    }
    if trailing_newline {
        out.push('\n');
    }
    out
}
