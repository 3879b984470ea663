//! Immutable configuration values shared by the pipeline and the I/O glue.
//!
//! Everything here is built from `Default` and then overridden by CLI flags.
//! Nothing is mutated once a run starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INDEX_URL: &str = "https://wiki.wega-project.ru/wiki/index.php";
pub const DEFAULT_PAGES_FILE: &str = "all_pages.txt";

/// Options controlling how markup is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    /// Path prefix (relative to a generated document) for image references.
    pub assets_path: String,

    /// Extension given to generated documents and to internal-link hrefs.
    pub doc_extension: String,

    /// Lowercase namespace names that turn `[[ns:...]]` into an image.
    pub file_namespaces: Vec<String>,

    /// Lowercase namespace names whose links are stripped.
    pub category_namespaces: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            assets_path: "assets".to_string(),
            doc_extension: "md".to_string(),
            file_namespaces: vec!["file".to_string(), "файл".to_string()],
            category_namespaces: vec!["category".to_string(), "категория".to_string()],
        }
    }
}

impl ConvertConfig {
    /// `true` if `ns` (any case) names a file namespace.
    pub fn is_file_namespace(&self, ns: &str) -> bool {
        let ns = ns.trim().to_lowercase();
        self.file_namespaces.iter().any(|f| *f == ns)
    }

    /// Returns the text after the namespace prefix if `target` starts with a
    /// file namespace, e.g. `Файл:pic.png` -> `pic.png`.
    pub fn strip_file_namespace<'a>(&self, target: &'a str) -> Option<&'a str> {
        let (ns, rest) = target.split_once(':')?;
        self.is_file_namespace(ns).then_some(rest)
    }

    /// Relative href of an image in the assets directory.
    pub fn asset_href(&self, filename: &str) -> String {
        let prefix = self.assets_path.trim_end_matches('/');
        if prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", prefix, filename)
        }
    }

    /// Relative href of the generated document for a page title.
    pub fn doc_href(&self, title: &str) -> String {
        format!("{}.{}", crate::sanitize_title(title), self.doc_extension)
    }
}

/// Where the remote wiki lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    /// `.../index.php`, used for `action=raw` fetches.
    pub index_url: String,

    pub timeout: Duration,

    /// `aplimit` for `list=allpages` queries.
    pub page_size: u32,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            timeout: Duration::from_secs(30),
            page_size: 500,
        }
    }
}

impl WikiConfig {
    pub fn with_index_url(index_url: &str) -> Self {
        Self {
            index_url: index_url.to_string(),
            ..Self::default()
        }
    }

    /// `api.php` next to `index.php`.
    pub fn api_url(&self) -> String {
        match self.index_url.rsplit_once('/') {
            Some((base, _)) => format!("{}/api.php", base),
            None => "api.php".to_string(),
        }
    }
}

/// Options for a conversion batch (local or remote).
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory holding `*.mediawiki` sources in local mode.
    pub source_dir: PathBuf,

    /// Directory generated documents are written to.
    pub docs_dir: PathBuf,

    /// Directory downloaded images are written to.
    pub assets_dir: PathBuf,

    /// If true, nothing is written or downloaded.
    pub dry_run: bool,

    /// If true, referenced images are not downloaded.
    pub skip_images: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::with_dirs(Path::new("mediawiki"), Path::new("docs"))
    }
}

impl BatchOptions {
    pub fn with_dirs(source_dir: &Path, docs_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            docs_dir: docs_dir.to_path_buf(),
            assets_dir: docs_dir.join("assets"),
            dry_run: false,
            skip_images: false,
        }
    }
}

/// Options for the Markdown link validator.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// References must not resolve outside this directory.
    pub root: PathBuf,

    /// Directory scanned for `*.md` files.
    pub docs_dir: PathBuf,

    /// Report missing page links (not images) as warnings instead of errors.
    pub missing_links_as_warnings: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            docs_dir: PathBuf::from("docs"),
            missing_links_as_warnings: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_sits_next_to_index_php() {
        let cfg = WikiConfig::default();
        assert_eq!(cfg.api_url(), "https://wiki.wega-project.ru/wiki/api.php");

        let cfg = WikiConfig::with_index_url("http://localhost:8080/w/index.php");
        assert_eq!(cfg.api_url(), "http://localhost:8080/w/api.php");
    }

    #[test]
    fn file_namespace_is_case_insensitive() {
        let cfg = ConvertConfig::default();
        assert_eq!(cfg.strip_file_namespace("FILE:a.png"), Some("a.png"));
        assert_eq!(cfg.strip_file_namespace("Файл:b.jpg"), Some("b.jpg"));
        assert_eq!(cfg.strip_file_namespace("ФАЙЛ:c.jpg"), Some("c.jpg"));
        assert_eq!(cfg.strip_file_namespace("Page:c.jpg"), None);
        assert_eq!(cfg.strip_file_namespace("NoColon"), None);
    }

    #[test]
    fn assets_dir_defaults_under_docs() {
        let opts = BatchOptions::with_dirs(Path::new("src"), Path::new("out"));
        assert_eq!(opts.assets_dir, PathBuf::from("out").join("assets"));
    }
}
