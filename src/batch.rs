//! Batch runner: reads pages (local files or a remote wiki), runs the
//! conversion pipeline and writes documents, redirect stubs and images.
//!
//! Failures on one page or image are logged and counted; the batch moves on.

use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::config::BatchOptions;
use crate::convert::Converter;
use crate::frontmatter::RedirectStub;
use crate::wiki::WikiApi;

pub const SOURCE_EXTENSION: &str = "mediawiki";

/// Counters reported at the end of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub redirects: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
}

/// What happened to one referenced image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    AlreadyPresent,
    Downloaded,
    WouldDownload,
    /// The wiki has no URL for this file.
    NotFound,
    /// Filename would escape the assets directory.
    Rejected,
}

/// Page titles from a pages file: one per line, blank lines and `#` comments
/// skipped.
pub fn parse_pages_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_pages_file(path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(parse_pages_list(&crate::decode_lossy(bytes)))
}

/// Titles to convert in remote mode: the explicit title if given, else the
/// pages file if it exists and reads cleanly, else every page the wiki lists.
pub fn resolve_remote_titles(
    api: &dyn WikiApi,
    title: Option<&str>,
    pages_file: &Path,
) -> Vec<String> {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return vec![title.to_string()];
    }

    if pages_file.exists() {
        match load_pages_file(pages_file) {
            Ok(titles) => return titles,
            Err(e) => {
                log::error!("Error loading pages file {:?}: {}", pages_file, e);
                log::info!("Fetching page list from MediaWiki API...");
            }
        }
    } else {
        log::info!("No pages file found, fetching page list from MediaWiki API...");
    }

    api.list_pages()
}

fn is_safe_asset_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
}

/// Downloads one image into `assets_dir` unless it is already there.
pub fn download_image(
    api: &dyn WikiApi,
    filename: &str,
    assets_dir: &Path,
    dry_run: bool,
) -> Result<ImageOutcome, Box<dyn Error>> {
    if !is_safe_asset_name(filename) {
        return Ok(ImageOutcome::Rejected);
    }

    let dest = assets_dir.join(filename);
    if dest.exists() {
        return Ok(ImageOutcome::AlreadyPresent);
    }
    if dry_run {
        return Ok(ImageOutcome::WouldDownload);
    }

    let Some(url) = api.image_url(filename)? else {
        return Ok(ImageOutcome::NotFound);
    };
    let bytes = api.fetch_bytes(&url)?;

    fs::create_dir_all(assets_dir)?;
    fs::write(&dest, bytes)?;
    Ok(ImageOutcome::Downloaded)
}

/// State shared by every page of one batch.
struct BatchRun<'a> {
    converter: &'a Converter,
    options: &'a BatchOptions,
    images: Option<&'a dyn WikiApi>,
    /// output path -> what produced it, for collision detection.
    written: HashMap<PathBuf, String>,
    summary: BatchSummary,
    start: Instant,
}

impl<'a> BatchRun<'a> {
    fn new(
        converter: &'a Converter,
        options: &'a BatchOptions,
        images: Option<&'a dyn WikiApi>,
    ) -> Self {
        let images = if options.skip_images { None } else { images };
        Self {
            converter,
            options,
            images,
            written: HashMap::new(),
            summary: BatchSummary::default(),
            start: Instant::now(),
        }
    }

    fn doc_path(&self, title: &str) -> PathBuf {
        self.options
            .docs_dir
            .join(self.converter.config().doc_href(title))
    }

    /// Returns what already claimed `dst` in this batch, if anything.
    fn claimed_by(&self, dst: &Path) -> Option<&str> {
        self.written.get(dst).map(String::as_str)
    }

    fn fetch_images(&mut self, raw: &str, label: &str) {
        let Some(api) = self.images else {
            return;
        };
        let filenames = self.converter.image_filenames(raw);
        if filenames.is_empty() {
            return;
        }
        log::info!("Found {} image(s) in {}", filenames.len(), label);

        for filename in &filenames {
            match download_image(api, filename, &self.options.assets_dir, self.options.dry_run) {
                Ok(ImageOutcome::Downloaded) => {
                    self.summary.images_downloaded += 1;
                    log::info!("  Downloaded: {}", filename);
                }
                Ok(ImageOutcome::WouldDownload) => {
                    log::info!("  [DRY RUN] Would download: {}", filename);
                }
                Ok(ImageOutcome::AlreadyPresent) => {
                    log::debug!("  Already present: {}", filename);
                }
                Ok(ImageOutcome::NotFound) => {
                    self.summary.images_failed += 1;
                    log::warn!("  Failed to get URL for {}", filename);
                }
                Ok(ImageOutcome::Rejected) => {
                    self.summary.images_failed += 1;
                    log::warn!("  Refusing to download {:?}: not a plain filename", filename);
                }
                Err(e) => {
                    self.summary.images_failed += 1;
                    log::warn!("  Failed to download {}: {}", filename, e);
                }
            }
        }
    }

    /// Converts one page body and writes it to `dst`.
    fn emit_page(
        &mut self,
        raw: &str,
        label: &str,
        dst: PathBuf,
        index: usize,
        total: usize,
    ) -> Result<(), Box<dyn Error>> {
        if let Some(previous) = self.claimed_by(&dst) {
            log::warn!(
                "Skipping {}: {:?} was already written for {} in this batch",
                label,
                dst,
                previous
            );
            self.summary.skipped += 1;
            return Ok(());
        }

        self.fetch_images(raw, label);
        let markdown = self.converter.convert(raw);

        if self.options.dry_run {
            log::info!("[DRY RUN] {} -> {:?}", label, dst);
        } else {
            write_document(&dst, &markdown)?;
            log::info!(
                "[{:>4}/{:>4}] [{}] Converted: {} -> {:?}",
                index,
                total,
                crate::format_elapsed(self.start.elapsed()),
                label,
                dst
            );
        }

        self.written.insert(dst, label.to_string());
        self.summary.converted += 1;
        Ok(())
    }

    fn emit_redirect(&mut self, from: &str, to: &str) -> Result<(), Box<dyn Error>> {
        let dst = self.doc_path(from);
        if let Some(previous) = self.claimed_by(&dst) {
            log::warn!(
                "Skipping redirect {:?}: {:?} was already written for {}",
                from,
                dst,
                previous
            );
            self.summary.skipped += 1;
            return Ok(());
        }

        let stub = RedirectStub::new(to, self.converter.config());
        if self.options.dry_run {
            log::info!("[DRY RUN][redirect] {:?} -> {}", from, stub.target_file);
        } else {
            write_document(&dst, &stub.to_markdown())?;
            log::info!("Created redirect {:?} -> {:?}", from, to);
        }

        self.written.insert(dst, format!("redirect {:?}", from));
        self.summary.redirects += 1;
        Ok(())
    }

    fn finish(self) -> BatchSummary {
        let total_secs = self.start.elapsed().as_secs_f64();
        let count = self.summary.converted;
        let avg_str = if count > 0 {
            format!("{:.3}s", total_secs / count as f64)
        } else {
            "-".to_string()
        };
        log::info!(
            "Done. Converted {} pages in {:.3}s (avg {}/doc); {} redirects, {} skipped, {} failed.",
            count,
            total_secs,
            avg_str,
            self.summary.redirects,
            self.summary.skipped,
            self.summary.failed
        );
        self.summary
    }
}

fn write_document(dst: &Path, content: &str) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dst, content)?;
    Ok(())
}

/// Every `*.mediawiki` file directly inside `dir`, sorted by path.
pub fn local_sources(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if !dir.exists() {
        return Err(format!("mediawiki directory not found at {}", dir.display()).into());
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext == SOURCE_EXTENSION)
        })
        .map(|e| e.into_path())
        .collect();

    paths.sort();
    Ok(paths)
}

/// Local mode: convert `input` (or every source in the source dir) into the
/// docs dir. `output` overrides the destination of a single input file.
///
/// `images` is used to download referenced images; pass `None` to skip them.
pub fn convert_local(
    converter: &Converter,
    options: &BatchOptions,
    input: Option<&Path>,
    output: Option<&Path>,
    images: Option<&dyn WikiApi>,
) -> Result<BatchSummary, Box<dyn Error>> {
    let sources = match input {
        Some(path) => vec![path.to_path_buf()],
        None => local_sources(&options.source_dir)?,
    };
    if sources.is_empty() {
        log::info!("No .{} files found to convert.", SOURCE_EXTENSION);
        return Ok(BatchSummary::default());
    }

    let mut run = BatchRun::new(converter, options, images);
    let total = sources.len();

    for (i, src) in sources.iter().enumerate() {
        if !src.is_file() {
            log::warn!("Not a file, skipping: {:?}", src);
            run.summary.skipped += 1;
            continue;
        }

        let raw = match fs::read(src) {
            Ok(bytes) => crate::decode_lossy(bytes),
            Err(e) => {
                log::error!("Failed to read {:?}: {}", src, e);
                run.summary.failed += 1;
                continue;
            }
        };

        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());
        let dst = match output {
            Some(out) if total == 1 => out.to_path_buf(),
            _ => options
                .docs_dir
                .join(format!("{}.{}", stem, converter.config().doc_extension)),
        };

        let label = src.display().to_string();
        if let Err(e) = run.emit_page(&raw, &label, dst, i + 1, total) {
            log::error!("Failed to write output for {}: {}", label, e);
            run.summary.failed += 1;
        }
    }

    Ok(run.finish())
}

/// Remote mode: fetch and convert `titles`, then write stubs for every
/// redirect the wiki reports.
pub fn convert_remote(
    api: &dyn WikiApi,
    converter: &Converter,
    options: &BatchOptions,
    titles: &[String],
) -> Result<BatchSummary, Box<dyn Error>> {
    let titles: Vec<&str> = titles
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if titles.is_empty() {
        log::info!("No page titles found to convert in remote mode.");
        return Ok(BatchSummary::default());
    }

    let mut run = BatchRun::new(converter, options, Some(api));
    let total = titles.len();

    for (i, title) in titles.iter().enumerate() {
        let raw = match api.fetch_page_raw(title) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("Failed to fetch {:?}: {}", title, e);
                run.summary.failed += 1;
                continue;
            }
        };

        let dst = run.doc_path(title);
        let label = format!("{:?}", title);
        if let Err(e) = run.emit_page(&raw, &label, dst, i + 1, total) {
            log::error!("Failed to write output for {}: {}", label, e);
            run.summary.failed += 1;
        }
    }

    log::info!("Fetching redirects...");
    let redirects = api.list_redirects();
    if !redirects.is_empty() {
        log::info!("Found {} redirect(s)", redirects.len());
    }
    for (from, to) in &redirects {
        if let Err(e) = run.emit_redirect(from, to) {
            log::error!("Failed to write redirect {:?}: {}", from, e);
            run.summary.failed += 1;
        }
    }

    Ok(run.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::WikiError;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeWiki {
        pages: BTreeMap<String, String>,
        redirects: BTreeMap<String, String>,
        images: BTreeMap<String, Vec<u8>>,
        fetched_images: RefCell<Vec<String>>,
    }

    impl WikiApi for FakeWiki {
        fn fetch_page_raw(&self, title: &str) -> Result<String, WikiError> {
            self.pages
                .get(title)
                .cloned()
                .ok_or_else(|| WikiError::InvalidUrl {
                    url: title.to_string(),
                    message: "no such page".to_string(),
                })
        }

        fn list_pages(&self) -> Vec<String> {
            self.pages.keys().cloned().collect()
        }

        fn list_redirects(&self) -> BTreeMap<String, String> {
            self.redirects.clone()
        }

        fn image_url(&self, filename: &str) -> Result<Option<String>, WikiError> {
            Ok(self
                .images
                .contains_key(filename)
                .then(|| format!("mem://{}", filename)))
        }

        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, WikiError> {
            let name = url.trim_start_matches("mem://");
            self.fetched_images.borrow_mut().push(name.to_string());
            Ok(self.images.get(name).cloned().unwrap_or_default())
        }
    }

    fn options(root: &Path) -> BatchOptions {
        BatchOptions::with_dirs(&root.join("mediawiki"), &root.join("docs"))
    }

    #[test]
    fn pages_list_skips_blanks_and_comments() {
        let text = "# header\nAlpha\n\n  Beta  \n#Gamma\n";
        assert_eq!(parse_pages_list(text), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn remote_titles_prefer_explicit_then_file_then_api() {
        let dir = tempdir().unwrap();
        let wiki = FakeWiki {
            pages: BTreeMap::from([("From API".to_string(), String::new())]),
            ..FakeWiki::default()
        };
        let pages_file = dir.path().join("all_pages.txt");

        assert_eq!(
            resolve_remote_titles(&wiki, Some(" One "), &pages_file),
            vec!["One"]
        );
        assert_eq!(
            resolve_remote_titles(&wiki, None, &pages_file),
            vec!["From API"]
        );

        fs::write(&pages_file, "A\nB\n").unwrap();
        assert_eq!(resolve_remote_titles(&wiki, None, &pages_file), vec!["A", "B"]);
    }

    #[test]
    fn download_rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let wiki = FakeWiki::default();
        for name in ["../x.png", "a/b.png", "..", ""] {
            let outcome = download_image(&wiki, name, dir.path(), false).unwrap();
            assert_eq!(outcome, ImageOutcome::Rejected, "{name:?}");
        }
    }

    #[test]
    fn download_skips_existing_and_reports_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("have.png"), b"x").unwrap();
        let wiki = FakeWiki {
            images: BTreeMap::from([("new.png".to_string(), b"PNG".to_vec())]),
            ..FakeWiki::default()
        };

        assert_eq!(
            download_image(&wiki, "have.png", dir.path(), false).unwrap(),
            ImageOutcome::AlreadyPresent
        );
        assert_eq!(
            download_image(&wiki, "new.png", dir.path(), true).unwrap(),
            ImageOutcome::WouldDownload
        );
        assert!(!dir.path().join("new.png").exists());
        assert_eq!(
            download_image(&wiki, "new.png", dir.path(), false).unwrap(),
            ImageOutcome::Downloaded
        );
        assert_eq!(fs::read(dir.path().join("new.png")).unwrap(), b"PNG");
        assert_eq!(
            download_image(&wiki, "gone.png", dir.path(), false).unwrap(),
            ImageOutcome::NotFound
        );
    }

    #[test]
    fn remote_batch_writes_pages_images_and_redirects() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        let wiki = FakeWiki {
            pages: BTreeMap::from([(
                "Main Page".to_string(),
                "== Hi ==\n[[File:logo.png|Logo]] [[Other]]\n".to_string(),
            )]),
            redirects: BTreeMap::from([("Home".to_string(), "Main Page".to_string())]),
            images: BTreeMap::from([("logo.png".to_string(), b"PNG".to_vec())]),
            ..FakeWiki::default()
        };

        let titles = vec!["Main Page".to_string(), "Missing".to_string()];
        let summary = convert_remote(&wiki, &Converter::default(), &opts, &titles).unwrap();

        assert_eq!(summary.converted, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.redirects, 1);
        assert_eq!(summary.images_downloaded, 1);

        let page = fs::read_to_string(opts.docs_dir.join("Main_Page.md")).unwrap();
        assert_eq!(
            page,
            "## Hi\n![Logo](assets/logo.png) [Other](Other.md)\n"
        );
        let stub = fs::read_to_string(opts.docs_dir.join("Home.md")).unwrap();
        assert!(stub.starts_with("---\nredirect_to: Main_Page.md\n---\n"));
        assert!(opts.assets_dir.join("logo.png").exists());
    }

    #[test]
    fn colliding_titles_keep_the_first_page() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        let wiki = FakeWiki {
            pages: BTreeMap::from([
                ("A B".to_string(), "first".to_string()),
                ("A/B".to_string(), "second".to_string()),
            ]),
            // a redirect whose stub would land on a page written above.
            redirects: BTreeMap::from([("A:B".to_string(), "Elsewhere".to_string())]),
            ..FakeWiki::default()
        };

        let titles = vec!["A B".to_string(), "A/B".to_string()];
        let summary = convert_remote(&wiki, &Converter::default(), &opts, &titles).unwrap();

        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.redirects, 0);
        assert_eq!(
            fs::read_to_string(opts.docs_dir.join("A_B.md")).unwrap(),
            "first"
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.dry_run = true;
        fs::create_dir_all(&opts.source_dir).unwrap();
        fs::write(opts.source_dir.join("Page.mediawiki"), "[[File:a.png]]").unwrap();
        let wiki = FakeWiki {
            images: BTreeMap::from([("a.png".to_string(), b"x".to_vec())]),
            ..FakeWiki::default()
        };

        let summary =
            convert_local(&Converter::default(), &opts, None, None, Some(&wiki)).unwrap();

        assert_eq!(summary.converted, 1);
        assert!(!opts.docs_dir.exists());
        assert!(wiki.fetched_images.borrow().is_empty());
    }

    #[test]
    fn local_batch_is_sorted_and_lossy() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        fs::create_dir_all(&opts.source_dir).unwrap();
        fs::write(opts.source_dir.join("b.mediawiki"), b"''bad \xff byte''").unwrap();
        fs::write(opts.source_dir.join("a.mediawiki"), "'''ok'''").unwrap();
        fs::write(opts.source_dir.join("notes.txt"), "ignored").unwrap();

        let sources = local_sources(&opts.source_dir).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mediawiki", "b.mediawiki"]);

        let summary = convert_local(&Converter::default(), &opts, None, None, None).unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(
            fs::read_to_string(opts.docs_dir.join("a.md")).unwrap(),
            "**ok**"
        );
        assert_eq!(
            fs::read_to_string(opts.docs_dir.join("b.md")).unwrap(),
            "*bad \u{fffd} byte*"
        );
    }

    #[test]
    fn local_single_file_honours_output_path() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        let src = dir.path().join("one.mediawiki");
        let out = dir.path().join("custom").join("out.md");
        fs::write(&src, "==T==").unwrap();

        convert_local(&Converter::default(), &opts, Some(&src), Some(&out), None).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "## T");
    }

    #[test]
    fn missing_source_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        let err = convert_local(&Converter::default(), &opts, None, None, None).unwrap_err();
        assert!(err.to_string().contains("mediawiki directory not found"));
    }
}
