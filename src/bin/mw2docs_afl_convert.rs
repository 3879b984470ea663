//! AFL++ fuzz target for `mw2docs`.
//!
//! This binary is intentionally stdin-driven, so it can be used with AFL++.
//! Build and run it via `cargo-afl`:
//!
//! ```bash
//! cargo install cargo-afl
//!
//! cargo afl build --release --features afl_fuzz --bin mw2docs_afl_convert
//!
//! mkdir -p fuzz/afl/out
//!
//! cargo afl fuzz \
//!   -i fuzz/afl/in \
//!   -o fuzz/afl/out \
//!   target/release/mw2docs_afl_convert
//! ```
//!
//! Rust panics normally unwind and exit with a non-crashing status code.
//! AFL++ only treats crashes as signals/aborts. We therefore catch any unwind
//! and turn it into `abort()`.

use std::io::Read;

use mw2docs::frontmatter::{RedirectStub, redirect_target};
use mw2docs::validate::extract_references;
use mw2docs::{Converter, INVALID_FILENAME_CHARS, sanitize_title};

const MAX_INPUT_LEN: usize = 1_000_000; // 1MB guardrail; AFL++ will typically cap this anyway.

fn run_one_input(data: &[u8]) {
    if data.len() > MAX_INPUT_LEN {
        return;
    }

    // arbitrary bytes; lossy conversion keeps the harness total.
    let src = String::from_utf8_lossy(data).to_string();
    let converter = Converter::default();

    // invariants that must hold for any input:
    // - every pass is total and deterministic
    // - the image list never panics
    // - filenames never carry reserved characters, and sanitizing is idempotent
    // - a redirect stub always reads back its own target
    let md = converter.convert(&src);
    assert_eq!(md, converter.convert(&src), "conversion is not deterministic");
    let _images = converter.image_filenames(&src);

    let first_line = src.lines().next().unwrap_or("");
    let name = sanitize_title(first_line);
    assert!(!name.contains(INVALID_FILENAME_CHARS), "unsanitized: {name:?}");
    assert_eq!(sanitize_title(&name), name);

    // the reader trims, so only targets without surrounding whitespace read back exactly.
    let stub = RedirectStub::new(first_line, converter.config());
    if stub.target_file.trim() == stub.target_file {
        assert_eq!(
            redirect_target(&stub.to_markdown()).as_deref(),
            Some(stub.target_file.as_str()),
            "redirect stub lost its target"
        );
    }

    // the validator's scanner must accept whatever the converter emits.
    let _refs = extract_references(&md);
}

fn main() {
    let mut data = Vec::new();
    std::io::stdin().read_to_end(&mut data).unwrap();

    // convert any panic into an abort().
    if std::panic::catch_unwind(|| run_one_input(&data)).is_err() {
        std::process::abort();
    }
}
