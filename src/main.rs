//! mw2docs - MediaWiki to Markdown converter and docs link checker

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use mw2docs::Converter;
use mw2docs::batch;
use mw2docs::config::{
    BatchOptions, DEFAULT_INDEX_URL, DEFAULT_PAGES_FILE, ValidateOptions, WikiConfig,
};
use mw2docs::validate;
use mw2docs::wiki::{WikiApi, WikiClient};

#[derive(Debug, Parser)]
#[command(name = "mw2docs")]
#[command(version, about = "Convert MediaWiki pages to Markdown and check the result", long_about = None)]
#[command(after_help = "EXAMPLES:
    mw2docs convert                         Convert mediawiki/*.mediawiki into docs/
    mw2docs convert page.mediawiki -o a.md  Convert one file
    mw2docs convert --remote                Fetch every page from the wiki
    mw2docs validate                        Check docs/ for broken links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert MediaWiki sources to Markdown files
    Convert(ConvertArgs),
    /// Check generated Markdown for broken links and images
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Local mode: a single .mediawiki file. Remote mode: a single page title.
    #[arg(value_name = "INPUT")]
    input: Option<String>,

    /// Output .md path when converting a single local file
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Do not write files, only show what would be done
    #[arg(long)]
    dry_run: bool,

    /// Fetch raw pages from the wiki instead of reading local sources
    #[arg(long)]
    remote: bool,

    /// Page titles (one per line) to fetch in remote mode
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PAGES_FILE)]
    pages_file: PathBuf,

    /// Directory with *.mediawiki sources
    #[arg(long, value_name = "DIR", default_value = "mediawiki")]
    source_dir: PathBuf,

    /// Directory generated documents are written to
    #[arg(long, value_name = "DIR", default_value = "docs")]
    docs_dir: PathBuf,

    /// Wiki index.php URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_INDEX_URL)]
    wiki_url: String,

    /// Do not download referenced images
    #[arg(long)]
    skip_images: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Directory scanned for *.md files
    #[arg(long, value_name = "DIR", default_value = "docs")]
    docs_dir: PathBuf,

    /// References must resolve inside this directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Report missing page links as warnings instead of errors
    #[arg(long)]
    lenient_links: bool,

    /// How many warnings to list in the text report
    #[arg(long, value_name = "N", default_value_t = 10)]
    max_warnings: usize,
}

fn main() -> ExitCode {
    // info by default; RUST_LOG overrides.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(args) => match run_convert(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        },
        Commands::Validate(args) => match run_validate(args) {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_convert(args: ConvertArgs) -> Result<(), Box<dyn Error>> {
    let mut options = BatchOptions::with_dirs(&args.source_dir, &args.docs_dir);
    options.dry_run = args.dry_run;
    options.skip_images = args.skip_images;

    let converter = Converter::default();
    let wiki_config = WikiConfig::with_index_url(&args.wiki_url);

    if args.remote {
        let client = WikiClient::new(wiki_config)?;
        let titles =
            batch::resolve_remote_titles(&client, args.input.as_deref(), &args.pages_file);
        batch::convert_remote(&client, &converter, &options, &titles)?;
        return Ok(());
    }

    // local sources only need the wiki for images.
    let client = if args.skip_images {
        None
    } else {
        Some(WikiClient::new(wiki_config)?)
    };
    let input = args.input.as_ref().map(PathBuf::from);
    let images = client.as_ref().map(|c| c as &dyn WikiApi);
    batch::convert_local(
        &converter,
        &options,
        input.as_deref(),
        args.output.as_deref(),
        images,
    )?;
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<u8, Box<dyn Error>> {
    let options = ValidateOptions {
        root: args.root,
        docs_dir: args.docs_dir,
        missing_links_as_warnings: args.lenient_links,
    };

    let report = validate::validate_docs(&options)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text(args.max_warnings));
    }
    Ok(report.exit_code())
}
