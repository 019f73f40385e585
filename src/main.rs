//! sitepatch - edit the copy of a static site without touching its markup

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitepatch::content::Reconciler;
use sitepatch::dom::Document;
use sitepatch::util::{decode_html, now_millis};
use sitepatch::{BuiltConfig, ContentStore, Publisher, SiteConfig, extract_all};

#[derive(Parser)]
#[command(name = "sitepatch")]
#[command(version, about = "Extract and write back the editable content of a static page", long_about = None)]
#[command(after_help = "EXAMPLES:
    sitepatch extract index.html > store.json           Dump editable content
    sitepatch apply index.html store.json -o out.html   Write edits back
    sitepatch publish out.html --sha 3d21ec5            Print the contents-API body
    sitepatch upload-image team.png                     Print the image upload body")]
struct Cli {
    /// Site configuration (JSON); defaults are used for anything missing
    #[arg(short, long, global = true, value_name = "JSON")]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the editable content of every section as JSON
    Extract {
        #[arg(value_name = "HTML")]
        input: PathBuf,
    },
    /// Reconcile a page with an edited store
    Apply {
        #[arg(value_name = "HTML")]
        input: PathBuf,

        /// Store JSON; rewritten with the locators of materialized items
        #[arg(value_name = "STORE_JSON")]
        store: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
    /// Print the contents-API request body for a page
    Publish {
        #[arg(value_name = "HTML")]
        input: PathBuf,

        /// Blob sha of the file being replaced
        #[arg(long)]
        sha: Option<String>,
    },
    /// Print the contents-API request body that uploads an image
    UploadImage {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
    /// List the configured sections
    Sections,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> sitepatch::Result<BuiltConfig> {
    match path {
        Some(path) => SiteConfig::from_json_file(path)?.build(),
        None => SiteConfig::default().build(),
    }
}

/// Read a page, decoding legacy charsets the way the browser would.
fn read_page(path: &Path) -> sitepatch::Result<String> {
    Ok(decode_html(&fs::read(path)?).into_owned())
}

fn run(cli: &Cli) -> sitepatch::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Extract { input } => {
            let doc = Document::parse(&read_page(input)?)?;
            let store = extract_all(&doc, &config.sections, &config.rules);
            println!("{}", serde_json::to_string_pretty(&store)?);
        }
        Command::Apply {
            input,
            store: store_path,
            output,
        } => {
            let html = read_page(input)?;
            let mut store: ContentStore = serde_json::from_str(&fs::read_to_string(store_path)?)?;

            let (result, report) = Reconciler::from_config(&config).run(&html, &mut store)?;
            match output {
                Some(path) => fs::write(path, &result)?,
                None => print!("{result}"),
            }
            fs::write(store_path, serde_json::to_string_pretty(&store)?)?;

            eprintln!(
                "{} written, {} skipped, {} protected, {} added",
                report.written, report.skipped, report.protected, report.materialized
            );
            for section in &report.missing_sections {
                eprintln!("warning: section `{section}` not found");
            }
        }
        Command::Publish { input, sha } => {
            let html = read_page(input)?;
            let mut publisher = Publisher::new(config.publish.clone());
            if let Some(sha) = sha {
                publisher = publisher.with_sha(sha.as_str());
            }
            eprintln!("PUT {}", publisher.endpoint());
            println!("{}", serde_json::to_string_pretty(&publisher.prepare(&html))?);
        }
        Command::UploadImage { image } => {
            let name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let publisher = Publisher::new(config.publish.clone());
            let request = publisher.prepare_image(&name, &fs::read(image)?, now_millis());
            eprintln!("PUT {}", publisher.endpoint_for(&request.path));
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Command::Sections => {
            for section in config.sections.iter() {
                println!("{:<16} {:<24} {}", section.id, section.title, section.selector);
            }
        }
    }
    Ok(())
}
