use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use stem_studio::model::registry::load_registry;
use stem_studio::{
    ensure_model, load_model, set_download_progress, split_file, ServeOptions, StemConfig,
};

#[derive(Parser)]
#[command(name = "stem-studio")]
#[command(about = "Split audio into stems with a pretrained separation model", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive web front-end
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8585")]
        addr: String,

        /// Model to load (registry name; empty picks the default)
        #[arg(short, long, default_value = "")]
        model: String,

        /// Fetch the manifest from this URL instead of the registry
        #[arg(long)]
        manifest_url: Option<String>,

        /// Maximum accepted upload size in mebibytes
        #[arg(long, default_value_t = 64)]
        max_upload_mib: usize,

        /// How many finished jobs keep their downloads available
        #[arg(long, default_value_t = 8)]
        retain_jobs: usize,
    },

    /// Split one local file without the web front-end
    Split {
        /// Input audio file (mp3 or wav)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving one WAV per stem
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Stem configuration: 2stem or 4stem
        #[arg(short, long, default_value = "4stem")]
        config: StemConfig,

        /// Model to load (registry name; empty picks the default)
        #[arg(short, long, default_value = "")]
        model: String,

        /// Fetch the manifest from this URL instead of the registry
        #[arg(long)]
        manifest_url: Option<String>,
    },

    /// Download and cache a model ahead of time
    Prepare {
        /// Model to fetch (registry name; empty picks the default)
        #[arg(short, long, default_value = "")]
        model: String,

        /// Fetch the manifest from this URL instead of the registry
        #[arg(long)]
        manifest_url: Option<String>,
    },

    /// Print the model registry
    List,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stem_studio=info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve {
            addr,
            model,
            manifest_url,
            max_upload_mib,
            retain_jobs,
        } => handle_serve(addr, model, manifest_url, max_upload_mib, retain_jobs),
        Commands::Split {
            input,
            output,
            config,
            model,
            manifest_url,
        } => handle_split(input, output, config, model, manifest_url),
        Commands::Prepare {
            model,
            manifest_url,
        } => handle_prepare(model, manifest_url),
        Commands::List => handle_list(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn handle_serve(
    addr: String,
    model: String,
    manifest_url: Option<String>,
    max_upload_mib: usize,
    retain_jobs: usize,
) -> anyhow::Result<()> {
    let opts = ServeOptions {
        addr,
        model,
        manifest_url_override: manifest_url,
        max_upload_bytes: max_upload_mib * 1024 * 1024,
        retain_jobs,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(stem_studio::serve(opts))?;
    Ok(())
}

fn handle_split(
    input: PathBuf,
    output: PathBuf,
    config: StemConfig,
    model: String,
    manifest_url: Option<String>,
) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("input file not found: {}", input.display());
    }

    install_progress_line();
    let separator = load_model(&model, manifest_url.as_deref())?;
    let files = split_file(&separator, &input, &output, config)?;

    eprintln!("split complete ({config}):");
    for stem in &files {
        eprintln!("  {:<14} {}", stem.name, stem.path.display());
    }
    Ok(())
}

fn handle_prepare(model: String, manifest_url: Option<String>) -> anyhow::Result<()> {
    install_progress_line();
    let handle = ensure_model(&model, manifest_url.as_deref())?;
    eprintln!("cached at {}", handle.local_path.display());
    eprintln!(
        "model `{}` v{} produces: {}",
        handle.manifest.name,
        handle.manifest.version,
        handle.manifest.stems.join(", ")
    );
    Ok(())
}

fn handle_list() -> anyhow::Result<()> {
    let registry = load_registry()?;
    eprintln!("available models:");
    for entry in &registry.models {
        let marker = if entry.name == registry.default {
            " (default)"
        } else {
            ""
        };
        eprintln!("  {}{}", entry.name, marker);
    }
    Ok(())
}

fn install_progress_line() {
    set_download_progress(|done, total| {
        if total > 0 {
            let percent = (done as f64 / total as f64 * 100.0).round() as u64;
            eprint!(
                "\rdownloading model: {percent:>3}% ({:.1} MiB / {:.1} MiB)",
                done as f64 / 1_048_576.0,
                total as f64 / 1_048_576.0
            );
            if done >= total {
                eprintln!();
            }
        } else {
            eprint!("\rdownloading model: {:.1} MiB", done as f64 / 1_048_576.0);
        }
    });
}
