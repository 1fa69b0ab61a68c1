//! Semreg CLI
//!
//! Command-line front end for a file-backed registry:
//! - Publishing advertisements and defining requests from JSON profile documents
//! - Discovering advertisements for a request (index first, live fallback)
//! - Administrative reclassification of the whole population
//! - Checking that the configured taxonomy loads and classifies

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use semreg_directory::RecordId;
use semreg_match::{DiscoveryPath, EngineConfig, IndexLookup, PublishStatus};
use semreg_oracle::TaxonomySource;
use semreg_profile::Concept;
use std::path::{Path, PathBuf};

mod registry;

use registry::{read_profiles, Registry};

#[derive(Parser)]
#[command(name = "semreg")]
#[command(author, version, about = "Semreg: semantic service registry")]
struct Cli {
    /// Engine configuration (JSON). Defaults apply when the file is absent.
    #[arg(long, global = true, default_value = "semreg.json")]
    config: PathBuf,

    /// Directory holding the registry's records and defined requests.
    #[arg(long, global = true, default_value = ".semreg")]
    data_dir: PathBuf,

    /// Override the configured taxonomy with this RDF file.
    #[arg(long, global = true)]
    taxonomy: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish advertisements and index them against every known request.
    Publish {
        /// Profile documents, or directories of `.json` profile documents
        #[arg(required = true)]
        profiles: Vec<PathBuf>,
    },

    /// Define requests and index every advertisement that satisfies them.
    DefineRequest {
        #[arg(required = true)]
        profiles: Vec<PathBuf>,
    },

    /// Remove a request and prune its index entries.
    RemoveRequest { uri: String },

    /// Remove an advertisement (and its index entries).
    Remove { uri: String },

    /// Find advertisements satisfying a request profile.
    Discover { profile: PathBuf },

    /// Look up a request URI in the index only.
    Lookup { uri: String },

    /// Re-run every request against every advertisement.
    Reclassify,

    /// Taxonomy commands.
    Taxonomy {
        #[command(subcommand)]
        command: TaxonomyCommands,
    },

    /// Write the effective configuration to `--config`.
    InitConfig,
}

#[derive(Subcommand)]
enum TaxonomyCommands {
    /// Load and classify the configured taxonomy and list its requests.
    Check,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = if cli.config.exists() {
        EngineConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        EngineConfig::default()
    };
    if let Some(taxonomy) = &cli.taxonomy {
        config.taxonomy = TaxonomySource::file(taxonomy);
    }
    tracing::debug!(
        config = %cli.config.display(),
        taxonomy = %config.taxonomy.describe(),
        reasoner = ?config.reasoner,
        "configuration loaded"
    );
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    if let Commands::InitConfig = cli.command {
        return cmd_init_config(&config, &cli.config);
    }

    let registry = Registry::open(config, &cli.data_dir)?;
    match cli.command {
        Commands::Publish { profiles } => cmd_publish(&registry, &profiles).await,
        Commands::DefineRequest { profiles } => cmd_define_request(&registry, &profiles).await,
        Commands::RemoveRequest { uri } => cmd_remove_request(&registry, &uri).await,
        Commands::Remove { uri } => cmd_remove(&registry, &uri).await,
        Commands::Discover { profile } => cmd_discover(&registry, &profile).await,
        Commands::Lookup { uri } => cmd_lookup(&registry, &uri).await,
        Commands::Reclassify => cmd_reclassify(&registry).await,
        Commands::Taxonomy {
            command: TaxonomyCommands::Check,
        } => cmd_taxonomy_check(&registry).await,
        Commands::InitConfig => Ok(()),
    }
}

fn cmd_init_config(config: &EngineConfig, path: &Path) -> Result<()> {
    config.save(path)?;
    eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    Ok(())
}

async fn cmd_publish(registry: &Registry, paths: &[PathBuf]) -> Result<()> {
    for profile in read_profiles(paths)? {
        let id = profile.id().clone();
        println!("{} {}", "Publishing".green().bold(), id);
        let outcome = registry
            .coordinator()
            .on_advertisement_published(profile)
            .await
            .with_context(|| format!("publishing {id}"))?;
        match outcome.status {
            PublishStatus::Indexed(requests) => {
                println!("  Matches {} request(s)", requests.len());
                for request in requests {
                    println!("    {}", request.to_string().cyan());
                }
            }
            PublishStatus::NoImmediateMatch => {
                println!("  {}", "No immediate match".yellow());
            }
        }
    }
    Ok(())
}

async fn cmd_define_request(registry: &Registry, paths: &[PathBuf]) -> Result<()> {
    for profile in read_profiles(paths)? {
        let id = profile.id().clone();
        println!("{} {}", "Defining request".green().bold(), id);
        let outcome = registry
            .define_request(profile)
            .await
            .with_context(|| format!("defining {id}"))?;
        println!(
            "  {} advertisement(s) match, {} new index entr(ies)",
            outcome.matched.len(),
            outcome.entries_added
        );
        print_records(&outcome.matched);
    }
    Ok(())
}

async fn cmd_remove_request(registry: &Registry, uri: &str) -> Result<()> {
    let request = Concept::parse(uri)?;
    let pruned = registry.coordinator().on_request_removed(&request).await?;
    registry.save_requests()?;
    println!(
        "{} {} ({} record(s) pruned)",
        "Removed request".green().bold(),
        request,
        pruned
    );
    Ok(())
}

async fn cmd_remove(registry: &Registry, uri: &str) -> Result<()> {
    let id = RecordId::new(Concept::parse(uri)?.into_string());
    if registry.coordinator().on_advertisement_removed(&id).await? {
        println!("{} {}", "Removed".green().bold(), id);
    } else {
        println!("{} {} not found", "info:".yellow().bold(), id);
    }
    Ok(())
}

async fn cmd_discover(registry: &Registry, path: &Path) -> Result<()> {
    let mut profiles = read_profiles(&[path.to_path_buf()])?;
    let Some(request) = profiles.pop() else {
        anyhow::bail!("no profile document found at {}", path.display());
    };
    println!("{} {}", "Discovering".green().bold(), request.id());
    let discovery = registry.coordinator().discover(request).await?;
    let path = match discovery.answered_by {
        DiscoveryPath::Index => "index",
        DiscoveryPath::Live => "live matching",
    };
    println!(
        "  {} advertisement(s) via {}",
        discovery.advertisements.len(),
        path.cyan()
    );
    print_records(&discovery.advertisements);
    if !discovery.skipped.is_empty() {
        println!(
            "  {} {} candidate(s) skipped",
            "warning:".yellow().bold(),
            discovery.skipped.len()
        );
    }
    Ok(())
}

async fn cmd_lookup(registry: &Registry, uri: &str) -> Result<()> {
    let request = Concept::parse(uri)?;
    match registry.coordinator().lookup_by_index(&request).await? {
        IndexLookup::Hits(records) => {
            println!("{} {} hit(s)", "Indexed".green().bold(), records.len());
            print_records(&records);
        }
        IndexLookup::NotIndexable => {
            println!(
                "{} namespace {} is not indexed; use `semreg discover`",
                "info:".yellow().bold(),
                request.namespace()
            );
        }
    }
    Ok(())
}

async fn cmd_reclassify(registry: &Registry) -> Result<()> {
    println!("{}", "Reclassifying".green().bold());
    let report = registry.coordinator().reclassify_all().await?;
    println!("  Requests: {}", report.requests);
    println!("  Advertisements: {}", report.advertisements);
    println!("  New index entries: {}", report.entries_added);
    if !report.skipped.is_empty() {
        println!("  Skipped: {}", report.skipped.len().to_string().yellow());
    }
    Ok(())
}

async fn cmd_taxonomy_check(registry: &Registry) -> Result<()> {
    let config = registry.coordinator().config();
    println!(
        "{} {}",
        "Checking taxonomy".green().bold(),
        config.taxonomy.describe()
    );
    let summary = registry.coordinator().check_taxonomy().await?;
    println!("  Reasoner: {}", summary.reasoner.cyan());
    println!("  Fingerprint: {}", summary.fingerprint);
    println!("  Concepts: {}", summary.concepts);
    println!("  Requests: {}", summary.requests.len());
    for request in &summary.requests {
        println!("    {}", request.to_string().cyan());
    }
    for malformed in &summary.malformed_requests {
        println!(
            "    {} {}: {}",
            "malformed".red().bold(),
            malformed.id,
            malformed.reason
        );
    }
    println!("{}", "Consistent.".green());
    Ok(())
}

fn print_records<'a>(records: impl IntoIterator<Item = &'a RecordId>) {
    for record in records {
        println!("    {}", record.to_string().cyan());
    }
}
