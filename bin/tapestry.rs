use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tapestry::{Fabric, FabricConfig, SearchProfile, SearchSettings, Severity, Silence};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tapestry")]
#[command(about = "Load an annotated text corpus and search it with templates", long_about = None)]
struct Args {
    /// Directories holding feature files; later ones win
    #[arg(long, env = "TAPESTRY_LOCATIONS", value_delimiter = ',', required = true)]
    locations: Vec<PathBuf>,

    /// Subdirectories tried under every location
    #[arg(long, env = "TAPESTRY_MODULES", value_delimiter = ',')]
    modules: Vec<String>,

    /// Features to load (comma separated)
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,

    /// Load every feature of the dataset
    #[arg(long)]
    all: bool,

    /// Print the features of the dataset by kind, as JSON
    #[arg(long)]
    explore: bool,

    /// Template file to search with
    #[arg(long)]
    template: Option<PathBuf>,

    /// Print the search plan
    #[arg(long)]
    plan: bool,

    /// Print the number of results instead of the results
    #[arg(long)]
    count: bool,

    /// Maximum number of results
    #[arg(long)]
    limit: Option<usize>,

    /// Planner profile (quick, balanced, thorough)
    #[arg(long, env = "TAPESTRY_PROFILE", default_value = "balanced")]
    profile: String,

    /// Do not read or write binary caches
    #[arg(long)]
    no_cache: bool,

    /// Remove binary caches before loading
    #[arg(long)]
    clear_cache: bool,

    /// Only report warnings and errors of the message log
    #[arg(long)]
    terse: bool,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting tapestry v{}", tapestry::VERSION);

    let profile = match args.profile.to_lowercase().as_str() {
        "quick" => SearchProfile::Quick,
        "balanced" => SearchProfile::Balanced,
        "thorough" => SearchProfile::Thorough,
        _ => {
            warn!("Unknown profile '{}', using 'balanced'", args.profile);
            SearchProfile::Balanced
        }
    };

    let mut config = FabricConfig::default()
        .with_cache(!args.no_cache)
        .with_silence(if args.terse { Silence::Terse } else { Silence::Off });
    for location in &args.locations {
        config = config.with_location(location);
    }
    if !args.modules.is_empty() {
        config = config.with_modules(args.modules.iter().cloned());
    }

    info!("Configuration:");
    info!("  Locations: {:?}", config.locations);
    info!("  Modules: {:?}", config.modules);
    info!("  Cache: {}", config.use_cache);

    let settings = SearchSettings::default().with_profile(profile);
    let mut fabric = Fabric::new(config).with_search_settings(settings);
    if args.clear_cache {
        let removed = fabric.clear_cache()?;
        info!("Removed {} cache files", removed);
    }

    let loaded = if args.all {
        fabric.load_all().is_some()
    } else {
        fabric.load(&args.features, false).is_some()
    };
    if !loaded {
        eprintln!("{}", fabric.log().render());
        bail!("dataset could not be loaded");
    }

    if args.explore {
        let overview = fabric.explore();
        println!("{}", serde_json::to_string_pretty(&overview)?);
    }

    if let Some(path) = &args.template {
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read template {}", path.display()))?;
        if let Err(err) = fabric.study(&template) {
            eprintln!("{}", fabric.log().render());
            bail!(err);
        }
        if args.plan {
            println!("{}", fabric.show_plan(true)?);
        }
        if args.count {
            println!("{}", fabric.count(args.limit)?);
        } else {
            for tuple in fabric.fetch(args.limit)? {
                let nodes: Vec<String> = tuple.iter().map(u32::to_string).collect();
                println!("{}\t{}", nodes.join(" "), fabric.glean(&tuple)?);
            }
        }
    }

    let problems: Vec<String> = fabric
        .log()
        .at_least(Severity::Warning)
        .map(ToString::to_string)
        .collect();
    for problem in problems {
        eprintln!("{}", problem);
    }
    Ok(())
}
