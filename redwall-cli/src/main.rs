use anyhow::Result;
use clap::{Parser, Subcommand};
use redwall_cli::{parse_filter, parse_sources, parse_theme, PreferencesUpdate, RedwallApp};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "redwall", version, about = "Browse Reddit wallpapers and set them as your desktop background")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Args, Default)]
struct SearchArgs {
    /// Subreddits to browse, comma or space separated. Defaults to saved preferences.
    #[arg(short, long)]
    sources: Vec<String>,
    /// Only keep images near WIDTHxHEIGHT, in either orientation.
    #[arg(short, long)]
    resolution: Option<String>,
    /// Allowed deviation in pixels for --resolution.
    #[arg(short, long)]
    tolerance: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive browser (default).
    Browse(SearchArgs),
    /// Fetch one batch and print it.
    Fetch(SearchArgs),
    /// Set a URL or local image as the wallpaper.
    Set { input: String },
    /// Save the full-size image to disk.
    Download {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Show preferences, or update them when options are given.
    Config {
        #[arg(long)]
        wallpaper_dir: Option<PathBuf>,
        #[arg(long)]
        sources: Vec<String>,
        #[arg(long)]
        theme: Option<String>,
        #[arg(long, conflicts_with = "clear_resolution")]
        resolution: Option<String>,
        #[arg(long, requires = "resolution")]
        tolerance: Option<u32>,
        #[arg(long)]
        clear_resolution: bool,
    },
}

impl SearchArgs {
    fn split(&self) -> Result<(Vec<String>, Option<redwall_core::ResolutionFilter>)> {
        let sources = self.sources.iter().flat_map(|s| parse_sources(s)).collect();
        let filter = self
            .resolution
            .as_deref()
            .map(|res| parse_filter(res, self.tolerance))
            .transpose()?;
        Ok((sources, filter))
    }
}

fn init_logging() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut app = RedwallApp::new()?;

    match cli.command.unwrap_or(Command::Browse(SearchArgs::default())) {
        Command::Browse(args) => {
            let (sources, filter) = args.split()?;
            println!("Redwall started successfully!");
            if !sources.is_empty() || filter.is_some() {
                if let Err(e) = app.search(&sources, filter) {
                    eprintln!("Search failed: {e:#}");
                }
            }
            app.run()?;
        }
        Command::Fetch(args) => {
            let (sources, filter) = args.split()?;
            app.search(&sources, filter)?;
        }
        Command::Set { input } => {
            app.set_wallpaper(&input)?;
        }
        Command::Download { url, title, dir } => {
            app.download(&url, title.as_deref(), dir.as_deref())?;
        }
        Command::Config {
            wallpaper_dir,
            sources,
            theme,
            resolution,
            tolerance,
            clear_resolution,
        } => {
            let update = PreferencesUpdate {
                wallpaper_dir,
                sources: sources.iter().flat_map(|s| parse_sources(s)).collect(),
                theme: theme.as_deref().map(parse_theme).transpose()?,
                resolution: resolution
                    .as_deref()
                    .map(|res| parse_filter(res, tolerance))
                    .transpose()?,
                clear_resolution,
            };
            let changed = update.wallpaper_dir.is_some()
                || !update.sources.is_empty()
                || update.theme.is_some()
                || update.resolution.is_some()
                || update.clear_resolution;
            if changed {
                app.update_config(update)?;
            }
            app.show_config();
        }
    }

    Ok(())
}
