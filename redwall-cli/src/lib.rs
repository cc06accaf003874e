pub use crate::app::{parse_filter, parse_sources, parse_theme, PreferencesUpdate, RedwallApp};

mod app {
    use anyhow::{anyhow, bail, Context, Result};
    use log::{debug, info};
    use redwall_core::wallpaper::SystemShell;
    use redwall_core::*;
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    pub struct RedwallApp {
        config: Config,
        fetch: Arc<dyn Fetch>,
        session: BrowseSession,
        setter: WallpaperSetter,
        target: WallpaperTarget,
    }

    impl RedwallApp {
        pub fn new() -> Result<Self> {
            let config = Config::new().context("Failed to load preferences")?;
            Ok(Self::from_config(config))
        }

        /// Wires the live network client, desktop shell and detected platform.
        pub fn from_config(config: Config) -> Self {
            let fetch: Arc<dyn Fetch> = Arc::new(HttpClient::new(config.network.clone()));
            let client = Arc::new(RedditClient::new(fetch.clone()));
            let aggregator = Aggregator::new(
                client,
                ImageProcessor::new(fetch.clone()),
                config.aggregator.clone(),
            );
            let setter = WallpaperSetter::new(
                fetch.clone(),
                Arc::new(SystemShell),
                config.wallpaper_dir(),
            );
            Self::with_parts(config, fetch, aggregator, setter, WallpaperTarget::detect())
        }

        pub fn with_parts(
            config: Config,
            fetch: Arc<dyn Fetch>,
            aggregator: Aggregator,
            setter: WallpaperSetter,
            target: WallpaperTarget,
        ) -> Self {
            Self {
                config,
                fetch,
                session: BrowseSession::new(aggregator),
                setter,
                target,
            }
        }

        pub fn config(&self) -> &Config {
            &self.config
        }

        pub fn session(&self) -> &BrowseSession {
            &self.session
        }

        /// Sources from the command line, or the saved defaults.
        fn sources_or_default(&self, sources: &[String]) -> Vec<String> {
            if sources.is_empty() {
                self.config.preferences.default_sources.clone()
            } else {
                sources.to_vec()
            }
        }

        pub fn search(
            &mut self,
            sources: &[String],
            filter: Option<ResolutionFilter>,
        ) -> Result<BatchSummary> {
            let sources = self.sources_or_default(sources);
            let filter = filter.or(self.config.preferences.resolution);
            if !has_usable_source(&sources) {
                bail!("No valid subreddit names in '{}'", sources.join(" "));
            }
            debug!("Searching {sources:?} with filter {filter:?}");
            println!("Searching r/{} ...", sources.join(", r/"));
            let pending = self.session.search(&sources, filter);
            drain(pending, 0)
        }

        pub fn load_more(&mut self) -> Result<BatchSummary> {
            let already = self.session.images().len();
            match self.session.load_more() {
                Some(pending) => drain(pending, already),
                None => bail!("No more posts to load, start a new search"),
            }
        }

        pub fn list(&self) {
            if self.session.images().is_empty() {
                println!("No images loaded yet.");
                return;
            }
            for (index, image) in self.session.images().iter().enumerate() {
                println!("{}", format_item(index, image));
            }
        }

        /// `input` is a list index from the current session, a URL, or a
        /// local path.
        pub fn set_wallpaper(&self, input: &str) -> Result<Applied> {
            let target = self.resolve_input(input)?;
            let applied = self
                .setter
                .set_wallpaper(&target, &self.target)
                .with_context(|| format!("Failed to set wallpaper from {target}"))?;
            match &applied {
                Applied::Set(path) => println!("Set wallpaper: {}", path.display()),
                Applied::Unsupported { desktop, path } => println!(
                    "Desktop environment '{desktop}' is not supported; image saved to {}",
                    path.display()
                ),
            }
            Ok(applied)
        }

        /// Saves the full image for a list index or URL into `dest_dir`, or
        /// the user's download directory.
        pub fn download(
            &self,
            input: &str,
            title: Option<&str>,
            dest_dir: Option<&Path>,
        ) -> Result<PathBuf> {
            let (url, default_title) = match self.selected(input) {
                Some(image) => (image.url.clone(), image.title.clone()),
                None => (input.trim().to_string(), String::new()),
            };
            let title = title.unwrap_or(&default_title);
            let dest_dir = dest_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.config.download_dir());
            let path = download_image(self.fetch.as_ref(), &url, title, &dest_dir)
                .with_context(|| format!("Failed to download {url}"))?;
            println!("Downloaded: {}", path.display());
            Ok(path)
        }

        fn selected(&self, input: &str) -> Option<&ProcessedImage> {
            let index: usize = input.trim().parse().ok()?;
            self.session.image(index.checked_sub(1)?)
        }

        fn resolve_input(&self, input: &str) -> Result<String> {
            if let Some(image) = self.selected(input) {
                return Ok(image.url.clone());
            }
            if input.trim().parse::<usize>().is_ok() {
                return Err(anyhow!(
                    "No image #{} in the current list ({} loaded)",
                    input.trim(),
                    self.session.images().len()
                ));
            }
            Ok(input.trim().to_string())
        }

        pub fn show_config(&self) {
            let prefs = &self.config.preferences;
            println!("Preferences file: {}", self.config.preferences_file.display());
            println!("Wallpaper folder: {}", prefs.wallpaper_dir.display());
            println!("Default sources:  {}", prefs.default_sources.join(", "));
            println!("Theme:            {:?}", prefs.theme);
            match prefs.resolution {
                Some(filter) => println!(
                    "Resolution:       {}x{} (±{}px)",
                    filter.desired_width, filter.desired_height, filter.tolerance_px
                ),
                None => println!("Resolution:       any"),
            }
        }

        pub fn update_config(&mut self, update: PreferencesUpdate) -> Result<()> {
            let prefs = &mut self.config.preferences;
            if let Some(dir) = update.wallpaper_dir {
                prefs.wallpaper_dir = dir;
            }
            if !update.sources.is_empty() {
                prefs.default_sources = update.sources;
            }
            if let Some(theme) = update.theme {
                prefs.theme = theme;
            }
            if update.clear_resolution {
                prefs.resolution = None;
            } else if let Some(filter) = update.resolution {
                prefs.resolution = Some(filter);
            }
            self.config.save().context("Failed to save preferences")?;
            info!("Preferences updated");
            Ok(())
        }

        fn show_menu(&self) {
            let loaded = self.session.images().len();
            let sources = if self.session.sources().is_empty() {
                "none".to_string()
            } else {
                self.session.source_names().join(", ")
            };
            let load_more = if self.session.can_load_more() {
                "Load more"
            } else {
                "Load more (unavailable)"
            };

            println!("\n=== Redwall - Reddit Wallpaper Browser ===");
            println!("Sources: {} | Loaded images: {}", sources, loaded);
            println!();
            println!("1. Search");
            println!("2. {}", load_more);
            println!("3. List images");
            println!("4. Set wallpaper");
            println!("5. Download image");
            println!("6. Exit");
            print!("\nSelect an option (1-6): ");
            let _ = io::stdout().flush();
        }

        pub fn run(&mut self) -> Result<()> {
            loop {
                self.show_menu();

                let mut input = String::new();
                if io::stdin().read_line(&mut input)? == 0 {
                    break;
                }

                match input.trim() {
                    "1" => {
                        let sources = parse_sources(&prompt(
                            "Subreddits (comma or space separated, empty for defaults): ",
                        )?);
                        let filter = match prompt("Resolution WxH (empty for any): ")? {
                            res if res.is_empty() => None,
                            res => match parse_filter(&res, None) {
                                Ok(filter) => Some(filter),
                                Err(e) => {
                                    eprintln!("{e}");
                                    continue;
                                }
                            },
                        };
                        if let Err(e) = self.search(&sources, filter) {
                            eprintln!("Search failed: {e:#}");
                        }
                    }
                    "2" => {
                        if let Err(e) = self.load_more() {
                            eprintln!("{e:#}");
                        }
                    }
                    "3" => self.list(),
                    "4" => {
                        let choice = prompt("Image number, URL or file path: ")?;
                        if let Err(e) = self.set_wallpaper(&choice) {
                            eprintln!("{e:#}");
                        }
                    }
                    "5" => {
                        let choice = prompt("Image number or URL: ")?;
                        if let Err(e) = self.download(&choice, None, None) {
                            eprintln!("{e:#}");
                        }
                    }
                    "6" => {
                        println!("Exiting Redwall...");
                        break;
                    }
                    _ => {
                        println!("Invalid option. Please select 1-6.");
                    }
                }
            }

            Ok(())
        }
    }

    /// Changes requested by `redwall config`.
    #[derive(Debug, Default)]
    pub struct PreferencesUpdate {
        pub wallpaper_dir: Option<PathBuf>,
        pub sources: Vec<String>,
        pub theme: Option<Theme>,
        pub resolution: Option<ResolutionFilter>,
        pub clear_resolution: bool,
    }

    fn has_usable_source(sources: &[String]) -> bool {
        sources
            .iter()
            .any(|name| redwall_core::source::normalize_source_name(name).is_some())
    }

    /// Prints items as they arrive, numbered after the `already` loaded ones.
    fn drain(pending: PendingBatch<'_>, already: usize) -> Result<BatchSummary> {
        let mut summary = None;
        for event in pending {
            match event {
                BatchEvent::Item(image) => {
                    println!("{}", format_item(already + image.position_index, &image));
                }
                BatchEvent::Complete(done) => summary = Some(done),
            }
        }
        let summary = summary.context("Fetch worker stopped before completing the batch")?;

        println!("Loaded {} image(s).", summary.accepted);
        if !summary.failed_sources.is_empty() {
            println!("Unreachable sources: {}", summary.failed_sources.join(", "));
        }
        if summary.exhausted {
            println!("No more posts in these sources.");
        }
        Ok(summary)
    }

    fn format_item(index: usize, image: &ProcessedImage) -> String {
        format!(
            "{:>3}. [{}] {} ({}x{})\n     {}",
            index + 1,
            image.source_label,
            image.title,
            image.width,
            image.height,
            image.url
        )
    }

    fn prompt(label: &str) -> Result<String> {
        print!("{label}");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    /// Splits `earthporn, wallpapers r/spaceporn` into names.
    pub fn parse_sources(input: &str) -> Vec<String> {
        input
            .split([',', ' ', '\t'])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// `1920x1080` with an optional tolerance, 100px by default.
    pub fn parse_filter(resolution: &str, tolerance: Option<u32>) -> Result<ResolutionFilter> {
        let (width, height) = parse_resolution(resolution)
            .ok_or_else(|| anyhow!("Invalid resolution '{resolution}', expected WIDTHxHEIGHT"))?;
        Ok(ResolutionFilter::new(width, height, tolerance.unwrap_or(100)))
    }

    pub fn parse_theme(input: &str) -> Result<Theme> {
        match input.trim().to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => bail!("Unknown theme '{other}', expected dark or light"),
        }
    }

}
