//! Reddit wallpaper browsing: listings, previews, batches, and setting the
//! desktop background.

pub mod aggregator;
pub mod config;
pub mod delivery;
pub mod download;
pub mod error;
pub mod filter;
pub mod http;
pub mod preview;
pub mod session;
pub mod source;
pub mod wallpaper;

pub use aggregator::{per_source_limit, Aggregator, BatchOutcome, BatchRequest};
pub use config::{AggregatorSettings, Config, CursorPolicy, NetworkSettings, Preferences, Theme};
pub use delivery::{BatchEvent, BatchReceiver, BatchSummary, ProcessedImage};
pub use download::{download_image, sanitize_title};
pub use error::{Error, Result};
pub use filter::{parse_resolution, ResolutionFilter};
pub use http::{Fetch, HttpClient};
pub use preview::ImageProcessor;
pub use session::{BrowseSession, PendingBatch};
pub use source::{Post, RedditClient, Source, SourceClient};
pub use wallpaper::{Applied, Desktop, OsKind, WallpaperSetter, WallpaperTarget};
