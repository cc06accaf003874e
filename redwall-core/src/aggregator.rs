use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{AggregatorSettings, CursorPolicy, MIN_PER_SOURCE_LIMIT};
use crate::delivery::{self, BatchReceiver, BatchSender, BatchSummary, ProcessedImage};
use crate::error::{Error, Result};
use crate::filter::{is_raster_url, ResolutionFilter};
use crate::preview::{ImageProcessor, Preview};
use crate::source::{Post, Source, SourceClient};

/// Splits the request budget across feeds, never below the floor.
pub fn per_source_limit(total_limit: usize, source_count: usize) -> usize {
    if source_count == 0 {
        return total_limit.max(MIN_PER_SOURCE_LIMIT);
    }
    (total_limit / source_count).max(MIN_PER_SOURCE_LIMIT)
}

#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub sources: Vec<Source>,
    pub filter: Option<ResolutionFilter>,
    pub max_items: usize,
    /// URLs already shown in this session.
    pub skip_urls: HashSet<String>,
}

/// Result of a cycle collected in one piece.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub batch: Vec<ProcessedImage>,
    pub summary: BatchSummary,
}

/// Runs fetch cycles over several feeds.
#[derive(Clone)]
pub struct Aggregator {
    client: Arc<dyn SourceClient>,
    processor: ImageProcessor,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(
        client: Arc<dyn SourceClient>,
        processor: ImageProcessor,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            client,
            processor,
            settings,
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Runs one cycle on the calling thread and collects the batch.
    pub fn fetch_batch(
        &self,
        sources: &[Source],
        filter: Option<&ResolutionFilter>,
        max_items: usize,
    ) -> BatchOutcome {
        let request = BatchRequest {
            sources: sources.to_vec(),
            filter: filter.copied(),
            max_items,
            skip_urls: HashSet::new(),
        };
        let mut batch = Vec::new();
        let summary = self.run_cycle(&request, &mut self.rng(), |image| {
            batch.push(image);
            true
        });
        BatchOutcome { batch, summary }
    }

    /// Runs one cycle on a background thread. Items arrive on the receiver as
    /// they are accepted.
    pub fn spawn_batch(&self, request: BatchRequest) -> BatchReceiver {
        let (tx, rx) = delivery::channel();
        let aggregator = self.clone();
        let worker = thread::spawn(move || aggregator.deliver(&request, &tx));
        BatchReceiver::new(rx, Some(worker))
    }

    fn deliver(&self, request: &BatchRequest, tx: &BatchSender) {
        let summary = self.run_cycle(request, &mut self.rng(), |image| tx.item(image));
        if !tx.complete(summary) {
            debug!("Batch consumer went away before completion");
        }
    }

    fn rng(&self) -> StdRng {
        match self.settings.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// `emit` returns false when nobody is listening any more; the cycle then
    /// stops without processing further candidates.
    pub fn run_cycle<R, F>(&self, request: &BatchRequest, rng: &mut R, mut emit: F) -> BatchSummary
    where
        R: Rng + ?Sized,
        F: FnMut(ProcessedImage) -> bool,
    {
        let max_items = request.max_items.min(self.settings.max_items);
        let PageCollection { mut pool, mut summary } = self.collect_pages(&request.sources);
        pool.shuffle(rng);

        let mut seen = request.skip_urls.clone();
        let candidates: Vec<Post> = pool
            .into_iter()
            .filter(|post| is_raster_url(&post.image_url))
            .filter(|post| seen.insert(post.image_url.clone()))
            .collect();
        debug!("{} raster candidates after shuffle", candidates.len());

        let workers = self.settings.workers.max(1);
        let mut accepted = 0;
        let mut next = 0;
        'walk: while next < candidates.len() && accepted < max_items {
            let window = workers.min(max_items - accepted);
            let end = (next + window).min(candidates.len());
            let chunk = &candidates[next..end];
            next = end;

            for (post, result) in chunk.iter().zip(self.process_window(chunk)) {
                let preview = match result {
                    Ok(preview) => preview,
                    Err(e) => {
                        debug!("Skipping {}: {e}", post.image_url);
                        continue;
                    }
                };
                if let Some(filter) = &request.filter {
                    if !filter.matches(preview.width, preview.height) {
                        debug!(
                            "Skipping {} ({}x{}): outside resolution filter",
                            post.image_url, preview.width, preview.height
                        );
                        continue;
                    }
                }

                let image = ProcessedImage {
                    url: post.image_url.clone(),
                    title: post.title.clone(),
                    source_label: format!("r/{}", post.source_name),
                    width: preview.width,
                    height: preview.height,
                    preview_bytes: preview.preview_bytes,
                    position_index: accepted,
                };
                accepted += 1;
                if !emit(image) {
                    info!("Batch consumer went away, stopping after {accepted} items");
                    break 'walk;
                }
                if accepted >= max_items {
                    break 'walk;
                }
            }
        }

        info!(
            "Batch complete: {accepted} accepted, exhausted={}",
            summary.exhausted
        );
        summary.accepted = accepted;
        summary
    }

    fn process_window(&self, chunk: &[Post]) -> Vec<Result<Preview>> {
        if chunk.len() == 1 {
            return vec![self.processor.process(&chunk[0].image_url)];
        }
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|post| scope.spawn(move || self.processor.process(&post.image_url)))
                .collect();
            handles
                .into_iter()
                .zip(chunk)
                .map(|(handle, post)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(Error::Decode {
                            url: post.image_url.clone(),
                            reason: "image worker panicked".to_string(),
                        })
                    })
                })
                .collect()
        })
    }

    fn collect_pages(&self, sources: &[Source]) -> PageCollection {
        let limit = per_source_limit(self.settings.total_limit, sources.len());
        let mut updated = sources.to_vec();
        let mut pool = Vec::new();
        let mut failed_sources = Vec::new();
        let mut session_cursor = None;
        let mut any_returned_posts = false;
        let mut any_cursor = false;

        for (source, slot) in sources.iter().zip(updated.iter_mut()) {
            match self.client.fetch(&source.name, source.cursor.as_deref(), limit) {
                Ok(page) => {
                    debug!(
                        "r/{}: {} posts, next cursor {:?}",
                        source.name,
                        page.posts.len(),
                        page.next_cursor
                    );
                    any_cursor |= page.next_cursor.is_some();
                    if !page.posts.is_empty() {
                        any_returned_posts = true;
                        session_cursor = page.next_cursor.clone();
                    }
                    slot.cursor = page.next_cursor;
                    pool.extend(page.posts);
                }
                Err(e) => {
                    warn!("Failed to fetch r/{}: {e}", source.name);
                    failed_sources.push(source.name.clone());
                }
            }
        }

        if self.settings.cursor_policy == CursorPolicy::LastSource && any_returned_posts {
            if cursor_stalls(any_cursor, session_cursor.as_deref()) {
                warn!(
                    "Last source with posts has no next page; every source restarts from its \
                     first page and already shown posts will be skipped"
                );
            }
            for source in &mut updated {
                source.cursor = session_cursor.clone();
            }
        }

        PageCollection {
            pool,
            summary: BatchSummary {
                sources: updated,
                session_cursor,
                exhausted: !any_cursor,
                accepted: 0,
                failed_sources,
            },
        }
    }
}

/// Under [`CursorPolicy::LastSource`], a feed still has pages but the shared
/// cursor is null, so the next cycle rereads first pages.
fn cursor_stalls(any_cursor: bool, session_cursor: Option<&str>) -> bool {
    any_cursor && session_cursor.is_none()
}

struct PageCollection {
    pool: Vec<Post>,
    summary: BatchSummary,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::MAX_ITEMS;
    use crate::delivery::BatchEvent;
    use crate::http::tests::FakeFetch;
    use crate::preview::tests::{jpeg_bytes, png_bytes};
    use crate::source::Page;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted feeds keyed by (source, cursor).
    #[derive(Default)]
    pub(crate) struct FakeFeeds {
        pages: HashMap<(String, Option<String>), Page>,
        failing: HashSet<String>,
        pub calls: Mutex<Vec<(String, Option<String>, usize)>>,
    }

    impl FakeFeeds {
        pub fn page(mut self, source: &str, cursor: Option<&str>, urls: &[&str], next: Option<&str>) -> Self {
            let posts = urls
                .iter()
                .enumerate()
                .map(|(i, url)| Post {
                    id: format!("{source}-{i}"),
                    title: format!("{source} #{i}"),
                    image_url: url.to_string(),
                    source_name: source.to_string(),
                })
                .collect();
            self.pages.insert(
                (source.to_string(), cursor.map(str::to_string)),
                Page {
                    posts,
                    next_cursor: next.map(str::to_string),
                },
            );
            self
        }

        pub fn failing(mut self, source: &str) -> Self {
            self.failing.insert(source.to_string());
            self
        }
    }

    impl SourceClient for FakeFeeds {
        fn fetch(&self, source_name: &str, cursor: Option<&str>, limit: usize) -> Result<Page> {
            self.calls.lock().unwrap().push((
                source_name.to_string(),
                cursor.map(str::to_string),
                limit,
            ));
            if self.failing.contains(source_name) {
                return Err(Error::network(source_name, "connection refused"));
            }
            Ok(self
                .pages
                .get(&(source_name.to_string(), cursor.map(str::to_string)))
                .cloned()
                .unwrap_or_default())
        }
    }

    pub(crate) fn settings() -> AggregatorSettings {
        AggregatorSettings {
            shuffle_seed: Some(7),
            workers: 1,
            ..Default::default()
        }
    }

    fn aggregator(feeds: FakeFeeds, fetch: FakeFetch, settings: AggregatorSettings) -> Aggregator {
        Aggregator::new(
            Arc::new(feeds),
            ImageProcessor::new(Arc::new(fetch)),
            settings,
        )
    }

    fn sources(names: &[&str]) -> Vec<Source> {
        names.iter().map(|name| Source::new(*name)).collect()
    }

    #[test]
    fn test_per_source_limit() {
        assert_eq!(per_source_limit(50, 3), 16);
        assert_eq!(per_source_limit(50, 1), 50);
        assert_eq!(per_source_limit(50, 5), 10);
        assert_eq!(per_source_limit(50, 8), 10);
        assert_eq!(per_source_limit(50, 0), 50);
    }

    #[test]
    fn test_each_source_gets_split_limit() {
        let feeds = Arc::new(FakeFeeds::default());
        let agg = Aggregator::new(
            feeds.clone(),
            ImageProcessor::new(Arc::new(FakeFetch::default())),
            settings(),
        );
        agg.fetch_batch(&sources(&["a", "b", "c"]), None, MAX_ITEMS);
        let calls = feeds.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, cursor, limit)| cursor.is_none() && *limit == 16));
    }

    #[test]
    fn test_batch_is_capped_at_max_items() {
        let urls: Vec<String> = (0..30).map(|i| format!("https://i.redd.it/{i}.png")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut fetch = FakeFetch::default();
        for url in &urls {
            fetch = fetch.with(url, png_bytes(40, 30));
        }
        let feeds = FakeFeeds::default().page("wallpapers", None, &url_refs, Some("t3_next"));
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["wallpapers"]), None, MAX_ITEMS);
        assert_eq!(outcome.batch.len(), 18);
        assert_eq!(outcome.summary.accepted, 18);
        let positions: Vec<usize> = outcome.batch.iter().map(|i| i.position_index).collect();
        assert_eq!(positions, (0..18).collect::<Vec<_>>());
        assert!(!outcome.summary.exhausted);
    }

    #[test]
    fn test_max_items_cannot_exceed_configured_cap() {
        let urls: Vec<String> = (0..25).map(|i| format!("https://i.redd.it/{i}.png")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut fetch = FakeFetch::default();
        for url in &urls {
            fetch = fetch.with(url, png_bytes(10, 10));
        }
        let feeds = FakeFeeds::default().page("wallpapers", None, &url_refs, None);
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["wallpapers"]), None, 100);
        assert_eq!(outcome.batch.len(), MAX_ITEMS);
    }

    #[test]
    fn test_non_raster_and_broken_candidates_are_dropped() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/good.jpg", jpeg_bytes(64, 48))
            .with("https://i.redd.it/broken.jpg", b"garbage".to_vec());
        let feeds = FakeFeeds::default().page(
            "wallpapers",
            None,
            &[
                "https://i.redd.it/good.jpg",
                "https://i.redd.it/broken.jpg",
                "https://i.redd.it/missing.png",
                "https://v.redd.it/video",
                "https://www.reddit.com/gallery/xyz",
            ],
            None,
        );
        let fetch = Arc::new(fetch);
        let agg = Aggregator::new(
            Arc::new(feeds),
            ImageProcessor::new(fetch.clone()),
            settings(),
        );

        let outcome = agg.fetch_batch(&sources(&["wallpapers"]), None, MAX_ITEMS);
        assert_eq!(outcome.batch.len(), 1);
        assert_eq!(outcome.batch[0].url, "https://i.redd.it/good.jpg");
        assert_eq!((outcome.batch[0].width, outcome.batch[0].height), (64, 48));
        assert_eq!(outcome.batch[0].source_label, "r/wallpapers");

        let requested = fetch.requests();
        assert!(!requested.iter().any(|url| url.contains("v.redd.it")));
        assert!(!requested.iter().any(|url| url.contains("gallery")));
    }

    #[test]
    fn test_resolution_filter_accepts_both_orientations() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/land.png", png_bytes(200, 100))
            .with("https://i.redd.it/port.png", png_bytes(100, 200))
            .with("https://i.redd.it/near.png", png_bytes(205, 96))
            .with("https://i.redd.it/square.png", png_bytes(150, 150));
        let feeds = FakeFeeds::default().page(
            "wallpapers",
            None,
            &[
                "https://i.redd.it/land.png",
                "https://i.redd.it/port.png",
                "https://i.redd.it/near.png",
                "https://i.redd.it/square.png",
            ],
            None,
        );
        let agg = aggregator(feeds, fetch, settings());
        let filter = ResolutionFilter::new(200, 100, 5);

        let outcome = agg.fetch_batch(&sources(&["wallpapers"]), Some(&filter), MAX_ITEMS);
        let mut urls: Vec<&str> = outcome.batch.iter().map(|i| i.url.as_str()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "https://i.redd.it/land.png",
                "https://i.redd.it/near.png",
                "https://i.redd.it/port.png",
            ]
        );
        for image in &outcome.batch {
            assert!(filter.matches(image.width, image.height));
        }
    }

    #[test]
    fn test_failing_source_is_skipped() {
        let fetch = FakeFetch::default().with("https://i.redd.it/b.png", png_bytes(20, 20));
        let feeds = FakeFeeds::default()
            .failing("a")
            .page("b", None, &["https://i.redd.it/b.png"], Some("t3_b"));
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["a", "b"]), None, MAX_ITEMS);
        assert_eq!(outcome.batch.len(), 1);
        assert_eq!(outcome.summary.failed_sources, vec!["a".to_string()]);
        assert!(!outcome.summary.exhausted);
    }

    #[test]
    fn test_total_failure_is_empty_and_exhausted() {
        let feeds = FakeFeeds::default().failing("a").failing("b");
        let agg = aggregator(feeds, FakeFetch::default(), settings());

        let outcome = agg.fetch_batch(&sources(&["a", "b"]), None, MAX_ITEMS);
        assert!(outcome.batch.is_empty());
        assert!(outcome.summary.exhausted);
        assert_eq!(outcome.summary.failed_sources.len(), 2);
    }

    #[test]
    fn test_null_cursors_everywhere_means_exhausted() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/a.png", png_bytes(20, 20))
            .with("https://i.redd.it/b.png", png_bytes(20, 20));
        let feeds = FakeFeeds::default()
            .page("a", None, &["https://i.redd.it/a.png"], None)
            .page("b", None, &["https://i.redd.it/b.png"], None);
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["a", "b"]), None, MAX_ITEMS);
        assert_eq!(outcome.batch.len(), 2);
        assert!(outcome.summary.exhausted);
        assert!(outcome.summary.sources.iter().all(|s| s.cursor.is_none()));
    }

    #[test]
    fn test_last_source_with_posts_sets_every_cursor() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/a.png", png_bytes(20, 20))
            .with("https://i.redd.it/b.png", png_bytes(20, 20));
        let feeds = FakeFeeds::default()
            .page("a", None, &["https://i.redd.it/a.png"], Some("t3_a"))
            .page("b", None, &["https://i.redd.it/b.png"], Some("t3_b"))
            .page("c", None, &[], Some("t3_c"));
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["a", "b", "c"]), None, MAX_ITEMS);
        assert_eq!(outcome.summary.session_cursor.as_deref(), Some("t3_b"));
        assert!(outcome
            .summary
            .sources
            .iter()
            .all(|s| s.cursor.as_deref() == Some("t3_b")));
    }

    #[test]
    fn test_null_last_cursor_resets_all_sources_without_exhausting() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/a.png", png_bytes(20, 20))
            .with("https://i.redd.it/b.png", png_bytes(20, 20));
        let feeds = FakeFeeds::default()
            .page("a", None, &["https://i.redd.it/a.png"], Some("t3_a"))
            .page("b", None, &["https://i.redd.it/b.png"], None);
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["a", "b"]), None, MAX_ITEMS);
        assert!(!outcome.summary.exhausted);
        assert_eq!(outcome.summary.session_cursor, None);
        assert!(outcome.summary.sources.iter().all(|s| s.cursor.is_none()));
        assert!(cursor_stalls(true, outcome.summary.session_cursor.as_deref()));
    }

    #[test]
    fn test_cursor_stalls() {
        assert!(cursor_stalls(true, None));
        assert!(!cursor_stalls(true, Some("t3_b")));
        assert!(!cursor_stalls(false, None));
    }

    #[test]
    fn test_per_source_policy_keeps_own_cursors() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/a.png", png_bytes(20, 20))
            .with("https://i.redd.it/b.png", png_bytes(20, 20));
        let feeds = FakeFeeds::default()
            .page("a", None, &["https://i.redd.it/a.png"], Some("t3_a"))
            .page("b", None, &["https://i.redd.it/b.png"], None);
        let agg = aggregator(
            feeds,
            fetch,
            AggregatorSettings {
                cursor_policy: CursorPolicy::PerSource,
                ..settings()
            },
        );

        let outcome = agg.fetch_batch(&sources(&["a", "b"]), None, MAX_ITEMS);
        let cursors: Vec<Option<&str>> = outcome
            .summary
            .sources
            .iter()
            .map(|s| s.cursor.as_deref())
            .collect();
        assert_eq!(cursors, vec![Some("t3_a"), None]);
        assert!(!outcome.summary.exhausted);
    }

    #[test]
    fn test_duplicate_and_skipped_urls_are_not_processed() {
        let fetch = Arc::new(
            FakeFetch::default()
                .with("https://i.redd.it/dup.png", png_bytes(20, 20))
                .with("https://i.redd.it/old.png", png_bytes(20, 20)),
        );
        let feeds = FakeFeeds::default()
            .page("a", None, &["https://i.redd.it/dup.png", "https://i.redd.it/old.png"], None)
            .page("b", None, &["https://i.redd.it/dup.png"], None);
        let agg = Aggregator::new(
            Arc::new(feeds),
            ImageProcessor::new(fetch.clone()),
            settings(),
        );
        let request = BatchRequest {
            sources: sources(&["a", "b"]),
            filter: None,
            max_items: MAX_ITEMS,
            skip_urls: HashSet::from(["https://i.redd.it/old.png".to_string()]),
        };

        let mut batch = Vec::new();
        agg.run_cycle(&request, &mut StdRng::seed_from_u64(1), |image| {
            batch.push(image);
            true
        });
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].url, "https://i.redd.it/dup.png");
        assert_eq!(fetch.requests(), vec!["https://i.redd.it/dup.png".to_string()]);
    }

    #[test]
    fn test_shuffle_interleaves_sources() {
        let a: Vec<String> = (0..9).map(|i| format!("https://i.redd.it/a{i}.png")).collect();
        let b: Vec<String> = (0..9).map(|i| format!("https://i.redd.it/b{i}.png")).collect();
        let mut fetch = FakeFetch::default();
        for url in a.iter().chain(&b) {
            fetch = fetch.with(url, png_bytes(8, 8));
        }
        let a_refs: Vec<&str> = a.iter().map(String::as_str).collect();
        let b_refs: Vec<&str> = b.iter().map(String::as_str).collect();
        let feeds = FakeFeeds::default()
            .page("a", None, &a_refs, None)
            .page("b", None, &b_refs, None);
        let agg = aggregator(feeds, fetch, settings());

        let outcome = agg.fetch_batch(&sources(&["a", "b"]), None, MAX_ITEMS);
        assert_eq!(outcome.batch.len(), 18);
        let labels: Vec<&str> = outcome.batch.iter().map(|i| i.source_label.as_str()).collect();
        let first_half_from_a = labels[..9].iter().filter(|l| **l == "r/a").count();
        assert!(first_half_from_a < 9, "pool was not shuffled: {labels:?}");
    }

    #[test]
    fn test_worker_pool_keeps_positions_sequential() {
        let urls: Vec<String> = (0..12).map(|i| format!("https://i.redd.it/{i}.png")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut fetch = FakeFetch::default();
        for (i, url) in urls.iter().enumerate() {
            if i % 3 != 0 {
                fetch = fetch.with(url, png_bytes(16, 9));
            }
        }
        let feeds = FakeFeeds::default().page("wallpapers", None, &url_refs, None);
        let agg = aggregator(
            feeds,
            fetch,
            AggregatorSettings {
                workers: 4,
                ..settings()
            },
        );

        let outcome = agg.fetch_batch(&sources(&["wallpapers"]), None, MAX_ITEMS);
        assert_eq!(outcome.batch.len(), 8);
        let positions: Vec<usize> = outcome.batch.iter().map(|i| i.position_index).collect();
        assert_eq!(positions, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_spawned_batch_streams_items_then_completes() {
        let fetch = FakeFetch::default()
            .with("https://i.redd.it/1.png", png_bytes(20, 20))
            .with("https://i.redd.it/2.png", png_bytes(20, 20));
        let feeds = FakeFeeds::default().page(
            "wallpapers",
            None,
            &["https://i.redd.it/1.png", "https://i.redd.it/2.png"],
            Some("t3_more"),
        );
        let agg = aggregator(feeds, fetch, settings());

        let receiver = agg.spawn_batch(BatchRequest {
            sources: sources(&["wallpapers"]),
            max_items: MAX_ITEMS,
            ..Default::default()
        });
        let events: Vec<BatchEvent> = receiver.collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], BatchEvent::Item(_)));
        assert!(matches!(events[1], BatchEvent::Item(_)));
        match &events[2] {
            BatchEvent::Complete(summary) => {
                assert_eq!(summary.accepted, 2);
                assert_eq!(summary.session_cursor.as_deref(), Some("t3_more"));
                assert!(!summary.exhausted);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_stops_when_consumer_leaves() {
        let urls: Vec<String> = (0..10).map(|i| format!("https://i.redd.it/{i}.png")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut fetch = FakeFetch::default();
        for url in &urls {
            fetch = fetch.with(url, png_bytes(8, 8));
        }
        let fetch = Arc::new(fetch);
        let feeds = FakeFeeds::default().page("wallpapers", None, &url_refs, None);
        let agg = Aggregator::new(Arc::new(feeds), ImageProcessor::new(fetch.clone()), settings());
        let request = BatchRequest {
            sources: sources(&["wallpapers"]),
            max_items: MAX_ITEMS,
            ..Default::default()
        };

        let mut delivered = 0;
        let summary = agg.run_cycle(&request, &mut StdRng::seed_from_u64(3), |_| {
            delivered += 1;
            delivered < 3
        });
        assert_eq!(delivered, 3);
        assert_eq!(summary.accepted, 3);
        assert_eq!(fetch.requests().len(), 3);
    }
}
