use std::collections::HashSet;

use log::info;

use crate::aggregator::{Aggregator, BatchRequest};
use crate::delivery::{BatchEvent, BatchReceiver, BatchSummary, ProcessedImage};
use crate::filter::ResolutionFilter;
use crate::source::{normalize_source_name, Source};

/// State of one search: cursors, accepted images and what was already shown.
///
/// Only one batch can be in flight at a time: [`PendingBatch`] holds the
/// session mutably until it is dropped.
pub struct BrowseSession {
    aggregator: Aggregator,
    sources: Vec<Source>,
    filter: Option<ResolutionFilter>,
    images: Vec<ProcessedImage>,
    seen_urls: HashSet<String>,
    session_cursor: Option<String>,
    exhausted: bool,
    searched: bool,
    last_summary: Option<BatchSummary>,
}

impl BrowseSession {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            sources: Vec::new(),
            filter: None,
            images: Vec::new(),
            seen_urls: HashSet::new(),
            session_cursor: None,
            exhausted: false,
            searched: false,
            last_summary: None,
        }
    }

    /// Resets the session and starts the first batch.
    pub fn search<S: AsRef<str>>(
        &mut self,
        source_names: &[S],
        filter: Option<ResolutionFilter>,
    ) -> PendingBatch<'_> {
        self.sources = source_names
            .iter()
            .filter_map(|name| normalize_source_name(name.as_ref()))
            .map(Source::new)
            .collect();
        self.filter = filter;
        self.images.clear();
        self.seen_urls.clear();
        self.session_cursor = None;
        self.exhausted = false;
        self.searched = true;
        self.last_summary = None;
        info!(
            "New search over {} source(s): {}",
            self.sources.len(),
            self.source_names().join(", ")
        );
        self.start()
    }

    /// Starts the next batch from the current cursors, or `None` when there is
    /// nothing more to load.
    pub fn load_more(&mut self) -> Option<PendingBatch<'_>> {
        if !self.can_load_more() {
            return None;
        }
        Some(self.start())
    }

    pub fn can_load_more(&self) -> bool {
        self.searched && !self.exhausted && !self.sources.is_empty()
    }

    pub fn images(&self) -> &[ProcessedImage] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Option<&ProcessedImage> {
        self.images.get(index)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    pub fn filter(&self) -> Option<&ResolutionFilter> {
        self.filter.as_ref()
    }

    pub fn session_cursor(&self) -> Option<&str> {
        self.session_cursor.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn last_summary(&self) -> Option<&BatchSummary> {
        self.last_summary.as_ref()
    }

    fn start(&mut self) -> PendingBatch<'_> {
        let request = BatchRequest {
            sources: self.sources.clone(),
            filter: self.filter,
            max_items: self.aggregator.settings().max_items,
            skip_urls: self.seen_urls.clone(),
        };
        let receiver = self.aggregator.spawn_batch(request);
        PendingBatch {
            session: self,
            receiver,
        }
    }

    fn accept(&mut self, image: &ProcessedImage) {
        self.seen_urls.insert(image.url.clone());
        self.images.push(image.clone());
    }

    fn apply(&mut self, summary: &BatchSummary) {
        self.sources = summary.sources.clone();
        self.session_cursor = summary.session_cursor.clone();
        self.exhausted = summary.exhausted;
        self.last_summary = Some(summary.clone());
    }
}

/// A batch in flight. Events are applied to the session as they are read.
pub struct PendingBatch<'a> {
    session: &'a mut BrowseSession,
    receiver: BatchReceiver,
}

impl PendingBatch<'_> {
    /// Blocks for the next event; `None` once the batch is over.
    pub fn recv(&mut self) -> Option<BatchEvent> {
        let event = self.receiver.recv()?;
        match &event {
            BatchEvent::Item(image) => self.session.accept(image),
            BatchEvent::Complete(summary) => self.session.apply(summary),
        }
        Some(event)
    }

    /// Drains the batch, returning the completion summary.
    pub fn wait(mut self) -> Option<BatchSummary> {
        let mut summary = None;
        while let Some(event) = self.recv() {
            if let BatchEvent::Complete(done) = event {
                summary = Some(done);
            }
        }
        summary
    }
}

impl Iterator for PendingBatch<'_> {
    type Item = BatchEvent;

    fn next(&mut self) -> Option<BatchEvent> {
        self.recv()
    }
}
