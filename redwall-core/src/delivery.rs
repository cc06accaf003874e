use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::source::Source;

/// An accepted image. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub url: String,
    pub title: String,
    pub source_label: String,
    pub width: u32,
    pub height: u32,
    pub preview_bytes: Vec<u8>,
    /// Acceptance order within the cycle.
    pub position_index: usize,
}

/// What a cycle did to the session's cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub sources: Vec<Source>,
    pub session_cursor: Option<String>,
    pub exhausted: bool,
    pub accepted: usize,
    pub failed_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Item(ProcessedImage),
    Complete(BatchSummary),
}

/// Producer half, held by the worker thread.
#[derive(Debug, Clone)]
pub struct BatchSender {
    tx: Sender<BatchEvent>,
}

impl BatchSender {
    /// Returns false once the consumer has gone away.
    pub fn item(&self, image: ProcessedImage) -> bool {
        self.tx.send(BatchEvent::Item(image)).is_ok()
    }

    pub fn complete(&self, summary: BatchSummary) -> bool {
        self.tx.send(BatchEvent::Complete(summary)).is_ok()
    }
}

/// Consumer half. Yields items as they are accepted, then exactly one
/// `Complete`, then nothing.
#[derive(Debug)]
pub struct BatchReceiver {
    rx: Receiver<BatchEvent>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

pub fn channel() -> (BatchSender, Receiver<BatchEvent>) {
    let (tx, rx) = mpsc::channel();
    (BatchSender { tx }, rx)
}

impl BatchReceiver {
    pub fn new(rx: Receiver<BatchEvent>, worker: Option<JoinHandle<()>>) -> Self {
        Self {
            rx,
            worker,
            finished: false,
        }
    }

    /// Blocks for the next event. `None` after completion or if the worker
    /// died without completing.
    pub fn recv(&mut self) -> Option<BatchEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(event) => Some(self.track(event)),
            Err(_) => self.disconnect(),
        }
    }

    /// Polls without blocking for longer than `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<BatchEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(self.track(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.disconnect(),
        }
    }

    pub fn try_recv(&mut self) -> Option<BatchEvent> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(self.track(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.disconnect(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn track(&mut self, event: BatchEvent) -> BatchEvent {
        if matches!(event, BatchEvent::Complete(_)) {
            self.finish();
        }
        event
    }

    fn disconnect(&mut self) -> Option<BatchEvent> {
        log::warn!("Batch worker stopped before completing");
        self.finish();
        None
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Iterator for BatchReceiver {
    type Item = BatchEvent;

    fn next(&mut self) -> Option<BatchEvent> {
        self.recv()
    }
}
