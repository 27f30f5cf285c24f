//! Advertisement sources.
//!
//! A source hands out a channel of normalized snapshots and answers which
//! snapshots it already knows. Dropping the receiver ends the subscription:
//! the reading task stops right away, even while waiting for input, and
//! nothing it reads afterwards reaches the source's state.

use crate::mac_address::MacAddress;
use crate::snapshot::{AdvertisementRecord, AdvertisementSnapshot, IngestError};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

/// Channel buffer size for snapshot results.
pub const SNAPSHOT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Convenience alias for normalized snapshots or ingestion errors.
pub type SnapshotResult = Result<AdvertisementSnapshot, IngestError>;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("source is already subscribed")]
    AlreadySubscribed,
}

/// Monotonic seconds since the clock started. Every snapshot is stamped with
/// it on arrival and timer ticks read it too, so liveness compares times from
/// one clock only.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Advertisement source abstraction, so the run loop can be tested without a
/// radio.
pub trait AdvertisementSource: Send + Sync {
    fn clock(&self) -> Clock;

    /// Latest snapshot per address seen so far.
    fn discovered(&self) -> Vec<AdvertisementSnapshot>;

    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<SnapshotResult>, SourceError>> + Send + '_>>;
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type SeenMap = Arc<Mutex<HashMap<MacAddress, AdvertisementSnapshot>>>;

/// Reads one JSON advertisement record per line.
///
/// ```json
/// {"address": "AA:BB:CC:DD:EE:FF", "rssi": -60, "manufacturer_data": {"76": "0215"}}
/// ```
pub struct JsonLinesSource {
    reader: Mutex<Option<BoxedReader>>,
    clock: Clock,
    seen: SeenMap,
}

impl JsonLinesSource {
    pub fn new<R>(reader: R, clock: Clock) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            clock,
            seen: Arc::default(),
        }
    }

    pub fn stdin(clock: Clock) -> Self {
        Self::new(tokio::io::stdin(), clock)
    }

    pub async fn open(path: &Path, clock: Clock) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(file, clock))
    }

    fn lock_seen(seen: &SeenMap) -> MutexGuard<'_, HashMap<MacAddress, AdvertisementSnapshot>> {
        seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AdvertisementSource for JsonLinesSource {
    fn clock(&self) -> Clock {
        self.clock
    }

    fn discovered(&self) -> Vec<AdvertisementSnapshot> {
        let mut known: Vec<_> = Self::lock_seen(&self.seen).values().cloned().collect();
        known.sort_by_key(|snapshot| snapshot.address);
        known
    }

    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<SnapshotResult>, SourceError>> + Send + '_>>
    {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let clock = self.clock;
        let seen = Arc::clone(&self.seen);

        Box::pin(async move {
            let reader = reader.ok_or(SourceError::AlreadySubscribed)?;
            let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_BUFFER_SIZE);
            tokio::spawn(read_lines(reader, clock, seen, tx));
            Ok(rx)
        })
    }
}

async fn read_lines(
    reader: BoxedReader,
    clock: Clock,
    seen: SeenMap,
    tx: mpsc::Sender<SnapshotResult>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => break,
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stopped reading advertisements");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if tx.is_closed() {
            break;
        }

        let result =
            AdvertisementRecord::from_json(&line).and_then(|record| record.into_snapshot(clock.now()));
        if let Ok(snapshot) = &result {
            JsonLinesSource::lock_seen(&seen).insert(snapshot.address, snapshot.clone());
        }
        if tx.send(result).await.is_err() {
            break;
        }
    }
}
