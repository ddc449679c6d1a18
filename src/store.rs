//! Ephemeral token-addressed storage for uploaded and generated files
//!
//! Every step of the wizard hands the browser an opaque token instead of keeping a
//! server-side session. [`TokenStore`] maps those tokens to immutable records and
//! forgets them once they are older than the configured expiry. [`FileStore`]
//! bundles the two stores the application needs, and [`Sweeper`] runs the
//! periodic expiry sweep for as long as the server is up.

use log::{debug, warn};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::collections::hash_map::Entry as Slot;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Default lifetime of a stored record
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default pause between two expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Opaque handle for a stored record
///
/// Rendered as 32 lowercase hex characters of OS randomness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Generate a fresh token
    ///
    /// Falls back to the current time in nanoseconds when the OS random source
    /// is unavailable. Such tokens are guessable, which is logged.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        match getrandom::getrandom(&mut bytes) {
            Ok(()) => Token(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
            Err(e) => {
                warn!("Random source unavailable, using time based token: {}", e);
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                Token(format!("{:032x}", nanos))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

struct Entry<T> {
    record: Arc<T>,
    created_at: Instant,
}

/// Concurrent map from [`Token`] to an immutable record
///
/// Lookups share a read lock; inserts, deletes and sweeps take the write lock.
/// Records are handed out as `Arc<T>` and never mutated after insertion, so a
/// token keeps resolving to the same data until it is deleted or swept.
pub struct TokenStore<T> {
    entries: RwLock<HashMap<Token, Entry<T>>>,
    expiry: Duration,
}

impl<T> TokenStore<T> {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiry,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Store a record under a fresh token
    pub fn put(&self, record: T) -> Token {
        self.put_at(record, Instant::now())
    }

    /// Store a record as if it had been created at `created_at`
    pub fn put_at(&self, record: T, created_at: Instant) -> Token {
        self.insert_with(record, created_at, Token::generate)
    }

    /// Insert under the first token from `next_token` that is not taken yet
    fn insert_with(
        &self,
        record: T,
        created_at: Instant,
        mut next_token: impl FnMut() -> Token,
    ) -> Token {
        let entry = Entry {
            record: Arc::new(record),
            created_at,
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        loop {
            match entries.entry(next_token()) {
                Slot::Occupied(slot) => {
                    warn!("Token {} already in use, generating another", slot.key());
                }
                Slot::Vacant(slot) => {
                    let token = slot.key().clone();
                    slot.insert(entry);
                    return token;
                }
            }
        }
    }

    /// Look up a record
    ///
    /// Expired records stay visible until the next sweep removes them.
    pub fn get(&self, token: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(token).map(|entry| Arc::clone(&entry.record))
    }

    /// Remove a record and return it in one step
    pub fn take(&self, token: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(token).map(|entry| entry.record)
    }

    /// Remove a record. Deleting an unknown token does nothing.
    pub fn delete(&self, token: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(token);
    }

    /// Drop every record older than the expiry, measured at `now`
    ///
    /// # Returns
    /// * `usize` - Number of records removed
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        let expiry = self.expiry;
        entries.retain(|_, entry| now.saturating_duration_since(entry.created_at) <= expiry);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An uploaded attendance spreadsheet and the facets derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub data: Vec<u8>,
    pub names: Vec<String>,
    /// Month labels, `"1"`..`"12"`, ascending
    pub months: Vec<String>,
    /// Sheet the names and months came from; empty while the user still has to pick one
    pub sheet_name: String,
}

impl SourceRecord {
    pub fn is_resolved(&self) -> bool {
        !self.sheet_name.is_empty()
    }
}

/// A rendered timesheet waiting to be downloaded or mailed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub data: Vec<u8>,
    pub filename: String,
}

/// The two independent stores used by the wizard
///
/// Source and output records live behind separate locks so upload traffic never
/// waits on downloads and the other way around.
pub struct FileStore {
    sources: TokenStore<SourceRecord>,
    outputs: TokenStore<OutputRecord>,
}

impl FileStore {
    pub fn new(expiry: Duration) -> Self {
        Self {
            sources: TokenStore::new(expiry),
            outputs: TokenStore::new(expiry),
        }
    }

    pub fn store_source(&self, record: SourceRecord) -> Token {
        let size = record.data.len();
        let token = self.sources.put(record);
        debug!("Stored source file with token: {}, size: {}", token, size);
        token
    }

    pub fn source(&self, token: &str) -> Option<Arc<SourceRecord>> {
        self.sources.get(token)
    }

    pub fn store_output(&self, data: Vec<u8>, filename: String) -> Token {
        let size = data.len();
        let token = self.outputs.put(OutputRecord { data, filename });
        debug!("Stored output file with token: {}, size: {}", token, size);
        token
    }

    pub fn output(&self, token: &str) -> Option<Arc<OutputRecord>> {
        self.outputs.get(token)
    }

    /// Fetch an output for download; it cannot be fetched again afterwards
    pub fn take_output(&self, token: &str) -> Option<Arc<OutputRecord>> {
        let output = self.outputs.take(token);
        if output.is_none() {
            debug!("Output token not found: {}", token);
        }
        output
    }

    pub fn delete_output(&self, token: &str) {
        self.outputs.delete(token);
    }

    pub fn sources(&self) -> &TokenStore<SourceRecord> {
        &self.sources
    }

    pub fn outputs(&self) -> &TokenStore<OutputRecord> {
        &self.outputs
    }

    /// Sweep both stores
    pub fn sweep(&self, now: Instant) -> usize {
        self.sources.sweep(now) + self.outputs.sweep(now)
    }
}

/// Background task that sweeps a [`FileStore`] on a fixed interval
///
/// Created once at startup and shut down explicitly so the task is joined
/// before the process exits. Dropping a sweeper without calling
/// [`Sweeper::shutdown`] aborts the task.
pub struct Sweeper {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `store` every `interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<FileStore>, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep(Instant::now());
                        if removed > 0 {
                            debug!("Expired {} stored files", removed);
                        }
                    }
                }
            }
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Sweeper task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
