//! Change notification sources for tails

use std::path::Path;

use async_trait::async_trait;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{LogError, Result};

/// Something that says "the index may have grown"
///
/// Notifications carry no payload; a tail re-reads from its own position on
/// every change, so spurious or coalesced events are harmless.
#[async_trait]
pub trait ChangeSource: Send {
    /// Wait for the next change
    ///
    /// Returns `None` once the source is closed and no changes remain.
    async fn next_change(&mut self) -> Option<Result<()>>;

    /// Take a change that has already arrived, without waiting
    fn try_next_change(&mut self) -> Option<Result<()>>;
}

/// Filesystem watch on the index file
///
/// At most one undelivered notification is held; further events arriving
/// before it is taken are dropped, so a tail that is not being polled does not
/// accumulate work. Dropping the source stops the watch.
pub struct FsWatchSource {
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<()>>,
}

impl FsWatchSource {
    /// Start watching `path`
    pub fn watch(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel(1);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let change = match res {
                // Our own reads open the file; only writes matter
                Ok(event) if event.kind.is_access() => return,
                Ok(_) => Ok(()),
                Err(err) => Err(err),
            };
            // Full: a pending change already covers this one.
            // Closed: the tail was dropped.
            let _ = tx.try_send(change);
        })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;

        debug!(path = %path.display(), "Watching index file");
        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }
}

#[async_trait]
impl ChangeSource for FsWatchSource {
    async fn next_change(&mut self) -> Option<Result<()>> {
        self.events
            .recv()
            .await
            .map(|change| change.map_err(LogError::from))
    }

    fn try_next_change(&mut self) -> Option<Result<()>> {
        self.events
            .try_recv()
            .ok()
            .map(|change| change.map_err(LogError::from))
    }
}

/// Change source fed by hand through a channel
///
/// Used to drive a tail deterministically, or to plug in a notification
/// mechanism other than a filesystem watch. The source closes once every
/// [`ChangeSender`] is dropped.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sending half of a [`ChannelSource`]
pub type ChangeSender = mpsc::UnboundedSender<()>;

impl ChannelSource {
    pub fn new() -> (ChangeSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl ChangeSource for ChannelSource {
    async fn next_change(&mut self) -> Option<Result<()>> {
        self.rx.recv().await.map(Ok)
    }

    fn try_next_change(&mut self) -> Option<Result<()>> {
        self.rx.try_recv().ok().map(Ok)
    }
}
