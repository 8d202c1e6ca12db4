//! Live tailing
//!
//! A tail is an unbounded stream built from repeated finite
//! [`stream_from`](crate::AppendOnlyLog::stream_from) passes. Change
//! notifications start a pass when idle and mark the running pass dirty
//! otherwise; a dirty pass is followed immediately by another one. That second
//! pass is what picks up a write that lands after a pass opened the index but
//! before it reached the end.

mod state;
mod watch;

pub use state::{TailPhase, TailState};
pub use watch::{ChangeSender, ChangeSource, ChannelSource, FsWatchSource};

use futures::StreamExt;
use tracing::debug;

use crate::error::Result;
use crate::log::{AppendOnlyLog, EntryStream};

/// Run a tail of `log` from `start`, driven by `source`
///
/// The first pass runs right away so entries already at or after `start` are
/// delivered without waiting for a change. Any error ends the tail after it
/// is yielded. Dropping the stream drops `source` and any open index handle.
pub(crate) fn drive<T, S>(log: AppendOnlyLog<T>, start: u64, mut source: S) -> EntryStream<T>
where
    T: Send + 'static,
    S: ChangeSource + 'static,
{
    Box::pin(async_stream::stream! {
        let mut state = TailState::new(start);
        let mut streaming = state.on_change();

        loop {
            if !streaming {
                match source.next_change().await {
                    Some(Ok(())) => {
                        streaming = state.on_change();
                        continue;
                    }
                    Some(Err(err)) => {
                        yield Err(err);
                        return;
                    }
                    None => {
                        debug!(position = state.position(), "Change source closed, ending tail");
                        return;
                    }
                }
            }

            debug!(position = state.position(), "Starting tail pass");
            let mut entries = log.stream_from(state.position());
            while let Some(item) = entries.next().await {
                if let Err(err) = drain_changes(&mut source, &mut state) {
                    yield Err(err);
                    return;
                }
                match item {
                    Ok(entry) => {
                        state.on_emit();
                        yield Ok(entry);
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            drop(entries);

            if let Err(err) = drain_changes(&mut source, &mut state) {
                yield Err(err);
                return;
            }
            streaming = state.on_pass_complete();
            debug!(
                position = state.position(),
                phase = ?state.phase(),
                "Tail pass complete"
            );
        }
    })
}

/// Fold every change that has already arrived into `state`
fn drain_changes<S: ChangeSource>(source: &mut S, state: &mut TailState) -> Result<()> {
    while let Some(change) = source.try_next_change() {
        change?;
        state.on_change();
    }
    Ok(())
}
