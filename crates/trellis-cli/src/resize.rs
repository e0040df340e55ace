//! Propagation of local terminal resizes to a remote process.

use crate::process::ProcessControl;
use crate::terminal::Terminal;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};

/// Stream of window-change notifications.
pub type ResizeEvents = Pin<Box<dyn Stream<Item = ()> + Send>>;

/// Returns a stream that yields on every SIGWINCH.
///
/// If the handler cannot be registered the stream is empty and resizes are
/// simply not propagated.
#[cfg(unix)]
pub fn window_change_events() -> ResizeEvents {
    use tokio::signal::unix::{signal, SignalKind};
    use tokio_stream::wrappers::SignalStream;

    match signal(SignalKind::window_change()) {
        Ok(sigwinch) => Box::pin(SignalStream::new(sigwinch)),
        Err(e) => {
            tracing::warn!("Failed to register SIGWINCH handler: {}", e);
            Box::pin(tokio_stream::empty())
        }
    }
}

/// Returns an empty stream; there is no window-change signal here.
#[cfg(not(unix))]
pub fn window_change_events() -> ResizeEvents {
    Box::pin(tokio_stream::empty())
}

/// Background task forwarding terminal geometry to a remote process.
///
/// The task lives until the notification stream ends or the bridge is
/// dropped, whichever comes first.
pub struct ResizeBridge {
    task: Option<JoinHandle<usize>>,
}

impl ResizeBridge {
    /// Spawns the bridge.
    ///
    /// Each notification re-queries the terminal. A notification whose
    /// geometry cannot be read is skipped and the bridge keeps listening;
    /// failed pushes are skipped the same way. Pushes are issued one at a
    /// time, so the last geometry pushed is always the latest one observed.
    pub fn spawn<E>(terminal: Arc<Terminal>, process: Arc<dyn ProcessControl>, events: E) -> Self
    where
        E: Stream<Item = ()> + Send + Unpin + 'static,
    {
        let mut events = events;
        let task = tokio::spawn(async move {
            let mut pushed = 0usize;

            while events.next().await.is_some() {
                let geometry = match terminal.current_geometry() {
                    Ok(geometry) => geometry,
                    Err(e) => {
                        tracing::trace!("skipping resize notification: {}", e);
                        continue;
                    }
                };

                match process.set_window_size(geometry).await {
                    Ok(()) => {
                        tracing::debug!(
                            "pushed window size {}x{} to process {}",
                            geometry.columns,
                            geometry.rows,
                            process.id()
                        );
                        pushed += 1;
                    }
                    Err(e) => {
                        tracing::debug!("Failed to push window size: {:#}", e);
                    }
                }
            }

            pushed
        });

        Self { task: Some(task) }
    }

    /// Waits for the notification stream to end and returns how many
    /// window sizes were pushed successfully.
    #[cfg(test)]
    async fn join(mut self) -> usize {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for ResizeBridge {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
