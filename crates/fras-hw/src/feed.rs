//! Continuous frame feed.
//!
//! A [`FrameSource`] runs on a dedicated thread. Every frame is handed to a
//! [`Presenter`] first, then published as the single latest value of a
//! `watch` channel. Nothing is queued: a consumer that falls behind simply
//! sees the newest frame next time it looks.

use crate::camera::CameraError;
use crate::frame::Frame;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::watch;

/// Anything that produces frames at its own cadence.
pub trait FrameSource: Send + 'static {
    /// Produce frames, handing each to `on_frame`, until it returns
    /// `ControlFlow::Break` or capture fails.
    fn run(&mut self, on_frame: &mut dyn FnMut(Frame) -> ControlFlow<()>)
        -> Result<(), CameraError>;
}

/// Per-frame rendering target. Runs on the feed thread and must stay cheap.
pub trait Presenter: Send + 'static {
    fn present(&mut self, frame: &Frame);
}

/// Presenter that draws nothing.
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _frame: &Frame) {}
}

/// Latest state published by the feed thread.
#[derive(Clone, Debug)]
pub enum FeedState {
    /// No frame delivered yet.
    Starting,
    /// The most recent frame.
    Live(Arc<Frame>),
    /// Capture failed; no further frames will arrive.
    Lost(String),
    /// The source ended normally.
    Ended,
}

/// Owned handle to a running frame feed. Dropping it stops the capture thread.
pub struct FrameFeed {
    rx: watch::Receiver<FeedState>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FrameFeed {
    /// Spawn the feed thread for `source`, presenting each frame on `presenter`.
    pub fn start<S, P>(mut source: S, mut presenter: P) -> std::io::Result<Self>
    where
        S: FrameSource,
        P: Presenter,
    {
        let (tx, rx) = watch::channel(FeedState::Starting);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("fras-feed".into())
            .spawn(move || {
                tracing::info!("frame feed started");
                let mut delivered = 0u64;
                let result = source.run(&mut |frame| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return ControlFlow::Break(());
                    }
                    presenter.present(&frame);
                    delivered += 1;
                    tx.send_replace(FeedState::Live(Arc::new(frame)));
                    ControlFlow::Continue(())
                });

                match result {
                    Ok(()) => {
                        tracing::info!(delivered, "frame feed ended");
                        tx.send_replace(FeedState::Ended);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, delivered, "frame feed lost");
                        tx.send_replace(FeedState::Lost(e.to_string()));
                    }
                }
            })?;

        Ok(Self {
            rx,
            stop,
            thread: Some(thread),
        })
    }

    /// A receiver observing the latest feed state.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.rx.clone()
    }

    /// Stop the feed and wait for the capture thread to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("frame feed thread panicked");
            }
        }
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        // The thread notices on its next frame and releases the source.
        self.stop.store(true, Ordering::Relaxed);
    }
}
