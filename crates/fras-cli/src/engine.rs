//! Detector adapters and the checking cycle.
//!
//! Each detector runs on its own OS thread. The gesture adapter accepts at
//! most one frame at a time and drops anything submitted while it is busy;
//! its readings are published last-write-wins. The descriptor adapter is a
//! request/reply handle awaited only when the trigger loop commits to a check.

use fras_client::MatchService;
use fras_core::{gesture, CheckOutcome, DetectorError, Embedding, FaceDescriber, HandDetector};
use fras_hw::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("failed to spawn detector thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("detector thread exited")]
    ChannelClosed,
    #[error("detector busy with a previous frame")]
    Busy,
}

/// Latest hand classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureReading {
    pub raised: bool,
    pub hands: usize,
    /// Sequence number of the frame this reading came from.
    pub sequence: u32,
}

/// Best-effort hand tracking with at most one frame in flight.
pub struct GestureAdapter {
    tx: mpsc::Sender<Arc<Frame>>,
    busy: Arc<AtomicBool>,
    /// Set once the worker is found dead, so the warning is logged once.
    stopped: AtomicBool,
    readings: watch::Receiver<Option<GestureReading>>,
}

impl GestureAdapter {
    pub fn spawn<D: HandDetector + 'static>(mut detector: D) -> Result<Self, EngineError> {
        let (tx, mut rx) = mpsc::channel::<Arc<Frame>>(1);
        let (readings_tx, readings) = watch::channel(None);
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        std::thread::Builder::new()
            .name("fras-hands".into())
            .spawn(move || {
                while let Some(frame) = rx.blocking_recv() {
                    let reading = match detector.detect_hands(&frame.data, frame.width, frame.height)
                    {
                        Ok(hands) => GestureReading {
                            raised: gesture::any_raised(&hands),
                            hands: hands.len(),
                            sequence: frame.sequence,
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, seq = frame.sequence, "hand detection failed");
                            GestureReading {
                                raised: false,
                                hands: 0,
                                sequence: frame.sequence,
                            }
                        }
                    };
                    readings_tx.send_replace(Some(reading));
                    worker_busy.store(false, Ordering::Release);
                }
                tracing::debug!("hand detector thread exiting");
            })?;

        Ok(Self {
            tx,
            busy,
            stopped: AtomicBool::new(false),
            readings,
        })
    }

    /// Submit `frame` unless a previous frame is still being processed.
    /// Returns whether the frame was accepted.
    pub fn try_submit(&self, frame: Arc<Frame>) -> bool {
        // A worker that died mid-frame never clears `busy`, so check first.
        if self.tx.is_closed() {
            if !self.stopped.swap(true, Ordering::Relaxed) {
                tracing::warn!("hand detector thread stopped; hands will read as lowered");
            }
            return false;
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::trace!(seq = frame.sequence, "hand detector busy; frame dropped");
            return false;
        }
        if self.tx.try_send(frame).is_err() {
            self.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Receiver for the most recent reading.
    pub fn readings(&self) -> watch::Receiver<Option<GestureReading>> {
        self.readings.clone()
    }
}

type DescribeReply = oneshot::Sender<Result<Option<Vec<f32>>, DetectorError>>;

/// Clone-safe handle to the face descriptor thread.
///
/// Like the gesture adapter it never queues: a request made while the
/// worker is still on an earlier frame (one whose caller timed out) fails
/// with [`EngineError::Busy`].
#[derive(Clone)]
pub struct DescriptorHandle {
    tx: mpsc::Sender<(Arc<Frame>, DescribeReply)>,
    busy: Arc<AtomicBool>,
}

impl DescriptorHandle {
    pub fn spawn<D: FaceDescriber + 'static>(mut describer: D) -> Result<Self, EngineError> {
        let (tx, mut rx) = mpsc::channel::<(Arc<Frame>, DescribeReply)>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        std::thread::Builder::new()
            .name("fras-faces".into())
            .spawn(move || {
                while let Some((frame, reply)) = rx.blocking_recv() {
                    let result = describer.describe_face(&frame.data, frame.width, frame.height);
                    // Free before replying so the caller can immediately ask again.
                    worker_busy.store(false, Ordering::Release);
                    if reply.send(result).is_err() {
                        tracing::debug!(seq = frame.sequence, "descriptor result abandoned");
                    }
                }
                tracing::debug!("face descriptor thread exiting");
            })?;

        Ok(Self { tx, busy })
    }

    /// Extract the raw descriptor of the most prominent face in `frame`.
    pub async fn describe(&self, frame: Arc<Frame>) -> Result<Option<Vec<f32>>, EngineError> {
        if self.tx.is_closed() {
            return Err(EngineError::ChannelClosed);
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(EngineError::Busy);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if let Err(e) = self.tx.try_send((frame, reply_tx)) {
            self.busy.store(false, Ordering::Release);
            return Err(match e {
                TrySendError::Full(_) => EngineError::Busy,
                TrySendError::Closed(_) => EngineError::ChannelClosed,
            });
        }
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// One checking cycle: describe the face, validate, match.
///
/// Never fails; every problem becomes a [`CheckOutcome`].
pub async fn run_check(
    descriptor: &DescriptorHandle,
    matcher: &dyn MatchService,
    frame: Arc<Frame>,
    describe_timeout: Duration,
) -> CheckOutcome {
    let seq = frame.sequence;
    let raw = match tokio::time::timeout(describe_timeout, descriptor.describe(frame)).await {
        Ok(Ok(Some(raw))) => raw,
        Ok(Ok(None)) => return CheckOutcome::NoFaceFound,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, seq, "face description failed");
            return CheckOutcome::NoFaceFound;
        }
        Err(_) => {
            tracing::warn!(?describe_timeout, seq, "face description timed out");
            return CheckOutcome::NoFaceFound;
        }
    };

    let embedding = match Embedding::new(raw) {
        Ok(e) => e,
        Err(e) => return CheckOutcome::InvalidEmbedding(e),
    };

    match matcher.match_embedding(&embedding).await {
        Ok(result) => CheckOutcome::from_match(result),
        Err(e) => {
            tracing::warn!(error = %e, "match request failed");
            CheckOutcome::TransportError(e.to_string())
        }
    }
}
