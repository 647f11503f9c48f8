//! The live attendance session.
//!
//! Three event sources feed one [`TriggerLoop`]: camera frames (one tick
//! each), gesture readings from the hand adapter, and check outcomes from
//! spawned tasks. All loop state is touched only from [`Session::run`].

use crate::engine::{self, DescriptorHandle, GestureAdapter, GestureReading};
use crate::reporter::StatusReporter;
use fras_client::MatchService;
use fras_core::{CheckOutcome, CycleId, TickDecision, TriggerLoop};
use fras_hw::{FeedState, Frame, FrameFeed};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Error, Debug)]
pub enum SessionError {
    /// The camera could not be acquired or stopped delivering frames.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

pub struct Session<W: Write> {
    trigger: TriggerLoop,
    gestures: GestureAdapter,
    readings: watch::Receiver<Option<GestureReading>>,
    descriptor: DescriptorHandle,
    matcher: Arc<dyn MatchService>,
    describe_timeout: Duration,
    reporter: StatusReporter<W>,
    outcome_tx: mpsc::UnboundedSender<(CycleId, CheckOutcome)>,
    outcome_rx: mpsc::UnboundedReceiver<(CycleId, CheckOutcome)>,
}

impl<W: Write> Session<W> {
    pub fn new(
        gestures: GestureAdapter,
        descriptor: DescriptorHandle,
        matcher: Arc<dyn MatchService>,
        cooldown: Duration,
        describe_timeout: Duration,
        reporter: StatusReporter<W>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            trigger: TriggerLoop::new(cooldown),
            readings: gestures.readings(),
            gestures,
            descriptor,
            matcher,
            describe_timeout,
            reporter,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Drive the session until `shutdown` resolves or the camera is lost.
    pub async fn run(
        mut self,
        feed: FrameFeed,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), SessionError> {
        let mut frames = feed.subscribe();
        tokio::pin!(shutdown);
        self.reporter
            .message("Webcam started - raise your hand to check in");

        let result = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                changed = frames.changed() => {
                    if changed.is_err() {
                        break Err(SessionError::DeviceUnavailable("frame feed closed".into()));
                    }
                    let state = frames.borrow_and_update().clone();
                    match state {
                        FeedState::Live(frame) => self.on_frame(frame),
                        FeedState::Lost(reason) => break Err(SessionError::DeviceUnavailable(reason)),
                        FeedState::Ended => {
                            tracing::info!("frame source ended");
                            break Ok(());
                        }
                        FeedState::Starting => {}
                    }
                }
                Ok(()) = self.readings.changed() => {
                    let reading = *self.readings.borrow_and_update();
                    if let Some(reading) = reading {
                        self.on_gesture(reading);
                    }
                }
                Some((cycle, outcome)) = self.outcome_rx.recv() => {
                    self.on_outcome(cycle, outcome);
                }
            }
        };

        // Joining the capture thread blocks until the in-progress frame returns.
        if tokio::task::spawn_blocking(move || feed.stop()).await.is_err() {
            tracing::warn!("frame feed thread panicked");
        }
        result
    }

    /// One tick at the frame's capture time: hand the frame to the gesture
    /// adapter, then evaluate the loop.
    pub fn on_frame(&mut self, frame: Arc<Frame>) {
        self.gestures.try_submit(Arc::clone(&frame));
        if let TickDecision::StartCheck(cycle) = self.trigger.tick(frame.timestamp) {
            self.spawn_check(cycle, frame);
        }
        self.reporter.report(self.trigger.status());
    }

    pub fn on_gesture(&mut self, reading: GestureReading) {
        if reading.raised != self.trigger.is_raised() {
            tracing::debug!(raised = reading.raised, hands = reading.hands, seq = reading.sequence, "gesture changed");
        }
        self.trigger.observe_gesture(reading.raised);
    }

    pub fn on_outcome(&mut self, cycle: CycleId, outcome: CheckOutcome) {
        if self.trigger.complete(cycle, outcome) {
            self.reporter.report(self.trigger.status());
        }
    }

    fn spawn_check(&self, cycle: CycleId, frame: Arc<Frame>) {
        let descriptor = self.descriptor.clone();
        let matcher = Arc::clone(&self.matcher);
        let tx = self.outcome_tx.clone();
        let timeout = self.describe_timeout;
        tokio::spawn(async move {
            let outcome = engine::run_check(&descriptor, matcher.as_ref(), frame, timeout).await;
            // The session may already be gone on shutdown.
            let _ = tx.send((cycle, outcome));
        });
    }

    #[cfg(test)]
    async fn settle_next(&mut self) {
        let (cycle, outcome) = self.outcome_rx.recv().await.unwrap();
        self.on_outcome(cycle, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::*;
    use fras_core::LoopStatus;
    use fras_hw::{FrameSource, NullPresenter};
    use std::ops::ControlFlow;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;

    fn session(
        matcher: Arc<FakeMatcher>,
        descriptor: Option<Vec<f32>>,
    ) -> Session<Vec<u8>> {
        let gestures = GestureAdapter::spawn(FakeHands {
            raised: Arc::new(AtomicBool::new(false)),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        })
        .unwrap();
        Session::new(
            gestures,
            DescriptorHandle::spawn(FakeFaces(descriptor)).unwrap(),
            matcher,
            Duration::from_secs(5),
            Duration::from_secs(2),
            StatusReporter::new(Vec::new()),
        )
    }

    fn raised() -> GestureReading {
        GestureReading { raised: true, hands: 1, sequence: 0 }
    }

    fn lowered() -> GestureReading {
        GestureReading { raised: false, hands: 0, sequence: 0 }
    }

    #[tokio::test]
    async fn test_raise_match_cooldown_recheck() {
        let matcher = Arc::new(FakeMatcher::matching("S1", 0.42));
        let mut s = session(Arc::clone(&matcher), Some(vec![0.1; 128]));
        let t0 = Instant::now();

        s.on_gesture(raised());
        s.on_frame(frame_at(1, t0));
        assert_eq!(*s.trigger.status(), LoopStatus::Checking);
        s.settle_next().await;

        assert_eq!(matcher.calls(), 1);
        let shown = s.reporter.last().unwrap();
        assert!(shown.contains("S1"), "{shown}");
        assert!(shown.contains("0.420"), "{shown}");

        // Still raised one second later: cooldown, no new call.
        s.on_frame(frame_at(2, t0 + Duration::from_secs(1)));
        assert_eq!(*s.trigger.status(), LoopStatus::Cooldown);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(matcher.calls(), 1);

        // Past the cooldown a new check goes out.
        s.on_frame(frame_at(3, t0 + Duration::from_secs(6)));
        assert_eq!(*s.trigger.status(), LoopStatus::Checking);
        s.settle_next().await;
        assert_eq!(matcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_measured_on_capture_time() {
        let matcher = Arc::new(FakeMatcher::matching("S1", 0.42));
        let mut s = session(Arc::clone(&matcher), Some(vec![0.1; 128]));
        let t0 = Instant::now();

        s.on_gesture(raised());
        s.on_frame(frame_at(1, t0));
        s.settle_next().await;

        // Wall clock has barely moved, but the frame was captured 6 s later.
        s.on_frame(frame_at(2, t0 + Duration::from_secs(6)));
        assert_eq!(*s.trigger.status(), LoopStatus::Checking);
        s.settle_next().await;
        assert_eq!(matcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_wrong_length_descriptor_never_reaches_network() {
        let matcher = Arc::new(FakeMatcher::matching("S1", 0.42));
        let mut s = session(Arc::clone(&matcher), Some(vec![0.1; 64]));

        s.on_gesture(raised());
        s.on_frame(frame_at(1, Instant::now()));
        s.settle_next().await;

        assert_eq!(matcher.calls(), 0);
        assert_eq!(
            s.reporter.last(),
            Some("Invalid embedding: expected 128 values, got 64")
        );
    }

    #[tokio::test]
    async fn test_slow_network_does_not_duplicate_requests() {
        let matcher = Arc::new(
            FakeMatcher::matching("S1", 0.42).with_delay(Duration::from_millis(200)),
        );
        let mut s = session(Arc::clone(&matcher), Some(vec![0.1; 128]));
        let t0 = Instant::now();

        s.on_gesture(raised());
        s.on_frame(frame_at(1, t0));
        // Frames keep arriving far past the cooldown while the request stalls.
        for i in 2..40u32 {
            s.on_frame(frame_at(i, t0 + Duration::from_secs(u64::from(i))));
        }
        s.settle_next().await;
        assert_eq!(matcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_lowering_hand_discards_result() {
        let matcher = Arc::new(
            FakeMatcher::matching("S1", 0.42).with_delay(Duration::from_millis(50)),
        );
        let mut s = session(Arc::clone(&matcher), Some(vec![0.1; 128]));
        let t0 = Instant::now();

        s.on_gesture(raised());
        s.on_frame(frame_at(1, t0));
        s.on_gesture(lowered());
        s.on_frame(frame_at(2, t0 + Duration::from_millis(100)));
        s.settle_next().await;

        assert_eq!(*s.trigger.status(), LoopStatus::Idle);
        assert_eq!(s.reporter.last(), Some("No hand raised"));
    }

    #[tokio::test]
    async fn test_no_face_reports_and_skips_network() {
        let matcher = Arc::new(FakeMatcher::matching("S1", 0.42));
        let mut s = session(Arc::clone(&matcher), None);

        s.on_gesture(raised());
        s.on_frame(frame_at(1, Instant::now()));
        s.settle_next().await;

        assert_eq!(matcher.calls(), 0);
        assert_eq!(s.reporter.last(), Some("No face found"));
    }

    /// Delivers a few frames, then fails like an unplugged camera.
    struct UnpluggedSource;

    impl FrameSource for UnpluggedSource {
        fn run(
            &mut self,
            on_frame: &mut dyn FnMut(Frame) -> ControlFlow<()>,
        ) -> Result<(), fras_hw::CameraError> {
            for seq in 0..3 {
                let frame = Frame::from_gray(vec![0u8; 16 * 12], 16, 12, seq).unwrap();
                if on_frame(frame).is_break() {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(fras_hw::CameraError::CaptureFailed("device unplugged".into()))
        }
    }

    #[tokio::test]
    async fn test_lost_camera_ends_session() {
        let matcher = Arc::new(FakeMatcher::matching("S1", 0.42));
        let s = session(matcher, None);
        let feed = FrameFeed::start(UnpluggedSource, NullPresenter).unwrap();

        let err = s.run(feed, std::future::pending()).await.unwrap_err();
        let SessionError::DeviceUnavailable(reason) = err;
        assert!(reason.contains("unplugged"), "{reason}");
    }

    #[tokio::test]
    async fn test_shutdown_stops_session() {
        let matcher = Arc::new(FakeMatcher::matching("S1", 0.42));
        let s = session(matcher, None);
        let feed = FrameFeed::start(UnpluggedSource, NullPresenter).unwrap();

        s.run(feed, async {}).await.unwrap();
    }
}
