//! fras-hw — Frame acquisition for the attendance client.
//!
//! Provides V4L2 camera access, a latest-frame feed running on its own
//! thread, and presenters that consume every delivered frame.

pub mod camera;
pub mod feed;
pub mod frame;
pub mod preview;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use feed::{FeedState, FrameFeed, FrameSource, NullPresenter, Presenter};
pub use frame::Frame;
pub use preview::PreviewWriter;
