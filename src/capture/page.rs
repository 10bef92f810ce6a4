use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::broadcast;

use crate::models::AnalysisResult;

/// Decode progress of a video element, ordered like `HTMLMediaElement.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// A frame can only be drawn once current data is decoded.
    pub fn can_draw(&self) -> bool {
        *self >= ReadyState::HaveCurrentData
    }
}

pub trait VideoSource: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Native (intrinsic) width and height of the video.
    fn dimensions(&self) -> (u32, u32);

    /// Renders the current frame scaled to `width` x `height`.
    fn draw(&self, width: u32, height: u32) -> Result<RgbaImage, String>;
}

/// Signals raised by the page itself rather than by the extension runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    OverlayClose,
    OverlayStop,
    BeforeUnload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayUpdate {
    Analyzing,
    Results(AnalysisResult),
}

/// The rendering surface behind an overlay; presentation is up to the page.
pub trait OverlaySurface: Send {
    fn post(&self, update: &OverlayUpdate);

    fn unmount(&mut self);
}

/// The document a Capture Agent lives in.
pub trait Page: Send + Sync {
    fn find_video(&self) -> Option<Arc<dyn VideoSource>>;

    fn mount_overlay(&self) -> Box<dyn OverlaySurface>;

    fn events(&self) -> broadcast::Receiver<PageEvent>;
}
