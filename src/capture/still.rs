use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use log::debug;
use tokio::sync::broadcast;

use super::page::{OverlaySurface, OverlayUpdate, Page, PageEvent, ReadyState, VideoSource};
use crate::messaging::EventBus;

/// A "video" that always shows the same decoded image.
pub struct StillVideo {
    image: RgbaImage,
}

impl VideoSource for StillVideo {
    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn draw(&self, width: u32, height: u32) -> Result<RgbaImage, String> {
        if self.image.dimensions() == (width, height) {
            return Ok(self.image.clone());
        }
        Ok(image::imageops::resize(&self.image, width, height, FilterType::Triangle))
    }
}

/// Headless page hosting at most one still video. Tracks mounted overlays and
/// lets the caller raise page events.
#[derive(Clone)]
pub struct StillImagePage {
    video: Option<Arc<StillVideo>>,
    mounted: Arc<AtomicUsize>,
    last_update: Arc<Mutex<Option<OverlayUpdate>>>,
    events: EventBus<PageEvent>,
}

impl StillImagePage {
    pub fn new(image: RgbaImage) -> Self {
        Self::build(Some(Arc::new(StillVideo { image })))
    }

    pub fn without_video() -> Self {
        Self::build(None)
    }

    pub fn from_png_file(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to decode frame image {}", path.display()))?
            .to_rgba8();
        Ok(Self::new(image))
    }

    fn build(video: Option<Arc<StillVideo>>) -> Self {
        Self {
            video,
            mounted: Arc::new(AtomicUsize::new(0)),
            last_update: Arc::new(Mutex::new(None)),
            events: EventBus::new(),
        }
    }

    pub fn mounted_overlays(&self) -> usize {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn last_overlay_update(&self) -> Option<OverlayUpdate> {
        self.last_update
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn emit(&self, event: PageEvent) {
        self.events.publish(event);
    }
}

struct StillOverlay {
    mounted: Arc<AtomicUsize>,
    last_update: Arc<Mutex<Option<OverlayUpdate>>>,
    attached: bool,
}

impl OverlaySurface for StillOverlay {
    fn post(&self, update: &OverlayUpdate) {
        debug!("overlay update: {update:?}");
        *self.last_update.lock().unwrap_or_else(|p| p.into_inner()) = Some(update.clone());
    }

    fn unmount(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.mounted.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Page for StillImagePage {
    fn find_video(&self) -> Option<Arc<dyn VideoSource>> {
        self.video.clone().map(|video| video as Arc<dyn VideoSource>)
    }

    fn mount_overlay(&self) -> Box<dyn OverlaySurface> {
        self.mounted.fetch_add(1, Ordering::SeqCst);
        Box::new(StillOverlay {
            mounted: Arc::clone(&self.mounted),
            last_update: Arc::clone(&self.last_update),
            attached: true,
        })
    }

    fn events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::grab_frame;
    use crate::capture::overlay::Overlay;
    use image::Rgba;

    #[test]
    fn overlay_count_follows_mount_and_drop() {
        let page = StillImagePage::new(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let overlay = Overlay::mount(&page);
        assert_eq!(page.mounted_overlays(), 1);
        drop(overlay);
        assert_eq!(page.mounted_overlays(), 0);
    }

    #[test]
    fn still_frame_is_grabbed_at_native_size() {
        let page = StillImagePage::new(RgbaImage::from_pixel(8, 6, Rgba([1, 2, 3, 255])));
        let frame = grab_frame(&page).unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn draw_scales_when_asked() {
        let video = StillVideo {
            image: RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255])),
        };
        assert_eq!(video.draw(4, 2).unwrap().dimensions(), (4, 2));
    }
}
