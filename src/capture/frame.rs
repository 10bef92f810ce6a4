use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use super::page::Page;
use crate::error::CaptureFailure;

/// Locates the page's video and renders its current frame at native size.
pub fn grab_frame(page: &dyn Page) -> Result<RgbaImage, CaptureFailure> {
    let video = page.find_video().ok_or(CaptureFailure::NoVideoFound)?;

    if !video.ready_state().can_draw() {
        return Err(CaptureFailure::VideoNotReady);
    }

    let (width, height) = video.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureFailure::NoDimensions);
    }

    let frame = video.draw(width, height).map_err(CaptureFailure::Render)?;
    if frame.dimensions() != (width, height) {
        return Err(CaptureFailure::Render(format!(
            "expected {}x{} frame, got {}x{}",
            width,
            height,
            frame.width(),
            frame.height()
        )));
    }
    Ok(frame)
}

pub fn encode_png(frame: &RgbaImage) -> Result<Vec<u8>, CaptureFailure> {
    let mut bytes = Cursor::new(Vec::new());
    frame
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|err| CaptureFailure::Render(format!("png encode failed: {err}")))?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::Rgba;
    use tokio::sync::broadcast;

    use super::*;
    use crate::capture::page::{OverlaySurface, OverlayUpdate, PageEvent, ReadyState, VideoSource};

    struct Video {
        state: ReadyState,
        size: (u32, u32),
    }

    impl VideoSource for Video {
        fn ready_state(&self) -> ReadyState {
            self.state
        }

        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn draw(&self, width: u32, height: u32) -> Result<RgbaImage, String> {
            Ok(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])))
        }
    }

    struct NoSurface;

    impl OverlaySurface for NoSurface {
        fn post(&self, _update: &OverlayUpdate) {}
        fn unmount(&mut self) {}
    }

    struct TestPage(Option<Arc<Video>>);

    impl Page for TestPage {
        fn find_video(&self) -> Option<Arc<dyn VideoSource>> {
            self.0.clone().map(|v| v as Arc<dyn VideoSource>)
        }

        fn mount_overlay(&self) -> Box<dyn OverlaySurface> {
            Box::new(NoSurface)
        }

        fn events(&self) -> broadcast::Receiver<PageEvent> {
            broadcast::channel(1).1
        }
    }

    fn page(state: ReadyState, size: (u32, u32)) -> TestPage {
        TestPage(Some(Arc::new(Video { state, size })))
    }

    #[test]
    fn missing_video_is_reported() {
        assert_eq!(grab_frame(&TestPage(None)), Err(CaptureFailure::NoVideoFound));
    }

    #[test]
    fn undecoded_video_is_not_ready() {
        let result = grab_frame(&page(ReadyState::HaveMetadata, (640, 480)));
        assert_eq!(result, Err(CaptureFailure::VideoNotReady));
    }

    #[test]
    fn zero_sized_video_has_no_dimensions() {
        let result = grab_frame(&page(ReadyState::HaveEnoughData, (0, 480)));
        assert_eq!(result, Err(CaptureFailure::NoDimensions));
    }

    #[test]
    fn frame_is_native_size_and_encodes_to_png() {
        let frame = grab_frame(&page(ReadyState::HaveCurrentData, (32, 18))).unwrap();
        assert_eq!(frame.dimensions(), (32, 18));

        let png = encode_png(&frame).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 18));
    }
}
