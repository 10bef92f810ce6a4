use std::sync::{Arc, Mutex};

use super::page::{OverlaySurface, OverlayUpdate, Page};

/// The in-page results panel. Unmounted when dropped.
pub struct Overlay {
    surface: Box<dyn OverlaySurface>,
}

impl Overlay {
    pub fn mount(page: &dyn Page) -> Self {
        Self {
            surface: page.mount_overlay(),
        }
    }

    pub fn update(&self, update: OverlayUpdate) {
        self.surface.post(&update);
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.surface.unmount();
    }
}

/// Slot holding the page's single overlay, shared by the agent and its capture loop.
#[derive(Clone, Default)]
pub struct OverlaySlot {
    inner: Arc<Mutex<Option<Overlay>>>,
}

impl OverlaySlot {
    /// Installs `overlay` unless one already exists. Returns whether it was installed.
    pub fn install(&self, overlay: Overlay) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_some() {
            return false;
        }
        *guard = Some(overlay);
        true
    }

    /// Posts to the overlay if one is mounted.
    pub fn update(&self, update: OverlayUpdate) {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(overlay) = guard.as_ref() {
            overlay.update(update);
        }
    }

    pub fn take(&self) -> Option<Overlay> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.take()
    }

    pub fn is_mounted(&self) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.is_some()
    }
}
