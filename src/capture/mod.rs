//! The in-page Capture Agent: frame grabbing, the tick loop and the overlay.

pub mod agent;
pub mod controller;
pub mod frame;
pub mod loop_worker;
pub mod overlay;
pub mod page;
pub mod still;

pub use agent::{AgentDeps, AgentHandle, CaptureAgent};
pub use controller::CaptureController;
pub use frame::{encode_png, grab_frame};
pub use loop_worker::{TickContext, TICK_TIMEOUT};
pub use overlay::{Overlay, OverlaySlot};
pub use page::{OverlaySurface, OverlayUpdate, Page, PageEvent, ReadyState, VideoSource};
pub use still::{StillImagePage, StillVideo};
