//! The popup: start/stop commands, settings editing and result rendering.

pub mod popup;
pub mod view;

pub use popup::ControlSurface;
pub use view::{Diagnostic, DiagnosticStatus, ResultsView, StatusDot, SurfaceView};
