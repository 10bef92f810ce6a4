pub mod analysis;
pub mod session;

pub use analysis::{AnalysisResult, ConfidenceLevel, HealthStatus};
pub use session::{SessionSnapshot, SessionStatus, TabId, TabInfo};
