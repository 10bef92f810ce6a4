//! Message contracts and the transports that carry them between contexts.

pub mod bus;
pub mod message;
pub mod reply;
pub mod tabs;

pub use bus::EventBus;
pub use message::{AgentEnvelope, Command, DetectionEvent, Response};
pub use reply::{PendingReply, Reply, Responder};
pub use tabs::{TabEvent, TabRegistry, TabRequest};
