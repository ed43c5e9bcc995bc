//! Real-time gateway: the WebSocket fan-out plane.

pub mod channels;
pub mod delivery;
pub mod protocol;
pub mod registry;
pub mod server;

pub use channels::{Channel, GLOBAL_CHANNEL, METRICS_CHANNEL};
pub use delivery::DeliveryTracker;
pub use protocol::{ClientFrame, ServerFrame};
pub use registry::{ClientRegistry, ClientState, Outbound};
pub use server::Gateway;
