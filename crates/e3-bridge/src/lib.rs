//! Open3E bridge
//!
//! Wraps the discovery generator with the message handling a broker client
//! needs: payload decoding, LWT filtering, a publish cache and replay on hub
//! restart. Transport is abstracted behind [`Publisher`].

pub mod bridge;
pub mod error;
pub mod publisher;
pub mod simulate;

pub use bridge::Bridge;
pub use error::{BridgeError, BridgeResult, PublishError, PublishResult};
pub use publisher::{Publisher, StdoutPublisher, WritePublisher};
pub use simulate::{parse_line, simulate, Line, SimulationStats};
