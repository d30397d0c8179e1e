//! Transport implementations
//!
//! Serial and USB drivers live outside this crate; they plug in by
//! implementing [`contracts::Transport`].

mod channel;
mod network;
mod simulated;
mod trace;

pub use channel::{channel, ChannelTransport, ChannelTransportSender};
pub use network::{NetworkTransport, DEFAULT_PORT};
pub use simulated::{SimulatedConfig, SimulatedTransport};
pub use trace::{TraceOptions, TraceTransport};
