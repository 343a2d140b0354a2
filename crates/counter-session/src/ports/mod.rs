//! # Ports Layer (Middle Hexagon)
//!
//! - **Driving Port (Inbound)**: `CounterSessionApi`
//! - **Driven Port (Outbound)**: `Eip1193Provider`
//!
//! No concrete implementations live here.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
