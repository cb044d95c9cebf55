//! Wire encoding and outbound OSC transport.

pub mod encoding;
pub mod osc;
