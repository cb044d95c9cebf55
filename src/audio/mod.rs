//! Microphone capture and the bounded sample ring.

pub mod capture;
pub mod ring_buffer;
