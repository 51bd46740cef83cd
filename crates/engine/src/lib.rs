//! Tracking engine.
//!
//! Wires token discovery, threshold sweeps and the weekly summary over one
//! shared tracker store, and runs them as independent periodic workers.

pub mod pipeline;
pub mod scheduler;
pub mod window;

pub use pipeline::*;
pub use scheduler::*;
pub use window::*;
