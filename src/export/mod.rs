//! Delivery of finished artifacts: native share first, file download as the fallback.

/// Share target backed by an external program.
pub mod command;
/// The export sink and its share abstraction.
pub mod sink;
