//! # Background Replacement
//!
//! Background policies and the per-pixel compositor that applies them.

pub mod compositor;
pub mod policy;

pub use compositor::composite;
pub use policy::{Background, PreparedBackground};
