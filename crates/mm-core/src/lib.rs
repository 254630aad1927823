//! memeow/crates/mm-core/src/lib.rs
//!
//! Domain models, lifecycle rules and port definitions for memeow.

pub mod clock;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use document::*;
pub use error::*;
pub use models::*;
pub use traits::*;
