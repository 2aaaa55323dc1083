//! Request handlers.

pub mod analysis;
pub mod health;
pub mod scenario;

pub use analysis::*;
pub use health::*;
pub use scenario::*;
