#![forbid(unsafe_code)]

pub mod clock;
pub mod ids;
pub mod model;

pub use clock::*;
pub use ids::*;
pub use model::*;
