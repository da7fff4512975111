//! Accumulation side of the heat map: where an observation lands and how
//! much ink it leaves behind.

pub mod canvas;
pub mod conditioner;
pub mod grid;
pub mod projection;
pub mod viewport;

pub use canvas::Canvas;
pub use conditioner::Conditioner;
pub use viewport::Viewport;
