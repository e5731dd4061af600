//! Sampler module - the concurrent weighted goal-region engine.

mod engine;
mod heap;
mod region;
mod space;
mod store;
mod worker;

pub use engine::*;
pub use heap::*;
pub use region::*;
pub use space::*;
pub use store::*;
