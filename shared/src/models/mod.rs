//! Domain models for the PharmStock platform

mod batch;
mod item;
mod movement;
mod purchase_order;
mod vendor;

pub use batch::*;
pub use item::*;
pub use movement::*;
pub use purchase_order::*;
pub use vendor::*;
