//! Business logic services for the PharmStock core

pub mod allocation;
pub mod batch;
pub mod catalog;
pub mod movement;
pub mod procurement;
pub mod reorder;

pub use allocation::AllocationService;
pub use batch::BatchService;
pub use catalog::CatalogService;
pub use movement::MovementService;
pub use procurement::ProcurementService;
pub use reorder::ReorderService;
