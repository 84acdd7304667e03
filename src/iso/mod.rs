//! Isosurface extraction and overlay management

pub mod coordinator;
pub mod extract;

pub use coordinator::{ColorMode, IsoNotice, IsoQuality, IsosurfaceCoordinator, IsosurfaceRecord};
pub use extract::{ExtractRequest, ExtractResponse};
