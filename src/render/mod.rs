//! Rendering: GPU context, culling, mesh and volume pipelines

pub mod colormap;
pub mod context;
pub mod culling;
pub mod mesh_pipeline;
pub mod volume_pipeline;

pub use context::GpuContext;
pub use culling::{Frustum, VisibilityCuller};
pub use mesh_pipeline::{GpuMesh, MeshPipeline, Vertex};
pub use volume_pipeline::{RaymarchSettings, VolumePipeline};
