//! Scene state: part records, per-frame context, viewer configuration

pub mod config;
pub mod events;
pub mod part;

pub use config::ViewerConfig;
pub use events::SceneEvent;
pub use part::{LodLevel, PartRecord};

use crate::core::types::Vec3;
use crate::render::culling::Frustum;

/// Per-frame camera context, rebuilt by the frame loop and read-only to
/// every other component
pub struct FrameContext {
    /// Camera world position
    pub camera_pos: Vec3,
    /// View frustum planes for this frame
    pub frustum: Frustum,
    /// Seconds since viewer start
    pub time: f32,
}
