//! Edge-triggered scene transition events
//!
//! The level proxy and frustum test expose no change callbacks, so both
//! states are recomputed every frame and diffed against the previous
//! frame's recorded value. These events fire exactly once per transition.

/// A per-part transition observed this frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// The active LOD level changed
    LevelSwitched {
        part: String,
        from: Option<usize>,
        to: usize,
    },
    /// The part's bounding sphere entered the view frustum
    EnteredView { part: String },
    /// The part's bounding sphere left the view frustum
    LeftView { part: String },
}
