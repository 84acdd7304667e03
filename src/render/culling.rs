//! CPU-side frustum culling and containment occlusion

use glam::{Mat4, Vec3, Vec4};

use crate::scene::part::PartRecord;
use crate::scene::{FrameContext, SceneEvent};

/// A frustum plane in Hessian normal form (normal.xyz, distance)
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// 6-plane frustum extracted from a view-projection matrix
pub struct Frustum {
    pub planes: [Plane; 6], // left, right, bottom, top, near, far
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    /// Uses the Gribb/Hartmann method.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        // Extract rows from the VP matrix (column-major storage)
        let rows = [
            Vec4::new(vp.col(0).x, vp.col(1).x, vp.col(2).x, vp.col(3).x),
            Vec4::new(vp.col(0).y, vp.col(1).y, vp.col(2).y, vp.col(3).y),
            Vec4::new(vp.col(0).z, vp.col(1).z, vp.col(2).z, vp.col(3).z),
            Vec4::new(vp.col(0).w, vp.col(1).w, vp.col(2).w, vp.col(3).w),
        ];

        let mut planes = [Plane { normal: Vec3::ZERO, d: 0.0 }; 6];

        // Left:   row3 + row0
        // Right:  row3 - row0
        // Bottom: row3 + row1
        // Top:    row3 - row1
        // Near:   row3 + row2
        // Far:    row3 - row2
        let raw = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] + rows[2], // near
            rows[3] - rows[2], // far
        ];

        for (i, r) in raw.iter().enumerate() {
            let len = Vec3::new(r.x, r.y, r.z).length();
            if len > 0.0 {
                planes[i] = Plane {
                    normal: Vec3::new(r.x, r.y, r.z) / len,
                    d: r.w / len,
                };
            }
        }

        Self { planes }
    }

    /// Test if a sphere intersects or is contained in the frustum.
    ///
    /// Deliberately permissive: a sphere touching any plane still counts
    /// as inside, which avoids popping at the view edges.
    pub fn test_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            if plane.distance_to_point(center) < -radius {
                return false;
            }
        }
        true
    }
}

/// Per-frame visibility pass combining the user toggle, frustum
/// membership, and containment occlusion into each part's final visible
/// flag.
///
/// Containment occlusion ("x-ray shell") needs two designated parts: an
/// enclosure and a display. While the camera is outside the enclosure's
/// bounding box, parts fully contained in it are hidden; stepping inside
/// lifts the occlusion for everything. The display part is always
/// exempt.
pub struct VisibilityCuller {
    pub enclosure: String,
    pub display: String,
    pub epsilon: f32,
}

impl VisibilityCuller {
    pub fn new(enclosure: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            enclosure: enclosure.into(),
            display: display.into(),
            epsilon: 1e-3,
        }
    }

    /// Run the pass, mutating each part's `visible`/`last_in_frustum`
    /// state and appending edge-triggered view transition events.
    pub fn run(&self, parts: &mut [PartRecord], ctx: &FrameContext, events: &mut Vec<SceneEvent>) {
        // Frustum membership is recomputed from scratch and diffed
        // against last frame; the primitive has no change callback.
        let mut in_frustum = Vec::with_capacity(parts.len());
        for part in parts.iter_mut() {
            let inside = match part.bounds {
                Some(b) => ctx.frustum.test_sphere(b.center(), b.half_diagonal()),
                // No bounds: cannot cull what we cannot bound
                None => true,
            };

            if inside != part.last_in_frustum {
                events.push(if inside {
                    SceneEvent::EnteredView { part: part.name.clone() }
                } else {
                    SceneEvent::LeftView { part: part.name.clone() }
                });
            }
            part.last_in_frustum = inside;
            in_frustum.push(inside);
        }

        let gate = |i: usize, parts: &[PartRecord]| parts[i].toggle && in_frustum[i];

        let enclosure_idx = parts.iter().position(|p| p.name == self.enclosure);
        let display_idx = parts.iter().position(|p| p.name == self.display);

        // Occlusion requires both designated parts present and visible,
        // an enclosure box to test against, and the camera outside it
        let enclosure_bounds = match (enclosure_idx, display_idx) {
            (Some(e), Some(d)) if gate(e, parts) && gate(d, parts) => {
                parts[e].bounds.filter(|b| !b.contains_point(ctx.camera_pos))
            }
            _ => None,
        };

        for (i, part) in parts.iter_mut().enumerate() {
            let occluded = match (enclosure_bounds, part.bounds) {
                (Some(shell), Some(bounds))
                    if Some(i) != display_idx && Some(i) != enclosure_idx =>
                {
                    shell.contains_aabb(&bounds, self.epsilon)
                }
                // Missing bounds disables containment for this part only
                _ => false,
            };

            part.visible = part.toggle && in_frustum[i] && !occluded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;

    fn frustum_at(camera_pos: Vec3) -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(camera_pos, Vec3::ZERO, Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    fn ctx_at(camera_pos: Vec3) -> FrameContext {
        FrameContext {
            camera_pos,
            frustum: frustum_at(camera_pos),
            time: 0.0,
        }
    }

    fn part(name: &str, min: Vec3, max: Vec3) -> PartRecord {
        PartRecord::new(name, Some(Aabb::new(min, max)))
    }

    fn assembly() -> Vec<PartRecord> {
        vec![
            part("enclosure", Vec3::splat(-1.0), Vec3::splat(1.0)),
            part("display", Vec3::new(-0.5, -0.5, 0.9), Vec3::new(0.5, 0.5, 1.1)),
            part("chip", Vec3::splat(-0.2), Vec3::splat(0.2)),
        ]
    }

    #[test]
    fn test_frustum_extraction_normalizes_planes() {
        let frustum = frustum_at(Vec3::new(0.0, 0.0, 5.0));
        for plane in &frustum.planes {
            assert!(plane.normal.length() > 0.9, "plane normal should be normalized");
        }
    }

    #[test]
    fn test_sphere_in_front_is_visible() {
        let frustum = frustum_at(Vec3::new(0.0, 0.0, 5.0));
        assert!(frustum.test_sphere(Vec3::ZERO, 0.5));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        let frustum = frustum_at(Vec3::new(0.0, 0.0, 5.0));
        assert!(!frustum.test_sphere(Vec3::new(0.0, 0.0, 20.0), 0.5));
    }

    #[test]
    fn test_sphere_straddling_plane_is_visible() {
        let frustum = frustum_at(Vec3::new(0.0, 0.0, 5.0));
        // Far to the side but huge: still touches the frustum
        assert!(frustum.test_sphere(Vec3::new(30.0, 0.0, 0.0), 40.0));
    }

    #[test]
    fn test_containment_occludes_interior_part() {
        let culler = VisibilityCuller::new("enclosure", "display");
        let mut parts = assembly();
        let mut events = Vec::new();

        // Camera outside the enclosure: the chip is hidden
        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert!(parts[0].visible, "enclosure stays visible");
        assert!(parts[1].visible, "display is exempt");
        assert!(!parts[2].visible, "contained chip is occluded");
    }

    #[test]
    fn test_camera_inside_enclosure_lifts_occlusion() {
        let culler = VisibilityCuller::new("enclosure", "display");
        let mut parts = assembly();
        let mut events = Vec::new();

        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert!(!parts[2].visible);

        // Step inside: every part is visible again
        culler.run(&mut parts, &ctx_at(Vec3::new(0.3, 0.0, 0.0)), &mut events);
        assert!(parts[2].visible, "occlusion lifted with camera inside");
    }

    #[test]
    fn test_toggle_gates_visibility() {
        let culler = VisibilityCuller::new("enclosure", "display");
        let mut parts = assembly();
        let mut events = Vec::new();

        parts[1].toggle = false;
        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert!(!parts[1].visible);
        // With the display hidden, containment occlusion is inactive
        assert!(parts[2].visible);
    }

    #[test]
    fn test_hidden_enclosure_disables_occlusion() {
        let culler = VisibilityCuller::new("enclosure", "display");
        let mut parts = assembly();
        let mut events = Vec::new();

        parts[0].toggle = false;
        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert!(parts[2].visible);
    }

    #[test]
    fn test_missing_bounds_disables_containment_only() {
        let culler = VisibilityCuller::new("enclosure", "display");
        let mut parts = assembly();
        parts[2].bounds = None;
        let mut events = Vec::new();

        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        // Defaults to non-occluded; the frustum gate still applies and passes here
        assert!(parts[2].visible);
    }

    #[test]
    fn test_view_events_are_edge_triggered() {
        let culler = VisibilityCuller::new("enclosure", "display");
        let mut parts = vec![part("rotor", Vec3::splat(-0.1), Vec3::splat(0.1))];
        let mut events = Vec::new();

        // First frame in view: one EnteredView
        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert_eq!(events, vec![SceneEvent::EnteredView { part: "rotor".into() }]);

        // Still in view: no duplicate
        events.clear();
        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert!(events.is_empty());

        // Move the part far outside the frustum: one LeftView
        events.clear();
        parts[0].bounds = Some(Aabb::new(
            Vec3::new(999.0, 999.0, 999.0),
            Vec3::new(999.2, 999.2, 999.2),
        ));
        culler.run(&mut parts, &ctx_at(Vec3::new(0.0, 0.0, 5.0)), &mut events);
        assert_eq!(events, vec![SceneEvent::LeftView { part: "rotor".into() }]);
    }
}
