//! Two-segment thermal colormap
//!
//! Values ramp cold -> warm -> hot across two linear segments. The
//! anchors are either derived from a value window (midpoint split) or
//! from field percentiles (10th/75th/97.5th), which spreads the colors
//! more evenly over skewed temperature distributions.

/// Segment endpoint colors (linear RGB)
pub const COLD: [f32; 3] = [0.10, 0.22, 0.85];
pub const WARM: [f32; 3] = [0.95, 0.83, 0.20];
pub const HOT: [f32; 3] = [0.90, 0.13, 0.08];

/// Hermite smoothstep, clamped to [0, 1]. Degenerate edges fall back to
/// a hard step at `edge1`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge1 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Anchor values for the two colormap segments: cold at `lo`, warm at
/// `mid`, hot at `hi`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColormapAnchors {
    pub lo: f32,
    pub mid: f32,
    pub hi: f32,
}

impl ColormapAnchors {
    /// Midpoint split over a plain value window
    pub fn from_range(lo: f32, hi: f32) -> Self {
        Self { lo, mid: (lo + hi) * 0.5, hi }
    }

    /// Percentile anchors (10th/75th/97.5th). Falls back to a midpoint
    /// split over `range` when the percentiles are degenerate.
    pub fn from_percentiles(p10: f32, p75: f32, p975: f32, range: [f32; 2]) -> Self {
        if p10 < p75 && p75 < p975 {
            Self { lo: p10, mid: p75, hi: p975 }
        } else {
            Self::from_range(range[0], range[1])
        }
    }

    /// Anchors over the unit interval, for already-normalized inputs
    pub fn normalized() -> Self {
        Self { lo: 0.0, mid: 0.5, hi: 1.0 }
    }

    /// Map a value through the two segments, clamping outside the anchors
    pub fn color_for(&self, value: f32) -> [f32; 3] {
        if value <= self.lo {
            return COLD;
        }
        if value >= self.hi {
            return HOT;
        }
        if value < self.mid {
            let span = self.mid - self.lo;
            let t = if span > 0.0 { (value - self.lo) / span } else { 1.0 };
            lerp3(COLD, WARM, t)
        } else {
            let span = self.hi - self.mid;
            let t = if span > 0.0 { (value - self.mid) / span } else { 0.0 };
            lerp3(WARM, HOT, t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 1.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }

    #[test]
    fn test_smoothstep_is_monotone() {
        let mut prev = 0.0;
        for i in 0..=100 {
            let v = smoothstep(20.0, 80.0, i as f32);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_smoothstep_degenerate_window_is_step() {
        assert_eq!(smoothstep(50.0, 50.0, 49.0), 0.0);
        assert_eq!(smoothstep(50.0, 50.0, 51.0), 1.0);
    }

    #[test]
    fn test_color_clamps_outside_anchors() {
        let anchors = ColormapAnchors::from_range(0.0, 100.0);
        assert_eq!(anchors.color_for(-10.0), COLD);
        assert_eq!(anchors.color_for(200.0), HOT);
    }

    #[test]
    fn test_color_hits_anchor_colors() {
        let anchors = ColormapAnchors::from_range(0.0, 100.0);
        assert_eq!(anchors.color_for(0.0), COLD);
        let warm = anchors.color_for(50.0);
        for i in 0..3 {
            assert!((warm[i] - WARM[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_percentile_anchors_shift_midpoint() {
        let anchors = ColormapAnchors::from_percentiles(10.0, 30.0, 95.0, [0.0, 100.0]);
        assert_eq!(anchors.mid, 30.0);
        // Warm is reached at the 75th percentile, not the naive midpoint
        let c = anchors.color_for(30.0);
        for i in 0..3 {
            assert!((c[i] - WARM[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_percentiles_fall_back_to_range() {
        let anchors = ColormapAnchors::from_percentiles(42.0, 42.0, 42.0, [0.0, 100.0]);
        assert_eq!(anchors, ColormapAnchors::from_range(0.0, 100.0));
    }
}
