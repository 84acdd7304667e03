//! Isosurface coordinator
//!
//! Owns the extraction worker, enforces one in-flight request at a time,
//! colors completed meshes, and keeps the registry of toggleable
//! isosurface overlays.

use std::sync::mpsc;
use std::thread;

use crate::iso::extract::{run_extraction, ExtractRequest, ExtractResponse};
use crate::render::colormap::ColormapAnchors;
use crate::render::mesh_pipeline::GpuMesh;
use crate::volume::VolumeField;

/// Extraction quality tier, mapping to the sampling stride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoQuality {
    Fast,
    Balanced,
    Full,
}

impl IsoQuality {
    pub fn stride(self) -> u32 {
        match self {
            IsoQuality::Fast => 3,
            IsoQuality::Balanced => 2,
            IsoQuality::Full => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IsoQuality::Fast => "fast",
            IsoQuality::Balanced => "balanced",
            IsoQuality::Full => "full",
        }
    }
}

/// How a completed isosurface is colored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// One fill color derived from the isovalue
    Solid,
    /// Per-vertex colors from the returned scalars, renormalized against
    /// this result set only
    Gradient,
}

impl ColorMode {
    pub fn label(self) -> &'static str {
        match self {
            ColorMode::Solid => "solid",
            ColorMode::Gradient => "gradient",
        }
    }
}

/// CPU-side colored triangle soup ready for upload
#[derive(Debug, Default)]
pub struct ColoredMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
}

/// One registered isosurface overlay. Hiding never discards geometry.
pub struct IsosurfaceRecord {
    pub label: String,
    pub level_value: f32,
    pub color_mode: ColorMode,
    pub quality: IsoQuality,
    pub mesh: ColoredMesh,
    pub visible: bool,
    /// GPU upload, created lazily on first draw
    pub gpu: Option<GpuMesh>,
}

/// Outcome of a finished extraction, surfaced to the frame loop
#[derive(Debug)]
pub enum IsoNotice {
    /// A new overlay was registered at this index
    Registered { index: usize },
    /// No surface exists at this level; informational, not an error
    NoSurface { value: f32 },
    /// The task failed; the trigger is re-enabled
    Failed { error: String },
}

#[derive(Clone, Copy)]
struct PendingMeta {
    value: f32,
    mode: ColorMode,
    quality: IsoQuality,
}

/// Dispatches extraction requests to the worker and registers results
pub struct IsosurfaceCoordinator {
    request_tx: mpsc::Sender<(PendingMeta, ExtractRequest)>,
    result_rx: mpsc::Receiver<(PendingMeta, Result<ExtractResponse, String>)>,
    busy: bool,
    records: Vec<IsosurfaceRecord>,
    anchors: ColormapAnchors,
    unit: String,
}

impl IsosurfaceCoordinator {
    /// Create the coordinator and spawn its worker.
    ///
    /// Solid coloring prefers the field's 10th/75th/97.5th percentile
    /// anchors over a naive min/mid/max split.
    pub fn new(field: &VolumeField, unit: impl Into<String>) -> Self {
        let p = field.percentiles(&[0.10, 0.75, 0.975]);
        let anchors = ColormapAnchors::from_percentiles(p[0], p[1], p[2], field.value_range);

        let (request_tx, request_rx) = mpsc::channel::<(PendingMeta, ExtractRequest)>();
        let (result_tx, result_rx) = mpsc::channel();

        thread::spawn(move || {
            while let Ok((meta, request)) = request_rx.recv() {
                let response = run_extraction(&request);
                if result_tx.send((meta, response)).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx,
            result_rx,
            busy: false,
            records: Vec::new(),
            anchors,
            unit: unit.into(),
        }
    }

    /// Whether an extraction is in flight (the trigger control is
    /// disabled while true)
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Registered overlays
    pub fn records(&self) -> &[IsosurfaceRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [IsosurfaceRecord] {
        &mut self.records
    }

    /// Request extraction of the isosurface at `value` (physical units).
    ///
    /// Returns false without dispatching when a request is already in
    /// flight; overlapping requests against the same buffer are not
    /// allowed.
    pub fn dispatch(
        &mut self,
        field: &VolumeField,
        value: f32,
        mode: ColorMode,
        quality: IsoQuality,
    ) -> bool {
        if self.busy {
            log::warn!("isosurface extraction already in flight, ignoring trigger");
            return false;
        }

        let request = ExtractRequest {
            dims: field.dims,
            spacing: field.spacing,
            origin: field.origin,
            threshold: field.value_to_byte(value),
            stride: quality.stride(),
            voxels: field.voxels.clone(),
        };
        let meta = PendingMeta { value, mode, quality };

        if self.request_tx.send((meta, request)).is_err() {
            log::error!("isosurface worker is gone");
            return false;
        }

        log::info!(
            "extracting isosurface at {:.1}{} ({}, {})",
            value, self.unit, mode.label(), quality.label()
        );
        self.busy = true;
        true
    }

    /// Drain finished extractions. Call once per frame.
    pub fn poll(&mut self) -> Vec<IsoNotice> {
        let mut notices = Vec::new();

        while let Ok((meta, result)) = self.result_rx.try_recv() {
            self.busy = false;
            notices.push(self.handle_result(meta, result));
        }

        notices
    }

    fn handle_result(
        &mut self,
        meta: PendingMeta,
        result: Result<ExtractResponse, String>,
    ) -> IsoNotice {
        match result {
            Ok(response) if response.vertex_count() == 0 => {
                log::info!("no surface at {:.1}{}", meta.value, self.unit);
                IsoNotice::NoSurface { value: meta.value }
            }
            Ok(response) => {
                let index = self.register(meta, response);
                IsoNotice::Registered { index }
            }
            Err(error) => {
                log::warn!("isosurface extraction failed: {}", error);
                IsoNotice::Failed { error }
            }
        }
    }

    fn register(&mut self, meta: PendingMeta, response: ExtractResponse) -> usize {
        let colors = self.color_vertices(&meta, &response);
        let normals = response
            .normals
            .unwrap_or_else(|| flat_normals(&response.positions));

        let label = self.dedup_label(format!(
            "{:.1}{} ({}, {})",
            meta.value, self.unit, meta.mode.label(), meta.quality.label()
        ));
        log::info!("registered isosurface '{}' ({} triangles)", label, response.positions.len() / 3);

        self.records.push(IsosurfaceRecord {
            label,
            level_value: meta.value,
            color_mode: meta.mode,
            quality: meta.quality,
            mesh: ColoredMesh {
                positions: response.positions,
                normals,
                colors,
            },
            visible: true,
            gpu: None,
        });

        self.records.len() - 1
    }

    fn color_vertices(&self, meta: &PendingMeta, response: &ExtractResponse) -> Vec<[f32; 3]> {
        match meta.mode {
            ColorMode::Solid => {
                vec![self.anchors.color_for(meta.value); response.positions.len()]
            }
            ColorMode::Gradient => match &response.scalars {
                Some(scalars) if !scalars.is_empty() => {
                    let lo = scalars.iter().copied().fold(f32::INFINITY, f32::min);
                    let hi = scalars.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    let span = hi - lo;
                    let unit_anchors = ColormapAnchors::normalized();

                    scalars
                        .iter()
                        .map(|&s| {
                            let t = if span > 0.0 { (s - lo) / span } else { 0.5 };
                            unit_anchors.color_for(t)
                        })
                        .collect()
                }
                _ => vec![self.anchors.color_for(meta.value); response.positions.len()],
            },
        }
    }

    /// Append an incrementing suffix on label collision
    fn dedup_label(&self, base: String) -> String {
        if !self.records.iter().any(|r| r.label == base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{} #{}", base, n);
            if !self.records.iter().any(|r| r.label == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Toggle one overlay's visibility; geometry is retained
    pub fn toggle(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.visible = !record.visible;
            log::info!(
                "isosurface '{}' {}",
                record.label,
                if record.visible { "shown" } else { "hidden" }
            );
        }
    }

    /// Drop every registered overlay. The only disposal path; records
    /// otherwise accumulate for the whole session.
    pub fn clear_all(&mut self) {
        log::info!("clearing {} isosurfaces", self.records.len());
        self.records.clear();
    }
}

fn flat_normals(positions: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let mut normals = vec![[0.0, 0.0, 1.0]; positions.len()];
    for tri in positions.chunks_exact(3).enumerate() {
        let (i, p) = tri;
        let e1 = [p[1][0] - p[0][0], p[1][1] - p[0][1], p[1][2] - p[0][2]];
        let e2 = [p[2][0] - p[0][0], p[2][1] - p[0][1], p[2][2] - p[0][2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 1e-8 {
            let n = [n[0] / len, n[1] / len, n[2] / len];
            for v in 0..3 {
                normals[i * 3 + v] = n;
            }
        }
    }
    normals
}
