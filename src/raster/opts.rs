use crate::foundation::core::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::foundation::error::{PolyscanError, PolyscanResult};

/// Renderer configuration.
///
/// Deserializes from JSON with every field optional; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RendererOpts {
    /// Polygons accepted per frame before a submission forces a barrier.
    pub max_polygons: usize,
    /// Add one pixel to the right end of every span.
    pub include_right_edge: bool,
    /// Walk one extra scanline past each polygon's bottom vertex.
    pub include_bottom_edge: bool,
    /// Addressable columns; spans are clipped to `0..frame_width`.
    pub frame_width: i32,
    /// Addressable scanlines; also determines the number of buckets.
    pub frame_height: i32,
    /// Run setup on the submitting thread and return exact pixel counts.
    ///
    /// When `false`, setup is queued on the worker pool and submissions return 0.
    pub inline_setup: bool,
    /// Worker thread count; rayon's default when `None`.
    pub threads: Option<usize>,
    /// Ceiling on concurrent setup pumps in deferred mode.
    pub setup_workers: usize,
    /// Cap on extent blocks held at once. Acquisitions past the cap fail and their bucket is
    /// dropped for that polygon.
    pub run_block_limit: Option<usize>,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            max_polygons: 4096,
            include_right_edge: false,
            include_bottom_edge: false,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            inline_setup: true,
            threads: None,
            setup_workers: 4,
            run_block_limit: None,
        }
    }
}

impl RendererOpts {
    /// Parse options from JSON and validate them.
    pub fn from_json(text: &str) -> PolyscanResult<Self> {
        let opts: Self = serde_json::from_str(text)
            .map_err(|e| PolyscanError::serde(format!("renderer options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check that every field is within range.
    pub fn validate(&self) -> PolyscanResult<()> {
        if self.max_polygons == 0 {
            return Err(PolyscanError::validation(
                "renderer 'max_polygons' must be >= 1",
            ));
        }
        if self.frame_width <= 0 || self.frame_height <= 0 {
            return Err(PolyscanError::validation(format!(
                "renderer frame must be non-empty, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.threads == Some(0) {
            return Err(PolyscanError::validation(
                "renderer 'threads' must be >= 1 when set",
            ));
        }
        if self.setup_workers == 0 {
            return Err(PolyscanError::validation(
                "renderer 'setup_workers' must be >= 1",
            ));
        }
        if self.run_block_limit == Some(0) {
            return Err(PolyscanError::validation(
                "renderer 'run_block_limit' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/opts.rs"]
mod tests;
