//! Normalized-coordinate geometry
//!
//! The analysis contract reports box coordinates on a 0-1000 grid,
//! independent of the rendered pixel size. This module maps those boxes
//! onto concrete display rectangles and owns the zoom state.

/// Upper bound of the normalized coordinate grid.
pub const NORM_SCALE: f32 = 1000.0;

/// Axis-aligned box in normalized page coordinates.
///
/// Stored as `[y_min, x_min, y_max, x_max]`, each in `[0, 1000]`.
/// Construction enforces `y_min <= y_max` and `x_min <= x_max`; degenerate
/// (zero-area) boxes are valid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub y_min: f32,
    pub x_min: f32,
    pub y_max: f32,
    pub x_max: f32,
}

impl NormalizedBox {
    /// Validate and build a box. `None` when any coordinate is non-finite,
    /// out of the 0-1000 range, or the min/max ordering is violated.
    #[must_use]
    pub fn try_new(y_min: f32, x_min: f32, y_max: f32, x_max: f32) -> Option<Self> {
        let coords = [y_min, x_min, y_max, x_max];
        if coords
            .iter()
            .any(|c| !c.is_finite() || *c < 0.0 || *c > NORM_SCALE)
        {
            return None;
        }
        if y_min > y_max || x_min > x_max {
            return None;
        }
        Some(Self {
            y_min,
            x_min,
            y_max,
            x_max,
        })
    }

    /// Build from the wire layout `[ymin, xmin, ymax, xmax]`.
    #[must_use]
    pub fn from_array(raw: [f32; 4]) -> Option<Self> {
        Self::try_new(raw[0], raw[1], raw[2], raw[3])
    }

    /// Map onto a rectangle in display units. The four components scale
    /// linearly by `display_dim / 1000`; callers pass pixel sizes for pixel
    /// output or `100.0` for percentages. Pure: no rounding, no clamping.
    #[must_use]
    pub fn to_rect(&self, display_width: f32, display_height: f32) -> DisplayRect {
        let sx = display_width / NORM_SCALE;
        let sy = display_height / NORM_SCALE;
        DisplayRect {
            top: self.y_min * sy,
            left: self.x_min * sx,
            width: (self.x_max - self.x_min) * sx,
            height: (self.y_max - self.y_min) * sy,
        }
    }
}

/// Rectangle in display units, as produced by [`NormalizedBox::to_rect`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayRect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    /// Uniformly scale all four components.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            top: self.top * factor,
            left: self.left * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Zoom state for the document view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    factor: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Zoom {
    /// Minimum allowed zoom factor
    pub const MIN_FACTOR: f32 = 0.5;
    /// Maximum allowed zoom factor
    pub const MAX_FACTOR: f32 = 3.0;
    /// Zoom in rate multiplier per step - 10%
    pub const ZOOM_IN_RATE: f32 = 1.1;
    /// Zoom out rate divisor per step - 5%
    pub const ZOOM_OUT_RATE: f32 = 1.05;

    /// Build a zoom state, clamping the factor into the valid range.
    #[must_use]
    pub fn new(factor: f32) -> Self {
        Self {
            factor: Self::clamp_factor(factor),
        }
    }

    /// Returns the current zoom factor
    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Zoom in by one step
    pub fn step_in(&mut self) {
        self.factor = Self::clamp_factor(self.factor * Self::ZOOM_IN_RATE);
    }

    /// Zoom out by one step
    pub fn step_out(&mut self) {
        self.factor = Self::clamp_factor(self.factor / Self::ZOOM_OUT_RATE);
    }

    /// Set the factor directly; out-of-range values clamp, never error.
    pub fn set(&mut self, factor: f32) {
        self.factor = Self::clamp_factor(factor);
    }

    /// Clamp factor to valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(Self::MIN_FACTOR, Self::MAX_FACTOR)
        }
    }
}
