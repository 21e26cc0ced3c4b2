//! Pan/zoom state for the price chart.
//!
//! Two coordinate spaces meet here:
//!
//! - **Pixel space** ([`PixelPos`]): offsets from the top-left corner of the plot
//!   frame. X grows to the right, Y grows downward.
//! - **Data space** ([`DataPos`]): chart coordinates (unix seconds, price). Y grows upward.
//!
//! [`Viewport`] is the visible data rectangle and [`ViewportController`] owns it
//! together with the pan gesture. Nothing here touches a rendering surface; the
//! GUI feeds pointer events in and reads the rectangle back out.

use crate::config::{VIEWPORT_MARGIN, ZOOM_STEP};
use crate::error::{ViewportError, ViewportResult};

/// Pointer position in pixels relative to the plot frame's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn ensure_finite(self) -> ViewportResult<Self> {
        if self.x.is_finite() && self.y.is_finite() {
            Ok(self)
        } else {
            Err(ViewportError::NonFinitePointer { x: self.x, y: self.y })
        }
    }
}

/// A point in chart data coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataPos {
    pub x: f64,
    pub y: f64,
}

impl DataPos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel extent of the plot frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    width: f64,
    height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> ViewportResult<Self> {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            Ok(Self { width, height })
        } else {
            Err(ViewportError::InvalidCanvas { width, height })
        }
    }

    #[must_use]
    pub fn width(self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn height(self) -> f64 {
        self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Scrolling up (positive delta) zooms in, scrolling down zooms out.
    #[must_use]
    pub fn from_scroll_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Self::In)
        } else if delta < 0.0 {
            Some(Self::Out)
        } else {
            None
        }
    }

    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::In => 1.0 / ZOOM_STEP,
            Self::Out => ZOOM_STEP,
        }
    }
}

/// Visible data rectangle. Always satisfies `x_min < x_max` and `y_min < y_max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Viewport {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> ViewportResult<Self> {
        let finite = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite());
        // Spans must also be finite, otherwise the pixel transform overflows.
        if finite
            && x_min < x_max
            && y_min < y_max
            && (x_max - x_min).is_finite()
            && (y_max - y_min).is_finite()
        {
            Ok(Self { x_min, x_max, y_min, y_max })
        } else {
            Err(ViewportError::Degenerate { x_min, x_max, y_min, y_max })
        }
    }

    /// Smallest rectangle covering `points`, padded by [`VIEWPORT_MARGIN`] on every side.
    ///
    /// A flat axis (all values equal) is widened around its value so the result
    /// is never degenerate.
    pub fn fit<I>(points: I) -> ViewportResult<Self>
    where
        I: IntoIterator<Item = DataPos>,
    {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for p in points.into_iter().filter(|p| p.x.is_finite() && p.y.is_finite()) {
            bounds = Some(match bounds {
                None => (p.x, p.x, p.y, p.y),
                Some((x0, x1, y0, y1)) => (x0.min(p.x), x1.max(p.x), y0.min(p.y), y1.max(p.y)),
            });
        }
        let (x_min, x_max, y_min, y_max) = bounds.ok_or(ViewportError::EmptyExtent)?;
        let (x_min, x_max) = pad_axis(x_min, x_max);
        let (y_min, y_max) = pad_axis(y_min, y_max);
        Self::new(x_min, x_max, y_min, y_max)
    }

    #[must_use]
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    #[must_use]
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    #[must_use]
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    #[must_use]
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    #[must_use]
    pub fn pixel_to_data(&self, canvas: CanvasSize, pixel: PixelPos) -> DataPos {
        DataPos {
            x: self.x_min + pixel.x / canvas.width * self.width(),
            y: self.y_max - pixel.y / canvas.height * self.height(),
        }
    }

    #[must_use]
    pub fn data_to_pixel(&self, canvas: CanvasSize, data: DataPos) -> PixelPos {
        PixelPos {
            x: (data.x - self.x_min) / self.width() * canvas.width,
            y: (self.y_max - data.y) / self.height() * canvas.height,
        }
    }

    /// Scales both spans by `direction`'s factor, keeping the data point under
    /// `pointer` at the same pixel.
    pub fn zoomed(
        &self,
        canvas: CanvasSize,
        pointer: PixelPos,
        direction: ZoomDirection,
    ) -> ViewportResult<Self> {
        let pointer = pointer.ensure_finite()?;
        let anchor = self.pixel_to_data(canvas, pointer);
        let factor = direction.factor();

        let new_width = self.width() * factor;
        let new_height = self.height() * factor;
        let x_ratio = (anchor.x - self.x_min) / self.width();
        let y_ratio = (anchor.y - self.y_min) / self.height();

        Self::new(
            anchor.x - new_width * x_ratio,
            anchor.x + new_width * (1.0 - x_ratio),
            anchor.y - new_height * y_ratio,
            anchor.y + new_height * (1.0 - y_ratio),
        )
    }

    /// Shifts the rectangle so content follows a drag from `from` to `to`.
    pub fn panned(&self, canvas: CanvasSize, from: PixelPos, to: PixelPos) -> ViewportResult<Self> {
        let from = from.ensure_finite()?;
        let to = to.ensure_finite()?;
        let dx_data = (to.x - from.x) / canvas.width * self.width();
        // Measured along pixel rows, which run opposite to the data y axis.
        let dy_data = (to.y - from.y) / canvas.height * self.height();

        Self::new(
            self.x_min - dx_data,
            self.x_max - dx_data,
            self.y_min + dy_data,
            self.y_max + dy_data,
        )
    }
}

fn pad_axis(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span > 0.0 {
        let pad = span * VIEWPORT_MARGIN;
        (min - pad, max + pad)
    } else {
        let pad = (min.abs() * VIEWPORT_MARGIN).max(1.0);
        (min - pad, max + pad)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Panning { last: PixelPos },
}

/// Owns the chart viewport and the in-flight pan gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    home: Viewport,
    viewport: Viewport,
    gesture: GestureState,
}

impl ViewportController {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            home: viewport,
            viewport,
            gesture: GestureState::Idle,
        }
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    #[must_use]
    pub fn is_panning(&self) -> bool {
        matches!(self.gesture, GestureState::Panning { .. })
    }

    /// Applies one scroll notch. Returns `Ok(false)` when nothing changed: a
    /// zero delta, or a pan in progress.
    pub fn zoom(&mut self, canvas: CanvasSize, pointer: PixelPos, scroll_delta: f64) -> ViewportResult<bool> {
        if self.is_panning() {
            return Ok(false);
        }
        let Some(direction) = ZoomDirection::from_scroll_delta(scroll_delta) else {
            return Ok(false);
        };
        self.viewport = self.viewport.zoomed(canvas, pointer, direction)?;
        Ok(true)
    }

    pub fn start_pan(&mut self, pointer: PixelPos) {
        self.gesture = GestureState::Panning { last: pointer };
    }

    /// Moves the viewport by the pointer travel since the previous motion event.
    /// Without an active gesture this is a no-op returning `Ok(false)`.
    pub fn pan(&mut self, canvas: CanvasSize, pointer: PixelPos) -> ViewportResult<bool> {
        let GestureState::Panning { last } = self.gesture else {
            return Ok(false);
        };
        self.viewport = self.viewport.panned(canvas, last, pointer)?;
        self.gesture = GestureState::Panning { last: pointer };
        Ok(true)
    }

    pub fn end_pan(&mut self) {
        self.gesture = GestureState::Idle;
    }

    /// Returns to the rectangle the controller was created with.
    pub fn reset(&mut self) {
        self.viewport = self.home;
        self.gesture = GestureState::Idle;
    }
}
