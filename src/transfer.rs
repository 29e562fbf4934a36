//! Rendering parameters handed to the external volume renderer.
//!
//! Nothing here renders. The tables describe how scalars map to colour and
//! opacity so any ray-casting backend can reproduce the viewer's look.

use serde::{Deserialize, Serialize};

/// Scalar break points of the body preset, shared by colour and opacity
const BODY_POINTS: [f64; 8] = [
    -643.781_066_894_531_25,
    -584.658_874_511_718_75,
    -382.659_240_722_656_25,
    -237.658_386_230_468_75,
    -75.406_066_894_531_25,
    114.594_116_210_937_5,
    316.593_627_929_687_5,
    461.593_75,
];

const BODY_COLORS: [(f64, f64, f64); 8] = [
    (0.0, 0.0, 0.0),
    (1.0, 0.0, 0.0),
    (1.0, 0.999_206_542_968_75, 0.0),
    (1.0, 1.0, 1.0),
    (0.0, 0.0, 0.0),
    (1.0, 0.0, 0.0),
    (1.0, 0.999_206_542_968_75, 0.0),
    (1.0, 1.0, 1.0),
];

const BODY_OPACITY: [f64; 8] = [
    0.0,
    0.269_316_554_069_519_04,
    0.469_691_306_352_615_36,
    0.518_999_934_196_472_17,
    0.0,
    0.279_316_604_137_420_65,
    0.288_999_944_925_308_23,
    0.288_999_944_925_308_23,
];

/// Piecewise-linear scalar -> value mapping, constant beyond the end points
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PiecewiseFunction {
    points: Vec<(f64, f64)>,
}

impl PiecewiseFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a control point, replacing any existing one at `x`
    pub fn add_point(&mut self, x: f64, y: f64) -> &mut Self {
        match self.points.binary_search_by(|(px, _)| px.total_cmp(&x)) {
            Ok(index) => self.points[index].1 = y,
            Err(index) => self.points.insert(index, (x, y)),
        }
        self
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Linear interpolation between control points, clamped at both ends.
    /// NaN maps to the first point.
    pub fn evaluate(&self, x: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if x.is_nan() || x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        let upper = self.points.partition_point(|(px, _)| *px <= x);
        let (x0, y0) = self.points[upper - 1];
        let (x1, y1) = self.points[upper];
        let t = (x - x0) / (x1 - x0);
        y0 + (y1 - y0) * t
    }
}

/// Scalar -> RGB mapping built from three piecewise channels
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorTransferFunction {
    red: PiecewiseFunction,
    green: PiecewiseFunction,
    blue: PiecewiseFunction,
}

impl ColorTransferFunction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rgb_point(&mut self, x: f64, r: f64, g: f64, b: f64) -> &mut Self {
        self.red.add_point(x, r);
        self.green.add_point(x, g);
        self.blue.add_point(x, b);
        self
    }

    pub fn evaluate(&self, x: f64) -> (f64, f64, f64) {
        (
            self.red.evaluate(x),
            self.green.evaluate(x),
            self.blue.evaluate(x),
        )
    }
}

/// Colour table for the anatomy volume
pub fn body_color() -> ColorTransferFunction {
    let mut color = ColorTransferFunction::new();
    for (x, (r, g, b)) in BODY_POINTS.iter().zip(BODY_COLORS) {
        color.add_rgb_point(*x, r, g, b);
    }
    color
}

pub fn body_opacity() -> PiecewiseFunction {
    let mut opacity = PiecewiseFunction::new();
    for (x, y) in BODY_POINTS.iter().zip(BODY_OPACITY) {
        opacity.add_point(*x, y);
    }
    opacity
}

/// Solid red for the editable mask
pub fn mask_color() -> ColorTransferFunction {
    let mut color = ColorTransferFunction::new();
    color
        .add_rgb_point(0.0, 1.0, 0.0, 0.0)
        .add_rgb_point(1000.0, 1.0, 0.0, 0.0);
    color
}

pub fn mask_opacity() -> PiecewiseFunction {
    let mut opacity = PiecewiseFunction::new();
    opacity
        .add_point(0.0, 0.0)
        .add_point(500.0, 1.0)
        .add_point(1000.0, 0.7)
        .add_point(1150.0, 0.03);
    opacity
}

pub fn gradient_opacity() -> PiecewiseFunction {
    let mut opacity = PiecewiseFunction::new();
    opacity
        .add_point(0.0, 0.0)
        .add_point(90.0, 0.5)
        .add_point(100.0, 1.0);
    opacity
}

/// Integer slider positions (0..=10) for the lighting model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingSliders {
    pub ambient: u8,
    pub diffuse: u8,
    pub specular: u8,
}

impl Default for ShadingSliders {
    fn default() -> Self {
        Self {
            ambient: 4,
            diffuse: 6,
            specular: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingParams {
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
}

impl From<ShadingSliders> for ShadingParams {
    fn from(sliders: ShadingSliders) -> Self {
        let scale = |v: u8| f64::from(v.min(10)) / 10.0;
        Self {
            ambient: scale(sliders.ambient),
            diffuse: scale(sliders.diffuse),
            specular: scale(sliders.specular),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    RayCast,
    IsoSurface { iso_value: u8 },
}

impl RenderMode {
    /// Iso-surface mode with the value clamped to the slider range 1..=255
    pub fn iso_surface(iso_value: u8) -> Self {
        RenderMode::IsoSurface {
            iso_value: iso_value.max(1),
        }
    }
}
