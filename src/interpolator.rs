use ndarray::ArrayView2;

pub(crate) struct Interpolator;

impl Interpolator {
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f64, f64, f64),
        original_dim: (usize, usize, usize),
    ) -> (u32, u32, u32) {
        let (x_spacing, y_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        let inv_min_spacing = 1.0 / min_spacing;

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        let new_x = (original_dim.2 as f64 * x_spacing * inv_min_spacing).round() as u32;
        let new_y = (original_dim.1 as f64 * y_spacing * inv_min_spacing).round() as u32;
        let new_z = (original_dim.0 as f64 * z_spacing * inv_min_spacing).round() as u32;

        (new_z, new_y, new_x)
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Nearest-neighbour resample of a binary mask, keeps hard edges.
    /// An empty source yields an all-false mask.
    pub(crate) fn nearest_resize(
        mask: &ArrayView2<bool>,
        height: usize,
        width: usize,
    ) -> ndarray::Array2<bool> {
        let (src_height, src_width) = mask.dim();
        if src_height == 0 || src_width == 0 {
            return ndarray::Array2::from_elem((height, width), false);
        }
        ndarray::Array2::from_shape_fn((height, width), |(y, x)| {
            let sy = ((y as f64 + 0.5) * src_height as f64 / height as f64) as usize;
            let sx = ((x as f64 + 0.5) * src_width as f64 / width as f64) as usize;
            mask[[sy.min(src_height - 1), sx.min(src_width - 1)]]
        })
    }
}
