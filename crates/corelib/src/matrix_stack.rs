//! Matrix stack in the style of the fixed-function transform pipeline.
//!
//! The bottom entry is an identity base that is never removed. Storage is an
//! inline array, so a stack can live on the call stack or be reused across
//! frames with [`MatrixStack::reset`] without touching the heap.

use std::fmt;

use crate::{CoreError, CoreResult, Mat4, Vec3, Vec4};

/// Maximum number of matrices a stack holds, base included.
pub const MAX_DEPTH: usize = 32;

#[derive(Clone, Debug)]
pub struct MatrixStack {
    matrices: [Mat4; MAX_DEPTH],
    /// Index of the current top. Zero means only the base is present.
    top: usize,
}

impl MatrixStack {
    pub fn new() -> Self {
        Self {
            matrices: [Mat4::IDENTITY; MAX_DEPTH],
            top: 0,
        }
    }

    /// Drop everything above the base and reset the base to identity.
    pub fn reset(&mut self) {
        self.top = 0;
        self.matrices[0] = Mat4::IDENTITY;
    }

    /// Number of matrices pushed above the base.
    #[inline]
    pub fn depth(&self) -> usize {
        self.top
    }

    /// Duplicate the current top.
    pub fn push_matrix(&mut self) -> CoreResult<()> {
        if self.top + 1 >= MAX_DEPTH {
            return Err(CoreError::StackOverflow {
                capacity: MAX_DEPTH,
            });
        }
        self.matrices[self.top + 1] = self.matrices[self.top];
        self.top += 1;
        Ok(())
    }

    /// Remove the current top. Popping the base is an error.
    pub fn pop_matrix(&mut self) -> CoreResult<()> {
        if self.top == 0 {
            return Err(CoreError::StackUnderflow);
        }
        self.top -= 1;
        Ok(())
    }

    #[inline]
    pub fn top_matrix(&self) -> Mat4 {
        self.matrices[self.top]
    }

    #[inline]
    fn top_mut(&mut self) -> &mut Mat4 {
        &mut self.matrices[self.top]
    }

    pub fn load_identity(&mut self) {
        *self.top_mut() = Mat4::IDENTITY;
    }

    /// Post-multiply the top by `m`.
    pub fn mult_matrix(&mut self, m: Mat4) {
        let top = self.top_mut();
        *top = *top * m;
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.mult_matrix(Mat4::from_translation(offset));
    }

    pub fn scale(&mut self, factors: Vec3) {
        self.mult_matrix(Mat4::from_scale(factors));
    }

    pub fn scale_uniform(&mut self, factor: f32) {
        self.scale(Vec3::splat(factor));
    }

    /// Rotate by `angle` radians about `axis`. The axis need not be unit length.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.mult_matrix(Mat4::from_axis_angle(axis.normalize(), angle));
    }

    /// Replace the top with an OpenGL-style perspective projection (z in [-1, 1]).
    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        *self.top_mut() = Mat4::perspective_rh_gl(fovy, aspect, near, far);
    }

    /// Replace the top with an OpenGL-style orthographic projection.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        *self.top_mut() = Mat4::orthographic_rh_gl(left, right, bottom, top, near, far);
    }

    /// Replace the top with an OpenGL-style off-center perspective frustum.
    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        let rl = right - left;
        let tb = top - bottom;
        let fnr = far - near;
        *self.top_mut() = Mat4::from_cols(
            Vec4::new(2.0 * near / rl, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * near / tb, 0.0, 0.0),
            Vec4::new((right + left) / rl, (top + bottom) / tb, -(far + near) / fnr, -1.0),
            Vec4::new(0.0, 0.0, -2.0 * far * near / fnr, 0.0),
        );
    }

    /// Replace the top with a right-handed view matrix.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        *self.top_mut() = Mat4::look_at_rh(eye, target, up);
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints the top matrix row by row.
impl fmt::Display for MatrixStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.top_matrix();
        for row in 0..4 {
            let r = m.row(row);
            writeln!(f, "{:>10.4} {:>10.4} {:>10.4} {:>10.4}", r.x, r.y, r.z, r.w)?;
        }
        Ok(())
    }
}
