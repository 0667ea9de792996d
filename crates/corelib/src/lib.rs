//! Core types: math re-exports, errors, MatrixStack.

use thiserror::Error;

pub use glam::{Mat4, Vec3, Vec4, vec3};

pub mod matrix_stack;

pub use matrix_stack::MatrixStack;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("matrix stack underflow: only the base matrix is left")]
    StackUnderflow,
    #[error("matrix stack overflow: capacity is {capacity} matrices")]
    StackOverflow { capacity: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;
