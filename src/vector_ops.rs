use crate::config::Number;
use crate::error::{ClipdexError, Result};
use wide::f32x8;

/// An embedding in the shared image/text space.
///
/// Constructed through [`Vector::new`], which L2-normalizes the data. A
/// degenerate (zero-norm) input is kept as-is instead of being divided.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector(Vec<Number>);

impl Vector {
    pub fn new(mut values: Vec<Number>) -> Self {
        normalize_vector(&mut values);
        Vector(values)
    }

    /// Wrap values that are already unit length, leaving every bit untouched.
    pub fn from_normalized(values: Vec<Number>) -> Self {
        Vector(values)
    }

    pub fn as_slice(&self) -> &[Number] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn norm(&self) -> Number {
        magnitude(&self.0)
    }

    pub fn into_inner(self) -> Vec<Number> {
        self.0
    }

    pub fn dot(&self, other: &Vector) -> Result<Number> {
        dot_product_simd(&self.0, &other.0)
    }
}

/// Dot product of two vectors using SIMD operations.
/// When both inputs are normalized this is their cosine similarity.
pub fn dot_product_simd(a: &[Number], b: &[Number]) -> Result<Number> {
    if a.len() != b.len() {
        return Err(ClipdexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot_product = f32x8::splat(0.0);

    let len = a.len();
    let simd_len = len - (len % 8);

    // SIMD loop
    for i in (0..simd_len).step_by(8) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        dot_product += va * vb;
    }

    let mut scalar_dot_product = dot_product.reduce_add();

    // Handle remaining elements
    for i in simd_len..len {
        scalar_dot_product += a[i] * b[i];
    }

    Ok(scalar_dot_product)
}

/// Euclidean norm, accumulated in f64 so large or tiny components neither
/// overflow nor underflow the sum of squares.
fn magnitude_f64(vector: &[Number]) -> f64 {
    vector
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

pub fn magnitude(vector: &[Number]) -> Number {
    magnitude_f64(vector) as Number
}

/// Scale to unit length in place. Only an all-zero (or non-finite) vector is
/// left as-is.
pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude = magnitude_f64(vector);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return;
    }
    for x in vector.iter_mut() {
        *x = (f64::from(*x) / magnitude) as Number;
    }
}
