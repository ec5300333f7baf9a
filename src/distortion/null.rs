//! Identity distortion for cameras without lens distortion.

use crate::distortion::{Distortion, DistortionType};
use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};

/// The identity member of the distortion family. It has no parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NullDistortion {
    parameters: DVector<f64>,
}

impl NullDistortion {
    pub fn new() -> Self {
        NullDistortion {
            parameters: DVector::zeros(0),
        }
    }
}

impl Default for NullDistortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Distortion for NullDistortion {
    fn distortion_type(&self) -> DistortionType {
        DistortionType::Null
    }

    fn parameters(&self) -> &DVector<f64> {
        &self.parameters
    }

    fn distort(&self, _point: &mut Vector2<f64>) {}

    fn distort_with_jacobian(&self, _point: &mut Vector2<f64>) -> Matrix2<f64> {
        Matrix2::identity()
    }

    fn undistort(&self, _point: &mut Vector2<f64>) {}

    fn distort_parameter_jacobian(&self, _point: &Vector2<f64>, out_jacobian: &mut Matrix2xX<f64>) {
        assert_eq!(
            out_jacobian.ncols(),
            0,
            "null distortion has no parameters to differentiate"
        );
    }
}
