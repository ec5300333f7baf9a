//! The `distortion` module defines the capability set shared by lens distortion models.
//!
//! A camera projection layer holds one distortion model and dispatches to it through
//! the [`Distortion`] trait: `distort`, `undistort`, `distort_parameter_jacobian`,
//! `parameters` and `equals`. Variants form a closed set tagged by
//! [`DistortionType`], which is what equality compares before parameters.
//!
//! Two failure modes exist on the numeric path. Violated preconditions (for example a
//! parameter Jacobian buffer with the wrong number of columns) panic. Points outside
//! the valid domain of `undistort` come back non-finite; callers check
//! [`f64::is_finite`] instead of an error value. [`DistortionError`] is only returned
//! when a model is built or loaded.

use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use yaml_rust::{Yaml, YamlLoader};

pub mod fisheye;
pub mod null;

pub use fisheye::{FisheyeDistortion, FisheyeRegime, FisheyeTolerances};
pub use null::NullDistortion;

/// Discriminator for the closed family of distortion variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistortionType {
    /// No distortion, the identity map.
    Null,
    /// Single-parameter field-of-view fisheye model.
    Fisheye,
    /// Equidistant (Kannala-Brandt style) polynomial model.
    ///
    /// Only a tag: the model itself lives outside this crate. Files naming it are
    /// recognized and rejected with [`DistortionError::ModelMismatch`].
    Equidistant,
    /// Radial-tangential (plumb-bob) model. Only a tag, like [`DistortionType::Equidistant`].
    RadTan,
}

impl DistortionType {
    /// Name used for the `distortion_model` key in YAML camera files.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistortionType::Null => "none",
            DistortionType::Fisheye => "fisheye",
            DistortionType::Equidistant => "equidistant",
            DistortionType::RadTan => "radtan",
        }
    }

    /// Parses a `distortion_model` name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "null" => Some(DistortionType::Null),
            "fisheye" | "fov" => Some(DistortionType::Fisheye),
            "equidistant" => Some(DistortionType::Equidistant),
            "radtan" | "plumb_bob" => Some(DistortionType::RadTan),
            _ => None,
        }
    }
}

impl fmt::Display for DistortionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DistortionError {
    #[error("Invalid distortion parameters: {0}")]
    InvalidParams(String),
    #[error("Expected {expected} distortion parameters, found {found}")]
    ParameterCount { expected: usize, found: usize },
    #[error("Distortion model mismatch: expected '{expected}', found '{found}'")]
    ModelMismatch { expected: String, found: String },
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for DistortionError {
    fn from(err: std::io::Error) -> Self {
        DistortionError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for DistortionError {
    fn from(err: yaml_rust::ScanError) -> Self {
        DistortionError::YamlError(err.to_string())
    }
}

/// Trait defining the capability set of a lens distortion model.
///
/// Points are normalized image-plane coordinates. Implementations never mutate
/// their parameters, so one instance may be used from many threads at once; the
/// only writes go to the caller-owned point and Jacobian buffers.
pub trait Distortion: Send + Sync {
    /// The concrete variant of this model.
    fn distortion_type(&self) -> DistortionType;

    /// The parameter vector this model was built from.
    fn parameters(&self) -> &DVector<f64>;

    /// Number of distortion parameters, and therefore columns of the parameter Jacobian.
    fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    /// Distorts `point` in place.
    fn distort(&self, point: &mut Vector2<f64>);

    /// Writes the distorted `point` into `out_point`, leaving `point` untouched.
    fn distort_to(&self, point: &Vector2<f64>, out_point: &mut Vector2<f64>) {
        *out_point = *point;
        self.distort(out_point);
    }

    /// Distorts `point` in place and returns the 2x2 Jacobian of the distorted point
    /// with respect to the undistorted one, evaluated at the input point.
    fn distort_with_jacobian(&self, point: &mut Vector2<f64>) -> Matrix2<f64>;

    /// Removes distortion from `point` in place.
    ///
    /// Points outside the valid domain become non-finite.
    fn undistort(&self, point: &mut Vector2<f64>);

    /// Fills `out_jacobian` with the derivative of the distorted point with respect
    /// to each distortion parameter.
    ///
    /// # Panics
    ///
    /// Panics if `out_jacobian` does not have exactly [`Self::parameter_count`] columns.
    fn distort_parameter_jacobian(&self, point: &Vector2<f64>, out_jacobian: &mut Matrix2xX<f64>);

    /// Value equality across the distortion family.
    ///
    /// True only when `other` is the same variant and its parameter vector compares
    /// equal element by element. Never fails.
    fn equals(&self, other: &dyn Distortion) -> bool {
        self.distortion_type() == other.distortion_type()
            && self.parameters().len() == other.parameters().len()
            && self
                .parameters()
                .iter()
                .zip(other.parameters().iter())
                .all(|(a, b)| a == b)
    }

    /// Distorts every column of `points` in place.
    fn distort_points(&self, points: &mut Matrix2xX<f64>) {
        for mut column in points.column_iter_mut() {
            let mut point = Vector2::new(column[0], column[1]);
            self.distort(&mut point);
            column.copy_from(&point);
        }
    }

    /// Undistorts every column of `points` in place.
    fn undistort_points(&self, points: &mut Matrix2xX<f64>) {
        for mut column in points.column_iter_mut() {
            let mut point = Vector2::new(column[0], column[1]);
            self.undistort(&mut point);
            column.copy_from(&point);
        }
    }
}

impl fmt::Debug for dyn Distortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Distortion [type: {} parameters: {:?}]",
            self.distortion_type(),
            self.parameters().as_slice()
        )
    }
}

/// Common validation functions for distortion parameters
pub mod validation {
    use super::*;

    pub fn validate_parameter_count(
        parameters: &DVector<f64>,
        expected: usize,
    ) -> Result<(), DistortionError> {
        if parameters.len() != expected {
            return Err(DistortionError::ParameterCount {
                expected,
                found: parameters.len(),
            });
        }
        Ok(())
    }

    pub fn validate_finite(name: &str, value: f64) -> Result<(), DistortionError> {
        if !value.is_finite() {
            return Err(DistortionError::InvalidParams(format!(
                "{name} must be finite"
            )));
        }
        Ok(())
    }
}

/// Reads a YAML scalar as `f64`, accepting integers such as `1` as well as floats.
pub(crate) fn yaml_f64(value: &Yaml) -> Option<f64> {
    value.as_f64().or_else(|| value.as_i64().map(|v| v as f64))
}

/// Reads the `cam0` node of a kalibr-style camera YAML file.
///
/// Checks that `cam0/distortion_model` names the `expected` variant and returns the
/// node together with its `distortion_coeffs`.
pub(crate) fn load_camera_node(
    path: &str,
    expected: DistortionType,
) -> Result<(Yaml, Vec<f64>), DistortionError> {
    let contents = fs::read_to_string(path)?;
    let docs = YamlLoader::load_from_str(&contents)?;

    let doc = docs
        .into_iter()
        .next()
        .ok_or_else(|| DistortionError::InvalidParams("Empty YAML document".to_string()))?;
    let cam = doc["cam0"].clone();
    if cam.is_badvalue() {
        return Err(DistortionError::InvalidParams(
            "YAML missing 'cam0' section".to_string(),
        ));
    }

    let model_name = cam["distortion_model"].as_str().ok_or_else(|| {
        DistortionError::InvalidParams(
            "YAML missing 'distortion_model' under 'cam0'".to_string(),
        )
    })?;
    if DistortionType::from_name(model_name) != Some(expected) {
        return Err(DistortionError::ModelMismatch {
            expected: expected.to_string(),
            found: model_name.to_string(),
        });
    }

    let coeffs_yaml = cam["distortion_coeffs"].as_vec().ok_or_else(|| {
        DistortionError::InvalidParams(
            "YAML missing 'distortion_coeffs' array under 'cam0'".to_string(),
        )
    })?;
    let coeffs = coeffs_yaml
        .iter()
        .enumerate()
        .map(|(i, value)| {
            yaml_f64(value).ok_or_else(|| {
                DistortionError::InvalidParams(format!(
                    "Invalid distortion coefficient {i} in YAML: not a number"
                ))
            })
        })
        .collect::<Result<Vec<f64>, DistortionError>>()?;

    Ok((cam, coeffs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distortion_type_names() {
        for distortion_type in [
            DistortionType::Null,
            DistortionType::Fisheye,
            DistortionType::Equidistant,
            DistortionType::RadTan,
        ] {
            assert_eq!(
                DistortionType::from_name(distortion_type.as_str()),
                Some(distortion_type)
            );
        }
        assert_eq!(
            DistortionType::from_name(" FOV "),
            Some(DistortionType::Fisheye)
        );
        assert_eq!(DistortionType::from_name("double_sphere"), None);
    }

    #[test]
    fn test_validate_parameter_count() {
        let parameters = DVector::from_vec(vec![0.8, 0.1]);
        assert!(validation::validate_parameter_count(&parameters, 2).is_ok());
        assert!(matches!(
            validation::validate_parameter_count(&parameters, 1),
            Err(DistortionError::ParameterCount {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_validate_finite() {
        assert!(validation::validate_finite("w", 0.8).is_ok());
        assert!(matches!(
            validation::validate_finite("w", f64::NAN),
            Err(DistortionError::InvalidParams(msg)) if msg == "w must be finite"
        ));
    }

    #[test]
    fn test_yaml_f64_accepts_integers() {
        assert_eq!(yaml_f64(&Yaml::Real("0.5".to_string())), Some(0.5));
        assert_eq!(yaml_f64(&Yaml::Integer(2)), Some(2.0));
        assert_eq!(yaml_f64(&Yaml::String("two".to_string())), None);
        assert_eq!(yaml_f64(&Yaml::BadValue), None);
    }

    #[test]
    fn test_load_camera_node_missing_file() {
        let result = load_camera_node("samples/does_not_exist.yaml", DistortionType::Fisheye);
        assert!(matches!(result, Err(DistortionError::IOError(_))));
    }
}
