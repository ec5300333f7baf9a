//! Field-of-View (FOV) Fisheye Distortion
//!
//! This module implements the single-parameter fisheye distortion of Devernay and
//! Faugeras. It adheres to the [`Distortion`] trait defined in the parent
//! `distortion` module ([`crate::distortion`]).
//!
//! # Mathematical Model
//!
//! For a normalized undistorted point `p = (u, v)` with `r_u = ‖p‖`:
//!
//! ```text
//! tanwhalf = tan(w / 2)
//! r_rd     = atan(2 · tanwhalf · r_u) / (r_u · w)
//! p_d      = r_rd · p
//! ```
//!
//! and the inverse, for a distorted point with `r_d = ‖p_d‖`:
//!
//! ```text
//! r_u = tan(r_d · w) / (r_d · 2 · tan(w / 2))
//! p   = r_u · p_d
//! ```
//!
//! Both `w → 0` and `r_u → 0` are removable singularities. They are handled with the
//! exact limits of the formulas (see [`FisheyeRegime`]), and the point and parameter
//! Jacobians follow the same branch selection as the forward map.
//!
//! # References
//!
//! Devernay, F., & Faugeras, O. (2001). Straight lines have to be straight.
//! *Machine Vision and Applications*, 13(1), 14-24.

use crate::distortion::{
    load_camera_node, validation, yaml_f64, Distortion, DistortionError, DistortionType,
};
use log::{debug, info};
use nalgebra::{DVector, Matrix2, Matrix2xX, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;

/// Default threshold on `w²` and `r_u²` below which the limit formulas are used.
pub const DEFAULT_DEGENERATE_TOLERANCE: f64 = 1e-5;

/// Default bound on `|r_d · w|` accepted by `undistort` (89 degrees).
pub const DEFAULT_MAX_VALID_ANGLE: f64 = 89.0 * std::f64::consts::PI / 180.0;

/// Numeric tolerances selecting the fisheye evaluation branch.
///
/// The thresholds are strict: a value exactly equal to `degenerate_w_sq` or
/// `degenerate_radius_sq` takes the general branch. Both must be positive so that
/// `w = 0` and the origin always fall in a limit branch. The `max_valid_angle` bound
/// is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FisheyeTolerances {
    /// `w²` below this value makes the model the identity.
    pub degenerate_w_sq: f64,
    /// `r_u²` below this value uses the on-axis limit.
    pub degenerate_radius_sq: f64,
    /// Largest `|r_d · w|`, in radians, that `undistort` maps to a finite point.
    pub max_valid_angle: f64,
}

impl Default for FisheyeTolerances {
    fn default() -> Self {
        FisheyeTolerances {
            degenerate_w_sq: DEFAULT_DEGENERATE_TOLERANCE,
            degenerate_radius_sq: DEFAULT_DEGENERATE_TOLERANCE,
            max_valid_angle: DEFAULT_MAX_VALID_ANGLE,
        }
    }
}

impl FisheyeTolerances {
    pub fn validate(&self) -> Result<(), DistortionError> {
        for (name, value) in [
            ("degenerate_w_sq", self.degenerate_w_sq),
            ("degenerate_radius_sq", self.degenerate_radius_sq),
        ] {
            validation::validate_finite(name, value)?;
            if value <= 0.0 {
                return Err(DistortionError::InvalidParams(format!(
                    "{name} must be positive"
                )));
            }
        }
        validation::validate_finite("max_valid_angle", self.max_valid_angle)?;
        if self.max_valid_angle <= 0.0 {
            return Err(DistortionError::InvalidParams(
                "max_valid_angle must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Numeric regime of a single fisheye evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FisheyeRegime {
    /// `w²` is below tolerance: the model is the identity.
    Identity,
    /// `r²` is below tolerance: the radial scale is its on-axis limit `2·tan(w/2)/w`.
    NearAxis,
    /// Closed-form evaluation.
    General,
}

/// Implements the single-parameter fisheye (FOV) distortion.
///
/// The parameter vector holds exactly one value, `w`, the field-of-view parameter.
/// It is fixed at construction; reconfiguring means building a new instance.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{DVector, Vector2};
/// use fisheye_distortion::{Distortion, FisheyeDistortion};
///
/// let fisheye = FisheyeDistortion::new(&DVector::from_vec(vec![0.8])).unwrap();
/// let mut point = Vector2::new(0.6, 0.8);
/// fisheye.distort(&mut point);
/// assert!(point.norm() < 1.0);
///
/// fisheye.undistort(&mut point);
/// assert!((point - Vector2::new(0.6, 0.8)).norm() < 1e-9);
/// ```
#[derive(Clone)]
pub struct FisheyeDistortion {
    parameters: DVector<f64>,
    tolerances: FisheyeTolerances,
}

impl FisheyeDistortion {
    /// Number of entries in the parameter vector.
    pub const PARAMETER_COUNT: usize = 1;

    /// Creates a new [`FisheyeDistortion`] from a parameter vector `[w]`.
    ///
    /// A `w` close to zero is accepted and makes the model the identity.
    ///
    /// # Errors
    ///
    /// * [`DistortionError::ParameterCount`] if the vector does not hold exactly one value.
    /// * [`DistortionError::InvalidParams`] if `w` is not finite.
    pub fn new(parameters: &DVector<f64>) -> Result<Self, DistortionError> {
        let model = FisheyeDistortion {
            parameters: parameters.clone(),
            tolerances: FisheyeTolerances::default(),
        };
        model.validate_params()?;

        info!("new fisheye distortion is: {:?}", model);
        if model.regime(1.0) == FisheyeRegime::Identity {
            debug!("fisheye w = {} is in the identity regime", model.w());
        }
        Ok(model)
    }

    /// Shorthand for [`FisheyeDistortion::new`] with `[w]`.
    pub fn from_w(w: f64) -> Result<Self, DistortionError> {
        Self::new(&DVector::from_element(1, w))
    }

    /// Replaces the branch tolerances.
    pub fn with_tolerances(mut self, tolerances: FisheyeTolerances) -> Result<Self, DistortionError> {
        tolerances.validate()?;
        self.tolerances = tolerances;
        Ok(self)
    }

    /// The field-of-view parameter `w`.
    pub fn w(&self) -> f64 {
        self.parameters[0]
    }

    pub fn tolerances(&self) -> &FisheyeTolerances {
        &self.tolerances
    }

    pub fn validate_params(&self) -> Result<(), DistortionError> {
        validation::validate_parameter_count(&self.parameters, Self::PARAMETER_COUNT)?;
        validation::validate_finite("w", self.w())?;
        self.tolerances.validate()
    }

    /// Selects the evaluation branch for a point at radius `radius`.
    ///
    /// The `w` test takes precedence over the radius test.
    pub fn regime(&self, radius: f64) -> FisheyeRegime {
        let w = self.w();
        if w * w < self.tolerances.degenerate_w_sq {
            FisheyeRegime::Identity
        } else if radius * radius < self.tolerances.degenerate_radius_sq {
            FisheyeRegime::NearAxis
        } else {
            FisheyeRegime::General
        }
    }

    /// Ratio between distorted and undistorted radius at undistorted radius `r_u`.
    fn radial_scale(&self, r_u: f64) -> f64 {
        let w = self.w();
        let tanwhalf = (w / 2.0).tan();

        match self.regime(r_u) {
            FisheyeRegime::Identity => 1.0,
            FisheyeRegime::NearAxis => 2.0 * tanwhalf / w,
            FisheyeRegime::General => (2.0 * tanwhalf * r_u).atan() / (r_u * w),
        }
    }

    /// Jacobian of the distorted point with respect to the undistorted `point`.
    pub fn point_jacobian(&self, point: &Vector2<f64>) -> Matrix2<f64> {
        let w = self.w();
        let u = point.x;
        let v = point.y;
        let r_u = point.norm();

        match self.regime(r_u) {
            FisheyeRegime::Identity => Matrix2::identity(),
            // The scale does not depend on r_u in the limit.
            FisheyeRegime::NearAxis => Matrix2::identity() * (2.0 * (w / 2.0).tan() / w),
            FisheyeRegime::General => {
                let tanwhalf = (w / 2.0).tan();
                let tanwhalfsq = tanwhalf * tanwhalf;
                let atan_wrd = (2.0 * tanwhalf * r_u).atan();
                let r_u_cubed = r_u * r_u * r_u;
                let r_u_sq = u * u + v * v;
                let denom = w * r_u_sq * (4.0 * tanwhalfsq * r_u_sq + 1.0);

                let duf_du = atan_wrd / (w * r_u) - (u * u * atan_wrd) / (w * r_u_cubed)
                    + (2.0 * u * u * tanwhalf) / denom;
                let duf_dv =
                    (2.0 * u * v * tanwhalf) / denom - (u * v * atan_wrd) / (w * r_u_cubed);
                let dvf_du = duf_dv;
                let dvf_dv = atan_wrd / (w * r_u) - (v * v * atan_wrd) / (w * r_u_cubed)
                    + (2.0 * v * v * tanwhalf) / denom;

                Matrix2::new(duf_du, duf_dv, dvf_du, dvf_dv)
            }
        }
    }

    /// Derivative of the distorted `point` with respect to `w`.
    ///
    /// On the optical axis both rows hold the derivative of the on-axis scale
    /// `2·tan(w/2)/w`, independent of the point coordinates.
    pub fn parameter_jacobian(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let w = self.w();
        let u = point.x;
        let v = point.y;
        let r_u = point.norm();

        match self.regime(r_u) {
            FisheyeRegime::Identity => Vector2::zeros(),
            FisheyeRegime::NearAxis => {
                let cos_half = (w / 2.0).cos();
                Vector2::from_element((w - w.sin()) / (w * w * cos_half * cos_half))
            }
            FisheyeRegime::General => {
                let tanwhalf = (w / 2.0).tan();
                let tanwhalfsq = tanwhalf * tanwhalf;
                let atan_wrd = (2.0 * tanwhalf * r_u).atan();
                let denom = w * (4.0 * tanwhalfsq * r_u * r_u + 1.0);

                let dxd_dw =
                    (2.0 * u * (tanwhalfsq / 2.0 + 0.5)) / denom - (u * atan_wrd) / (w * w * r_u);
                let dyd_dw =
                    (2.0 * v * (tanwhalfsq / 2.0 + 0.5)) / denom - (v * atan_wrd) / (w * w * r_u);

                Vector2::new(dxd_dw, dyd_dw)
            }
        }
    }

    /// Loads a [`FisheyeDistortion`] from a kalibr-style YAML file.
    ///
    /// The file must contain `cam0/distortion_model: fisheye` and a one-element
    /// `cam0/distortion_coeffs` array. An optional `cam0/tolerances` mapping overrides
    /// the branch tolerances field by field.
    ///
    /// # Errors
    ///
    /// * [`DistortionError::IOError`] if the file cannot be read.
    /// * [`DistortionError::YamlError`] if the YAML cannot be parsed.
    /// * [`DistortionError::ModelMismatch`] if the file describes another distortion model.
    /// * [`DistortionError::InvalidParams`] / [`DistortionError::ParameterCount`] for
    ///   missing or invalid values.
    pub fn load_from_yaml(path: &str) -> Result<Self, DistortionError> {
        let (cam, coeffs) = load_camera_node(path, DistortionType::Fisheye)?;

        let mut tolerances = FisheyeTolerances::default();
        let tolerances_yaml = &cam["tolerances"];
        if !tolerances_yaml.is_badvalue() {
            let read = |key: &str, default: f64| -> Result<f64, DistortionError> {
                let value = &tolerances_yaml[key];
                if value.is_badvalue() {
                    return Ok(default);
                }
                yaml_f64(value).ok_or_else(|| {
                    DistortionError::InvalidParams(format!(
                        "Invalid {key} in YAML: not a number"
                    ))
                })
            };
            tolerances.degenerate_w_sq = read("degenerate_w_sq", tolerances.degenerate_w_sq)?;
            tolerances.degenerate_radius_sq =
                read("degenerate_radius_sq", tolerances.degenerate_radius_sq)?;
            tolerances.max_valid_angle = read("max_valid_angle", tolerances.max_valid_angle)?;
        }

        let model = Self::new(&DVector::from_vec(coeffs))?.with_tolerances(tolerances)?;
        info!("loaded fisheye distortion from {path}");
        Ok(model)
    }

    /// Saves the model to a YAML file readable by [`FisheyeDistortion::load_from_yaml`].
    ///
    /// # Errors
    ///
    /// * [`DistortionError::YamlError`] if serialization fails.
    /// * [`DistortionError::IOError`] if the file cannot be written.
    pub fn save_to_yaml(&self, path: &str) -> Result<(), DistortionError> {
        let yaml = serde_yaml::to_value(serde_yaml::Mapping::from_iter([(
            serde_yaml::Value::String("cam0".to_string()),
            serde_yaml::to_value(serde_yaml::Mapping::from_iter([
                (
                    serde_yaml::Value::String("distortion_model".to_string()),
                    serde_yaml::Value::String(DistortionType::Fisheye.to_string()),
                ),
                (
                    serde_yaml::Value::String("distortion_coeffs".to_string()),
                    serde_yaml::to_value(self.parameters.as_slice())
                        .map_err(|e| DistortionError::YamlError(e.to_string()))?,
                ),
                (
                    serde_yaml::Value::String("tolerances".to_string()),
                    serde_yaml::to_value(self.tolerances)
                        .map_err(|e| DistortionError::YamlError(e.to_string()))?,
                ),
            ]))
            .map_err(|e| DistortionError::YamlError(e.to_string()))?,
        )]))
        .map_err(|e| DistortionError::YamlError(e.to_string()))?;

        let yaml_string =
            serde_yaml::to_string(&yaml).map_err(|e| DistortionError::YamlError(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        info!("saved fisheye distortion to {path}");
        Ok(())
    }
}

/// Provides a debug string representation for [`FisheyeDistortion`].
impl fmt::Debug for FisheyeDistortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fisheye [w: {}]", self.w())
    }
}

impl PartialEq for FisheyeDistortion {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Distortion for FisheyeDistortion {
    fn distortion_type(&self) -> DistortionType {
        DistortionType::Fisheye
    }

    fn parameters(&self) -> &DVector<f64> {
        &self.parameters
    }

    fn distort(&self, point: &mut Vector2<f64>) {
        let r_rd = self.radial_scale(point.norm());
        *point *= r_rd;
    }

    fn distort_with_jacobian(&self, point: &mut Vector2<f64>) -> Matrix2<f64> {
        let jacobian = self.point_jacobian(point);
        self.distort(point);
        jacobian
    }

    /// Removes fisheye distortion from `point` in place.
    ///
    /// When `|r_d · w|` exceeds the maximum valid angle the point is scaled by
    /// `+inf`: non-zero coordinates become infinite and zero coordinates become NaN.
    /// The closed form is used for every other `r_d > 0`; only the origin itself,
    /// where it is 0/0, takes the limit `w / (2·tan(w/2))`.
    fn undistort(&self, point: &mut Vector2<f64>) {
        let w = self.w();
        let mul2tanwby2 = (w / 2.0).tan() * 2.0;
        let r_d = point.norm();

        let r_u = match self.regime(r_d) {
            FisheyeRegime::Identity => 1.0,
            _ if (r_d * w).abs() > self.tolerances.max_valid_angle => f64::INFINITY,
            _ if r_d == 0.0 => w / mul2tanwby2,
            _ => (r_d * w).tan() / (r_d * mul2tanwby2),
        };

        *point *= r_u;
    }

    fn distort_parameter_jacobian(&self, point: &Vector2<f64>, out_jacobian: &mut Matrix2xX<f64>) {
        assert_eq!(
            out_jacobian.ncols(),
            Self::PARAMETER_COUNT,
            "fisheye parameter Jacobian must have exactly one column"
        );
        out_jacobian.set_column(0, &self.parameter_jacobian(point));
    }
}
