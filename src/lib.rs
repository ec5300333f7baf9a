//! Fisheye Distortion Library
//!
//! A Rust library implementing the closed-form single-parameter fisheye
//! (field-of-view) lens distortion used by camera geometry in visual
//! perception pipelines such as SLAM and visual odometry front ends.
//!
//! The library provides:
//! - The [`Distortion`] capability trait shared by every distortion variant
//! - [`FisheyeDistortion`], the field-of-view model with analytic point and
//!   parameter Jacobians
//! - [`NullDistortion`], the identity variant
//! - [`VisualFrame`], a channel-based per-frame container for keypoints,
//!   descriptors and images
//!
//! Distortion models are immutable after construction, so a single instance can be
//! shared between threads to distort large keypoint sets in parallel.

pub mod distortion;
pub mod frame;

// Re-export commonly used types
pub use distortion::{
    Distortion, DistortionError, DistortionType, FisheyeDistortion, FisheyeRegime,
    FisheyeTolerances, NullDistortion,
};

pub use frame::{Channels, VisualFrame};
