//! The `frame` module holds per-frame measurement data.
//!
//! A [`VisualFrame`] stores the keypoints, descriptors and image extracted from one
//! camera image in named [`Channels`]. The built-in channels have typed accessors;
//! any other data can be attached through the generic channel interface.
//!
//! Every getter panics when its channel was never set, mirroring the channel
//! contract. Use the `has_*` methods to check first.

use crate::distortion::Distortion;
use image::DynamicImage;
use nalgebra::{DMatrix, DVector, Matrix2xX, Vector2};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub mod channel;

pub use channel::Channels;

/// Names of the built-in channels.
pub mod channel_names {
    pub const KEYPOINT_MEASUREMENTS: &str = "VISUAL_KEYPOINT_MEASUREMENTS";
    pub const KEYPOINT_MEASUREMENT_UNCERTAINTIES: &str =
        "VISUAL_KEYPOINT_MEASUREMENT_UNCERTAINTIES";
    pub const KEYPOINT_ORIENTATIONS: &str = "VISUAL_KEYPOINT_ORIENTATIONS";
    pub const KEYPOINT_SCALES: &str = "VISUAL_KEYPOINT_SCALES";
    pub const BRISK_DESCRIPTORS: &str = "BRISK_DESCRIPTORS";
    pub const RAW_IMAGE: &str = "RAW_IMAGE";
}

use channel_names::*;

/// Binary descriptors, one descriptor per column.
pub type DescriptorsT = DMatrix<u8>;

/// Measurement container for a single camera image.
#[derive(Default)]
pub struct VisualFrame {
    channels: Channels,
    distortion: Option<Arc<dyn Distortion>>,
}

impl VisualFrame {
    /// Creates a frame with every built-in channel unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_distortion(&mut self, distortion: Option<Arc<dyn Distortion>>) {
        self.distortion = distortion;
    }

    /// The lens distortion of the camera that produced this frame, if any.
    pub fn distortion(&self) -> Option<&Arc<dyn Distortion>> {
        self.distortion.as_ref()
    }

    // Generic channels.

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.has_channel(name)
    }

    pub fn add_channel<T: Any + Send + Sync + Default>(&mut self, name: &str) {
        self.channels.add_channel::<T>(name);
    }

    pub fn set_channel_data<T: Any + Send + Sync>(&mut self, name: &str, value: T) {
        self.channels.set_channel_data(name, value);
    }

    pub fn channel_data<T: Any>(&self, name: &str) -> &T {
        self.channels.channel_data(name)
    }

    pub fn channel_data_mut<T: Any>(&mut self, name: &str) -> &mut T {
        self.channels.channel_data_mut(name)
    }

    // Keypoint measurements.

    pub fn has_keypoint_measurements(&self) -> bool {
        self.has_channel(KEYPOINT_MEASUREMENTS)
    }

    pub fn set_keypoint_measurements(&mut self, measurements: Matrix2xX<f64>) {
        self.channels
            .insert_channel_data(KEYPOINT_MEASUREMENTS, measurements);
    }

    pub fn keypoint_measurements(&self) -> &Matrix2xX<f64> {
        self.channel_data(KEYPOINT_MEASUREMENTS)
    }

    pub fn keypoint_measurements_mut(&mut self) -> &mut Matrix2xX<f64> {
        self.channel_data_mut(KEYPOINT_MEASUREMENTS)
    }

    pub fn keypoint_measurement(&self, index: usize) -> Vector2<f64> {
        self.keypoint_measurements().column(index).into_owned()
    }

    // Keypoint measurement uncertainties.

    pub fn has_keypoint_measurement_uncertainties(&self) -> bool {
        self.has_channel(KEYPOINT_MEASUREMENT_UNCERTAINTIES)
    }

    pub fn set_keypoint_measurement_uncertainties(&mut self, uncertainties: DVector<f64>) {
        self.channels
            .insert_channel_data(KEYPOINT_MEASUREMENT_UNCERTAINTIES, uncertainties);
    }

    pub fn keypoint_measurement_uncertainties(&self) -> &DVector<f64> {
        self.channel_data(KEYPOINT_MEASUREMENT_UNCERTAINTIES)
    }

    pub fn keypoint_measurement_uncertainties_mut(&mut self) -> &mut DVector<f64> {
        self.channel_data_mut(KEYPOINT_MEASUREMENT_UNCERTAINTIES)
    }

    pub fn keypoint_measurement_uncertainty(&self, index: usize) -> f64 {
        self.keypoint_measurement_uncertainties()[index]
    }

    // Keypoint orientations.

    pub fn has_keypoint_orientations(&self) -> bool {
        self.has_channel(KEYPOINT_ORIENTATIONS)
    }

    pub fn set_keypoint_orientations(&mut self, orientations: DVector<f64>) {
        self.channels
            .insert_channel_data(KEYPOINT_ORIENTATIONS, orientations);
    }

    pub fn keypoint_orientations(&self) -> &DVector<f64> {
        self.channel_data(KEYPOINT_ORIENTATIONS)
    }

    pub fn keypoint_orientations_mut(&mut self) -> &mut DVector<f64> {
        self.channel_data_mut(KEYPOINT_ORIENTATIONS)
    }

    pub fn keypoint_orientation(&self, index: usize) -> f64 {
        self.keypoint_orientations()[index]
    }

    // Keypoint scales.

    pub fn has_keypoint_scales(&self) -> bool {
        self.has_channel(KEYPOINT_SCALES)
    }

    pub fn set_keypoint_scales(&mut self, scales: DVector<f64>) {
        self.channels.insert_channel_data(KEYPOINT_SCALES, scales);
    }

    pub fn keypoint_scales(&self) -> &DVector<f64> {
        self.channel_data(KEYPOINT_SCALES)
    }

    pub fn keypoint_scales_mut(&mut self) -> &mut DVector<f64> {
        self.channel_data_mut(KEYPOINT_SCALES)
    }

    pub fn keypoint_scale(&self, index: usize) -> f64 {
        self.keypoint_scales()[index]
    }

    // BRISK descriptors.

    pub fn has_brisk_descriptors(&self) -> bool {
        self.has_channel(BRISK_DESCRIPTORS)
    }

    pub fn set_brisk_descriptors(&mut self, descriptors: DescriptorsT) {
        self.channels
            .insert_channel_data(BRISK_DESCRIPTORS, descriptors);
    }

    pub fn brisk_descriptors(&self) -> &DescriptorsT {
        self.channel_data(BRISK_DESCRIPTORS)
    }

    pub fn brisk_descriptors_mut(&mut self) -> &mut DescriptorsT {
        self.channel_data_mut(BRISK_DESCRIPTORS)
    }

    /// Bytes of descriptor `index`, borrowed from the descriptor matrix.
    ///
    /// # Panics
    ///
    /// Panics if the descriptors are unset or `index` is out of range.
    pub fn brisk_descriptor(&self, index: usize) -> &[u8] {
        let descriptors = self.brisk_descriptors();
        assert!(
            index < descriptors.ncols(),
            "descriptor index {index} out of range for {} descriptors",
            descriptors.ncols()
        );
        let rows = descriptors.nrows();
        &descriptors.as_slice()[index * rows..(index + 1) * rows]
    }

    // Raw image.

    pub fn has_image(&self) -> bool {
        self.has_channel(RAW_IMAGE)
    }

    pub fn set_image(&mut self, image: DynamicImage) {
        self.channels.insert_channel_data(RAW_IMAGE, image);
    }

    pub fn image(&self) -> &DynamicImage {
        self.channel_data(RAW_IMAGE)
    }

    pub fn image_mut(&mut self) -> &mut DynamicImage {
        self.channel_data_mut(RAW_IMAGE)
    }
}

impl fmt::Debug for VisualFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualFrame")
            .field("channels", &self.channels)
            .field("distortion", &self.distortion.as_deref())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::FisheyeDistortion;
    use image::{Rgb, RgbImage};

    fn sample_vector(len: usize) -> DVector<f64> {
        DVector::from_fn(len, |i, _| (i as f64 * 0.37).sin())
    }

    #[test]
    fn test_new_frame_is_empty() {
        let frame = VisualFrame::new();
        assert!(!frame.has_keypoint_measurements());
        assert!(!frame.has_keypoint_measurement_uncertainties());
        assert!(!frame.has_keypoint_orientations());
        assert!(!frame.has_keypoint_scales());
        assert!(!frame.has_brisk_descriptors());
        assert!(!frame.has_image());
        assert!(frame.distortion().is_none());
    }

    #[test]
    fn test_set_get_distortion() {
        let mut frame = VisualFrame::new();
        let distortion: Arc<dyn Distortion> = Arc::new(FisheyeDistortion::from_w(0.8).unwrap());
        frame.set_distortion(Some(Arc::clone(&distortion)));
        assert!(Arc::ptr_eq(frame.distortion().unwrap(), &distortion));

        frame.set_distortion(None);
        assert!(frame.distortion().is_none());
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_keypoint_measurements_panics() {
        let frame = VisualFrame::new();
        let _ = frame.keypoint_measurements();
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_keypoint_measurement_panics() {
        let frame = VisualFrame::new();
        let _ = frame.keypoint_measurement(0);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_uncertainties_panics() {
        let frame = VisualFrame::new();
        let _ = frame.keypoint_measurement_uncertainty(0);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_orientations_panics() {
        let frame = VisualFrame::new();
        let _ = frame.keypoint_orientations();
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_scales_mut_panics() {
        let mut frame = VisualFrame::new();
        let _ = frame.keypoint_scales_mut();
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_descriptor_panics() {
        let frame = VisualFrame::new();
        let _ = frame.brisk_descriptor(0);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_unset_image_mut_panics() {
        let mut frame = VisualFrame::new();
        let _ = frame.image_mut();
    }

    #[test]
    fn test_set_get_descriptors() {
        let mut frame = VisualFrame::new();
        let data = DescriptorsT::from_fn(48, 10, |r, c| (r * 7 + c * 13) as u8);
        frame.set_brisk_descriptors(data.clone());

        let data_ptr: *const DescriptorsT = frame.brisk_descriptors();
        assert_eq!(frame.brisk_descriptors(), &data);
        assert!(std::ptr::eq(frame.brisk_descriptors_mut() as *const _, data_ptr));

        for i in 0..data.ncols() {
            let descriptor = frame.brisk_descriptor(i);
            assert_eq!(descriptor.len(), 48);
            assert!(std::ptr::eq(&descriptor[0], &frame.brisk_descriptors()[(0, i)]));
            assert_eq!(descriptor.to_vec(), data.column(i).iter().copied().collect::<Vec<u8>>());
        }
    }

    #[test]
    fn test_set_get_keypoint_measurements() {
        let mut frame = VisualFrame::new();
        let data = Matrix2xX::from_fn(10, |r, c| r as f64 * 0.5 - c as f64 * 1.25);
        frame.set_keypoint_measurements(data.clone());

        let data_ptr: *const Matrix2xX<f64> = frame.keypoint_measurements();
        assert_eq!(frame.keypoint_measurements(), &data);
        assert!(std::ptr::eq(frame.keypoint_measurements_mut() as *const _, data_ptr));

        for i in 0..data.ncols() {
            assert_eq!(frame.keypoint_measurement(i), data.column(i).into_owned());
        }
    }

    #[test]
    fn test_set_get_keypoint_vectors() {
        let mut frame = VisualFrame::new();
        let data = sample_vector(10);
        frame.set_keypoint_measurement_uncertainties(data.clone());
        frame.set_keypoint_orientations(data.clone() * 2.0);
        frame.set_keypoint_scales(data.clone() * 3.0);

        let ptr: *const DVector<f64> = frame.keypoint_measurement_uncertainties();
        assert!(std::ptr::eq(frame.keypoint_measurement_uncertainties_mut() as *const _, ptr));
        let ptr: *const DVector<f64> = frame.keypoint_orientations();
        assert!(std::ptr::eq(frame.keypoint_orientations_mut() as *const _, ptr));
        let ptr: *const DVector<f64> = frame.keypoint_scales();
        assert!(std::ptr::eq(frame.keypoint_scales_mut() as *const _, ptr));

        for i in 0..data.len() {
            assert_eq!(frame.keypoint_measurement_uncertainty(i), data[i]);
            assert_eq!(frame.keypoint_orientation(i), data[i] * 2.0);
            assert_eq!(frame.keypoint_scale(i), data[i] * 3.0);
        }
    }

    #[test]
    fn test_mutation_through_mut_getter() {
        let mut frame = VisualFrame::new();
        frame.set_keypoint_scales(sample_vector(4));
        frame.keypoint_scales_mut()[2] = 42.0;
        assert_eq!(frame.keypoint_scale(2), 42.0);
    }

    #[test]
    fn test_named_channel() {
        let mut frame = VisualFrame::new();
        let data = sample_vector(10);
        let channel_name = "test_channel";

        assert!(!frame.has_channel(channel_name));
        frame.add_channel::<DVector<f64>>(channel_name);
        assert!(frame.has_channel(channel_name));
        frame.set_channel_data(channel_name, data.clone());

        assert_eq!(frame.channel_data::<DVector<f64>>(channel_name), &data);
        let ptr: *const DVector<f64> = frame.channel_data::<DVector<f64>>(channel_name);
        assert!(std::ptr::eq(
            frame.channel_data_mut::<DVector<f64>>(channel_name) as *const _,
            ptr
        ));
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_named_channel_get_before_add_panics() {
        let frame = VisualFrame::new();
        let _ = frame.channel_data::<DVector<f64>>("test_channel");
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn test_add_builtin_channel_twice_panics() {
        let mut frame = VisualFrame::new();
        frame.set_keypoint_scales(sample_vector(3));
        frame.add_channel::<DVector<f64>>(KEYPOINT_SCALES);
    }

    #[test]
    fn test_set_get_image() {
        let mut frame = VisualFrame::new();
        let data = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([7, 7, 7])));
        frame.set_image(data.clone());

        assert_eq!(frame.image(), &data);
        let ptr: *const DynamicImage = frame.image();
        assert!(std::ptr::eq(frame.image_mut() as *const _, ptr));
    }
}
