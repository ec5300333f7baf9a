//! Named, typed data slots attached to a frame.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

/// A set of named channels, each holding one value of a fixed type.
///
/// Reading a missing channel, or reading it as the wrong type, is a programming
/// error and panics. Use [`Channels::has_channel`] to test for presence.
#[derive(Default)]
pub struct Channels {
    channels: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Number of channels currently declared.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Declares channel `name` holding `T::default()`.
    ///
    /// # Panics
    ///
    /// Panics if a channel with this name already exists.
    pub fn add_channel<T: Any + Send + Sync + Default>(&mut self, name: &str) {
        if self.has_channel(name) {
            panic!("channel '{name}' already exists");
        }
        self.channels.insert(name.to_string(), Box::new(T::default()));
    }

    /// Overwrites the value of channel `name`.
    ///
    /// # Panics
    ///
    /// Panics if the channel does not exist or holds another type.
    pub fn set_channel_data<T: Any + Send + Sync>(&mut self, name: &str, value: T) {
        *self.channel_data_mut::<T>(name) = value;
    }

    /// Declares channel `name` if needed and stores `value` in it.
    ///
    /// # Panics
    ///
    /// Panics if the channel exists with another type.
    pub fn insert_channel_data<T: Any + Send + Sync>(&mut self, name: &str, value: T) {
        match self.channels.get_mut(name) {
            Some(slot) => match slot.downcast_mut::<T>() {
                Some(data) => *data = value,
                None => panic!(
                    "channel '{name}' does not hold data of type {}",
                    type_name::<T>()
                ),
            },
            None => {
                self.channels.insert(name.to_string(), Box::new(value));
            }
        }
    }

    /// # Panics
    ///
    /// Panics if the channel does not exist or holds another type.
    pub fn channel_data<T: Any>(&self, name: &str) -> &T {
        let slot = self
            .channels
            .get(name)
            .unwrap_or_else(|| panic!("channel '{name}' does not exist"));
        slot.downcast_ref::<T>().unwrap_or_else(|| {
            panic!(
                "channel '{name}' does not hold data of type {}",
                type_name::<T>()
            )
        })
    }

    /// # Panics
    ///
    /// Panics if the channel does not exist or holds another type.
    pub fn channel_data_mut<T: Any>(&mut self, name: &str) -> &mut T {
        let slot = self
            .channels
            .get_mut(name)
            .unwrap_or_else(|| panic!("channel '{name}' does not exist"));
        slot.downcast_mut::<T>().unwrap_or_else(|| {
            panic!(
                "channel '{name}' does not hold data of type {}",
                type_name::<T>()
            )
        })
    }
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        write!(f, "Channels {names:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn test_named_channel() {
        let mut channels = Channels::new();
        let data = DVector::from_vec(vec![0.5, -1.0, 2.25]);

        assert!(!channels.has_channel("test_channel"));
        channels.add_channel::<DVector<f64>>("test_channel");
        assert!(channels.has_channel("test_channel"));
        assert_eq!(channels.channel_data::<DVector<f64>>("test_channel").len(), 0);

        channels.set_channel_data("test_channel", data.clone());
        assert_eq!(channels.channel_data::<DVector<f64>>("test_channel"), &data);
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn test_mutable_and_immutable_alias() {
        let mut channels = Channels::new();
        channels.insert_channel_data("scores", vec![1u32, 2, 3]);

        let mutable_ptr = channels.channel_data_mut::<Vec<u32>>("scores") as *const Vec<u32>;
        channels.channel_data_mut::<Vec<u32>>("scores").push(4);

        let immutable = channels.channel_data::<Vec<u32>>("scores");
        assert!(std::ptr::eq(immutable, mutable_ptr));
        assert_eq!(immutable, &vec![1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_get_missing_channel_panics() {
        let channels = Channels::new();
        let _ = channels.channel_data::<DVector<f64>>("x");
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_set_missing_channel_panics() {
        let mut channels = Channels::new();
        channels.set_channel_data("x", 1.0f64);
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn test_add_existing_channel_panics() {
        let mut channels = Channels::new();
        channels.add_channel::<f64>("x");
        channels.add_channel::<f64>("x");
    }

    #[test]
    #[should_panic(expected = "does not hold data of type")]
    fn test_type_mismatch_panics() {
        let mut channels = Channels::new();
        channels.add_channel::<f64>("x");
        let _ = channels.channel_data::<u32>("x");
    }

    #[test]
    #[should_panic(expected = "does not hold data of type")]
    fn test_insert_type_mismatch_panics() {
        let mut channels = Channels::new();
        channels.insert_channel_data("x", 1.0f64);
        channels.insert_channel_data("x", 1u8);
    }
}
