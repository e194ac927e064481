//! Device selection helpers.
//!
//! Deliberately minimal: the pipeline has no hotplug or fallback
//! logic. A missing device is terminal for the start attempt and
//! surfaced to the caller.

use cpal::traits::{DeviceTrait, HostTrait};
use voxtutor_foundation::AudioError;

/// Open the requested input device, or the host default.
pub fn input_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(wanted.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
    }
}

/// Open the default output device.
pub fn output_device() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::DeviceNotFound { name: None })
}
