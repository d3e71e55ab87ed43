//! # mic-capture-windows
//!
//! Windows WASAPI hardware layer for mic-capture.
//!
//! Provides:
//! - `WasapiHardware`: [`mic_capture_core::AudioHardware`] over shared-mode capture endpoints
//! - `DeviceEnumerator`: default capture endpoint lookup by role
//! - `permissions`: Windows microphone privacy check
//!
//! Packet slicing and error mapping are platform-neutral and build everywhere.
//!
//! ## Platform Requirements
//! - Windows 10 1803+ for the microphone privacy toggle
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use mic_capture_core::{event_channel, AudioDeviceSession, SessionConfig};
//! use mic_capture_windows::WasapiHardware;
//!
//! let (events_tx, events_rx) = event_channel();
//! let session = AudioDeviceSession::create(
//!     Arc::new(WasapiHardware::new()),
//!     SessionConfig::default(),
//!     events_rx,
//! )?;
//! ```

pub mod error;
pub mod packet;

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

pub use error::WasapiError;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_mic::WasapiHardware;
