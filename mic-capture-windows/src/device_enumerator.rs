//! Capture endpoint lookup via the MMDevice API.

use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eCommunications, eConsole, ERole, IMMDevice, IMMDeviceEnumerator,
    MMDeviceEnumerator,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, STGM_READ};

use mic_capture_core::UnitKind;

use crate::error::WasapiError;

/// Endpoint role a unit kind captures from. The communications role is where
/// Windows applies its voice processing (echo cancellation, AGC).
pub fn role_for(kind: UnitKind) -> ERole {
    match kind {
        UnitKind::EchoCancelling => eCommunications,
        UnitKind::Passthrough => eConsole,
    }
}

/// Capture endpoint lookup.
///
/// Requires COM on the calling thread.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    pub fn new() -> Result<Self, WasapiError> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                .map_err(|e| WasapiError::call("CoCreateInstance(MMDeviceEnumerator)", e.code().0))?;
        Ok(Self { enumerator })
    }

    /// Default capture endpoint for `kind`'s role.
    pub fn capture_endpoint(&self, kind: UnitKind) -> Result<IMMDevice, WasapiError> {
        unsafe { self.enumerator.GetDefaultAudioEndpoint(eCapture, role_for(kind)) }
            .map_err(|_| WasapiError::NoEndpoint(kind))
    }

    pub fn has_capture_endpoint(&self, kind: UnitKind) -> bool {
        self.capture_endpoint(kind).is_ok()
    }

    /// `PKEY_Device_FriendlyName`, for logging.
    pub fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            let name = value.to_string();
            (!name.is_empty()).then_some(name)
        }
    }
}
