//! Windows microphone privacy check.
//!
//! Desktop apps have no per-app consent dialog; access is governed by the
//! global toggle at Settings > Privacy > Microphone. When it is off,
//! activating an audio client on a capture endpoint fails.

use windows::Win32::Media::Audio::IAudioClient;
use windows::Win32::System::Com::CLSCTX_ALL;

use mic_capture_core::UnitKind;

use crate::com::ComApartment;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::{is_access_denied, WasapiError};

/// Check that the endpoint for `kind` can be opened.
pub fn check_microphone_access(kind: UnitKind) -> Result<(), WasapiError> {
    let _com = ComApartment::enter()?;
    let device = DeviceEnumerator::new()?.capture_endpoint(kind)?;

    let result: windows::core::Result<IAudioClient> = unsafe { device.Activate(CLSCTX_ALL, None) };
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_access_denied(e.code().0) => Err(WasapiError::AccessDenied),
        Err(e) => {
            log::warn!("unexpected error checking microphone access: {}", e);
            Ok(())
        }
    }
}
