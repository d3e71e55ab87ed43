//! Per-thread COM apartment.

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use crate::error::WasapiError;

/// Joins the multithreaded apartment for the current thread, and leaves it
/// on drop.
///
/// A thread already in a single-threaded apartment keeps it; COM calls still
/// work there, so that is not treated as an error.
pub struct ComApartment {
    owned: bool,
}

impl ComApartment {
    pub fn enter() -> Result<Self, WasapiError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owned: false });
        }
        hr.ok().map_err(|e| WasapiError::ComInit(e.code().0))?;
        Ok(Self { owned: true })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}
