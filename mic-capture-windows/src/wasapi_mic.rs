//! WASAPI input units.
//!
//! Each running unit owns a dedicated capture thread registered with MMCSS.
//! The thread opens the endpoint in shared mode with the session's 16-bit
//! format (the engine converts from its mix format), and feeds each packet
//! through the registered render callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use windows::core::w;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Media::Audio::{
    IAudioCaptureClient, IAudioClient, AUDCLNT_BUFFERFLAGS_SILENT, AUDCLNT_SHAREMODE_SHARED,
    AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM, AUDCLNT_STREAMFLAGS_NOPERSIST,
    AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY, WAVEFORMATEX, WAVE_FORMAT_PCM,
};
use windows::Win32::System::Com::CLSCTX_ALL;
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use mic_capture_core::{
    AudioHardware, Bus, ComponentId, RenderCallback, RenderCycle, StreamFormatDescriptor,
    UnitHandle, UnitKind, UnitStatus,
};

use crate::com::ComApartment;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::WasapiError;
use crate::packet::{copy_packet, is_capture_format, slices};
use crate::permissions::check_microphone_access;

/// Shared-mode buffer: 100ms in 100-nanosecond units.
const BUFFER_DURATION: i64 = 1_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn component_id(kind: UnitKind) -> ComponentId {
    match kind {
        UnitKind::EchoCancelling => ComponentId(1),
        UnitKind::Passthrough => ComponentId(2),
    }
}

fn component_kind(component: ComponentId) -> Option<UnitKind> {
    match component {
        ComponentId(1) => Some(UnitKind::EchoCancelling),
        ComponentId(2) => Some(UnitKind::Passthrough),
        _ => None,
    }
}

struct UnitSlot {
    kind: UnitKind,
    input_enabled: bool,
    format: Option<StreamFormatDescriptor>,
    callback: Option<RenderCallback>,
    initialized: bool,
    capture: Option<CaptureThread>,
}

/// A running capture thread. Joining it hands the callback back.
struct CaptureThread {
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<RenderCallback>,
}

impl CaptureThread {
    fn stop(self) -> Option<RenderCallback> {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.join() {
            Ok(callback) => Some(callback),
            Err(_) => {
                log::error!("mic capture thread panicked");
                None
            }
        }
    }
}

/// [`AudioHardware`] over WASAPI capture endpoints.
///
/// COM objects only ever live on the capture threads; the handle table
/// itself holds plain data.
pub struct WasapiHardware {
    units: Mutex<HashMap<UnitHandle, UnitSlot>>,
    next_unit: AtomicU64,
}

impl Default for WasapiHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl WasapiHardware {
    pub fn new() -> Self {
        Self {
            units: Mutex::new(HashMap::new()),
            next_unit: AtomicU64::new(1),
        }
    }

    fn with_slot<T>(
        &self,
        unit: UnitHandle,
        f: impl FnOnce(&mut UnitSlot) -> Result<T, UnitStatus>,
    ) -> Result<T, UnitStatus> {
        let mut units = self.units.lock();
        let slot = units.get_mut(&unit).ok_or(UnitStatus::INVALID_UNIT)?;
        f(slot)
    }

    /// Hand a joined thread's callback back to its unit, if the unit is
    /// still there.
    fn restore_callback(&self, unit: UnitHandle, callback: Option<RenderCallback>) {
        if let Some(slot) = self.units.lock().get_mut(&unit) {
            slot.callback = callback;
        }
    }
}

impl AudioHardware for WasapiHardware {
    fn find_component(&self, kind: UnitKind) -> Option<ComponentId> {
        let found = ComApartment::enter()
            .and_then(|_com| Ok(DeviceEnumerator::new()?.has_capture_endpoint(kind)));
        match found {
            Ok(true) => Some(component_id(kind)),
            Ok(false) => None,
            Err(e) => {
                log::warn!("can't enumerate capture endpoints: {}", e);
                None
            }
        }
    }

    fn instantiate(&self, component: ComponentId) -> Result<UnitHandle, UnitStatus> {
        let kind = component_kind(component).ok_or(UnitStatus::INVALID_UNIT)?;
        let handle = UnitHandle(self.next_unit.fetch_add(1, Ordering::Relaxed));
        self.units.lock().insert(
            handle,
            UnitSlot {
                kind,
                input_enabled: false,
                format: None,
                callback: None,
                initialized: false,
                capture: None,
            },
        );
        Ok(handle)
    }

    fn enable_input(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        let kind = self.with_slot(unit, |slot| Ok(slot.kind))?;
        check_microphone_access(kind).map_err(|e| {
            log::warn!("microphone unavailable: {}", e);
            e.status()
        })?;
        self.with_slot(unit, |slot| {
            slot.input_enabled = true;
            Ok(())
        })
    }

    fn set_stream_format(
        &self,
        unit: UnitHandle,
        format: &StreamFormatDescriptor,
    ) -> Result<(), UnitStatus> {
        if !is_capture_format(format) {
            return Err(UnitStatus::FORMAT_NOT_SUPPORTED);
        }
        self.with_slot(unit, |slot| {
            slot.format = Some(*format);
            Ok(())
        })
    }

    fn set_render_callback(
        &self,
        unit: UnitHandle,
        bus: Bus,
        callback: RenderCallback,
    ) -> Result<(), UnitStatus> {
        self.with_slot(unit, |slot| {
            match bus {
                Bus::Input => slot.callback = Some(callback),
                // Shared-mode capture has no output element to feed.
                Bus::Output => log::debug!("output callback ignored on capture endpoint"),
            }
            Ok(())
        })
    }

    fn initialize(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        self.with_slot(unit, |slot| {
            if !slot.input_enabled || slot.format.is_none() || slot.callback.is_none() {
                return Err(UnitStatus::UNINITIALIZED);
            }
            slot.initialized = true;
            Ok(())
        })
    }

    fn start(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        // The callback leaves the slot while the thread starts, so a
        // concurrent start sees the unit as busy.
        let prepared = self.with_slot(unit, |slot| {
            if slot.capture.is_some() {
                return Ok(None);
            }
            let (Some(format), true) = (slot.format, slot.initialized) else {
                return Err(UnitStatus::UNINITIALIZED);
            };
            let callback = slot.callback.take().ok_or(UnitStatus::UNINITIALIZED)?;
            Ok(Some((slot.kind, format, callback)))
        })?;
        let Some((kind, format, callback)) = prepared else {
            return Ok(());
        };

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded(1);
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || capture_main(kind, format, &thread_running, &ready_tx, callback))
            .map_err(|e| {
                log::error!("failed to spawn mic capture thread: {}", e);
                WasapiError::Thread(e.to_string()).status()
            })?;
        let capture = CaptureThread { running, handle };

        // Waited on without the table lock: opening the endpoint can take a
        // while and must not stall other units.
        let outcome = match ready_rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(UnitStatus::FAILED),
        };

        let mut units = self.units.lock();
        let Some(slot) = units.get_mut(&unit) else {
            drop(units);
            log::debug!("unit disposed while its capture thread started");
            capture.stop();
            return Err(UnitStatus::INVALID_UNIT);
        };
        match outcome {
            Ok(()) => {
                slot.capture = Some(capture);
                Ok(())
            }
            Err(status) => {
                drop(units);
                let callback = capture.stop();
                self.restore_callback(unit, callback);
                Err(status)
            }
        }
    }

    fn stop(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        let Some(capture) = self.with_slot(unit, |slot| Ok(slot.capture.take()))? else {
            return Ok(());
        };
        let callback = capture.stop();
        self.restore_callback(unit, callback);
        Ok(())
    }

    fn dispose(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        let slot = self
            .units
            .lock()
            .remove(&unit)
            .ok_or(UnitStatus::INVALID_UNIT)?;
        if let Some(capture) = slot.capture {
            capture.stop();
        }
        Ok(())
    }
}

/// Capture thread entry. Always returns the callback so the unit can be
/// restarted.
fn capture_main(
    kind: UnitKind,
    format: StreamFormatDescriptor,
    running: &AtomicBool,
    ready: &Sender<Result<(), UnitStatus>>,
    mut callback: RenderCallback,
) -> RenderCallback {
    let _com = match ComApartment::enter() {
        Ok(com) => com,
        Err(e) => {
            log::error!("mic capture: {}", e);
            let _ = ready.send(Err(e.status()));
            return callback;
        }
    };

    let stream = match CaptureStream::open(kind, &format) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("mic capture setup failed: {}", e);
            let _ = ready.send(Err(e.status()));
            return callback;
        }
    };
    let _ = ready.send(Ok(()));

    if let Err(e) = stream.pump(running, &mut callback) {
        log::error!("mic capture stopped: {}", e);
    }
    stream.close();
    callback
}

struct CaptureStream {
    client: IAudioClient,
    capture: IAudioCaptureClient,
    mmcss: Option<HANDLE>,
    bytes_per_frame: usize,
}

impl CaptureStream {
    /// Sequence: endpoint → IAudioClient → Initialize (shared, converting to
    /// `format`) → IAudioCaptureClient → MMCSS → Start.
    fn open(kind: UnitKind, format: &StreamFormatDescriptor) -> Result<Self, WasapiError> {
        let device = DeviceEnumerator::new()?.capture_endpoint(kind)?;
        if let Some(name) = DeviceEnumerator::friendly_name(&device) {
            log::info!("opening capture endpoint {}", name);
        }

        unsafe {
            let client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| WasapiError::call("IMMDevice::Activate", e.code().0))?;

            let wave = wave_format(format);
            client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                        | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY
                        | AUDCLNT_STREAMFLAGS_NOPERSIST,
                    BUFFER_DURATION,
                    0,
                    &wave,
                    None,
                )
                .map_err(|e| WasapiError::call("IAudioClient::Initialize", e.code().0))?;

            let capture: IAudioCaptureClient = client
                .GetService()
                .map_err(|e| WasapiError::call("IAudioClient::GetService", e.code().0))?;

            let mut task_index = 0u32;
            let mmcss = match AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("MMCSS registration failed: {}", e);
                    None
                }
            };

            client
                .Start()
                .map_err(|e| WasapiError::call("IAudioClient::Start", e.code().0))?;

            Ok(Self {
                client,
                capture,
                mmcss,
                bytes_per_frame: format.bytes_per_frame() as usize,
            })
        }
    }

    /// Deliver packets until `running` clears.
    fn pump(&self, running: &AtomicBool, callback: &mut RenderCallback) -> Result<(), WasapiError> {
        while running.load(Ordering::SeqCst) {
            thread::sleep(POLL_INTERVAL);

            let mut pending = unsafe { self.capture.GetNextPacketSize() }
                .map_err(|e| WasapiError::call("GetNextPacketSize", e.code().0))?;

            while pending > 0 && running.load(Ordering::SeqCst) {
                let mut data: *mut u8 = std::ptr::null_mut();
                let mut frames = 0u32;
                let mut flags = 0u32;
                unsafe {
                    self.capture
                        .GetBuffer(&mut data, &mut frames, &mut flags, None, None)
                        .map_err(|e| WasapiError::call("GetBuffer", e.code().0))?;
                }

                let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
                let packet: Option<&[u8]> = if silent || data.is_null() {
                    None
                } else {
                    // Valid until ReleaseBuffer below.
                    Some(unsafe {
                        std::slice::from_raw_parts(data, frames as usize * self.bytes_per_frame)
                    })
                };

                for slice in slices(frames) {
                    let source = packet.map(|bytes| {
                        let start = slice.offset as usize * self.bytes_per_frame;
                        let end = start + slice.frames as usize * self.bytes_per_frame;
                        &bytes[start..end]
                    });
                    let mut pull = |buf: &mut [u8]| -> Result<usize, UnitStatus> {
                        Ok(copy_packet(source, buf))
                    };
                    let mut cycle = RenderCycle::new(slice.frames, &mut pull);
                    if let Err(status) = callback(&mut cycle) {
                        log::trace!("render callback returned {}", status);
                    }
                }

                unsafe { self.capture.ReleaseBuffer(frames) }
                    .map_err(|e| WasapiError::call("ReleaseBuffer", e.code().0))?;

                pending = unsafe { self.capture.GetNextPacketSize() }
                    .map_err(|e| WasapiError::call("GetNextPacketSize", e.code().0))?;
            }
        }
        Ok(())
    }

    fn close(self) {
        unsafe {
            if let Err(e) = self.client.Stop() {
                log::debug!("IAudioClient::Stop failed: {}", e);
            }
            if let Some(handle) = self.mmcss {
                let _ = AvRevertMmThreadCharacteristics(handle);
            }
        }
    }
}

fn wave_format(format: &StreamFormatDescriptor) -> WAVEFORMATEX {
    let sample_rate = format.sample_rate().round() as u32;
    let block_align = format.bytes_per_frame();
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: format.channel_count() as u16,
        nSamplesPerSec: sample_rate,
        nAvgBytesPerSec: sample_rate * block_align,
        nBlockAlign: block_align as u16,
        wBitsPerSample: format.bits_per_channel() as u16,
        cbSize: 0,
    }
}
