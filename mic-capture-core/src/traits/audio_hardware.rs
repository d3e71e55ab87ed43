use crate::models::error::UnitStatus;
use crate::models::format::StreamFormatDescriptor;

/// Which input unit to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Voice processing unit: processes input and output jointly to cancel
    /// acoustic echo. Needs a render callback on the output bus.
    EchoCancelling,
    /// Raw hardware input with no processing.
    Passthrough,
}

/// Unit bus a render callback is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    /// Element 0: audio heading to the output hardware.
    Output,
    /// Element 1: audio arriving from the input hardware.
    Input,
}

/// Opaque token for a component found by [`AudioHardware::find_component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub u64);

/// Opaque token for an instantiated audio unit.
///
/// Exclusively owned by whoever instantiated it; the hardware layer never
/// hands the same token out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitHandle(pub u64);

/// One render quantum as seen by a render callback.
///
/// The hardware layer lends its pull capability for the duration of the
/// callback only, so the callback never needs the unit handle.
pub struct RenderCycle<'a> {
    frame_count: u32,
    pull: &'a mut dyn FnMut(&mut [u8]) -> Result<usize, UnitStatus>,
}

impl<'a> RenderCycle<'a> {
    pub fn new(
        frame_count: u32,
        pull: &'a mut dyn FnMut(&mut [u8]) -> Result<usize, UnitStatus>,
    ) -> Self {
        Self { frame_count, pull }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Render this quantum's frames into `buffer`.
    ///
    /// Returns the number of bytes written.
    pub fn pull(&mut self, buffer: &mut [u8]) -> Result<usize, UnitStatus> {
        (self.pull)(buffer)
    }
}

/// Render callback registered on a unit bus.
///
/// Invoked on the platform's real-time audio thread: implementations must not
/// block, allocate, or take locks shared with non-real-time threads.
pub type RenderCallback = Box<dyn FnMut(&mut RenderCycle<'_>) -> Result<(), UnitStatus> + Send>;

/// Platform audio unit operations used to build a capture session.
///
/// Implemented by:
/// - `WasapiHardware` (Windows)
/// - `FakeAudioHardware` (in-memory, for tests)
pub trait AudioHardware: Send + Sync {
    /// Locate an input component of the requested kind.
    fn find_component(&self, kind: UnitKind) -> Option<ComponentId>;

    /// Create a unit instance from a component.
    fn instantiate(&self, component: ComponentId) -> Result<UnitHandle, UnitStatus>;

    /// Enable the input direction of the unit.
    fn enable_input(&self, unit: UnitHandle) -> Result<(), UnitStatus>;

    /// Apply the client-side stream format of the input bus.
    fn set_stream_format(
        &self,
        unit: UnitHandle,
        format: &StreamFormatDescriptor,
    ) -> Result<(), UnitStatus>;

    /// Register the render callback for a bus, replacing any previous one.
    fn set_render_callback(
        &self,
        unit: UnitHandle,
        bus: Bus,
        callback: RenderCallback,
    ) -> Result<(), UnitStatus>;

    fn initialize(&self, unit: UnitHandle) -> Result<(), UnitStatus>;

    /// Start delivering render callbacks.
    fn start(&self, unit: UnitHandle) -> Result<(), UnitStatus>;

    /// Stop delivering render callbacks.
    ///
    /// Must not return while a callback for this unit is still executing,
    /// and no callback may be delivered after it returns.
    fn stop(&self, unit: UnitHandle) -> Result<(), UnitStatus>;

    /// Release the unit and everything registered on it.
    fn dispose(&self, unit: UnitHandle) -> Result<(), UnitStatus>;
}
