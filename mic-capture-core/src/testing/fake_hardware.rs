use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::journal::{CallJournal, HardwareCall};
use crate::models::error::UnitStatus;
use crate::models::format::StreamFormatDescriptor;
use crate::traits::audio_hardware::{
    AudioHardware, Bus, ComponentId, RenderCallback, RenderCycle, UnitHandle, UnitKind,
};

/// Byte value the fake unit renders into every pulled buffer.
pub const SIGNAL_BYTE: u8 = 0x5a;

/// Hardware operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Instantiate,
    EnableInput,
    SetStreamFormat,
    SetInputCallback,
    SetOutputCallback,
    Initialize,
    Start,
    Stop,
    Dispose,
}

struct FakeUnit {
    kind: UnitKind,
    input_enabled: bool,
    format: Option<StreamFormatDescriptor>,
    initialized: bool,
    running: bool,
    input_callback: Option<RenderCallback>,
    output_callback: Option<RenderCallback>,
}

#[derive(Default)]
struct FakeState {
    next_unit: u64,
    units: HashMap<UnitHandle, FakeUnit>,
    missing: HashSet<UnitKind>,
    failures: HashMap<Step, UnitStatus>,
    rejected_rates: Vec<f64>,
    render_failure: Option<UnitStatus>,
}

/// In-memory audio hardware.
///
/// Render callbacks run on whichever thread calls [`render_quantum`], under
/// the same lock `stop` and `dispose` take, so `stop` waits for an in-flight
/// callback the way real hardware does.
///
/// [`render_quantum`]: FakeAudioHardware::render_quantum
pub struct FakeAudioHardware {
    state: Mutex<FakeState>,
    journal: CallJournal,
}

impl Default for FakeAudioHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAudioHardware {
    pub fn new() -> Self {
        Self::with_journal(CallJournal::new())
    }

    /// Record calls into an existing journal (shared with a sink, say).
    pub fn with_journal(journal: CallJournal) -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            journal,
        }
    }

    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    /// Make `find_component` report no component of this kind.
    pub fn remove_component(&self, kind: UnitKind) {
        self.state.lock().missing.insert(kind);
    }

    /// Make `step` fail with `status` until cleared.
    pub fn fail_at(&self, step: Step, status: UnitStatus) {
        self.state.lock().failures.insert(step, status);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Reject stream formats at this sample rate.
    pub fn reject_sample_rate(&self, sample_rate: f64) {
        self.state.lock().rejected_rates.push(sample_rate);
    }

    /// Make every subsequent pull fail with `status` (`None` to recover).
    pub fn set_render_failure(&self, status: Option<UnitStatus>) {
        self.state.lock().render_failure = status;
    }

    /// Units instantiated and not yet disposed.
    pub fn live_units(&self) -> usize {
        self.state.lock().units.len()
    }

    pub fn is_running(&self, unit: UnitHandle) -> bool {
        self.state
            .lock()
            .units
            .get(&unit)
            .is_some_and(|u| u.running)
    }

    pub fn unit_kind(&self, unit: UnitHandle) -> Option<UnitKind> {
        self.state.lock().units.get(&unit).map(|u| u.kind)
    }

    pub fn has_callback(&self, unit: UnitHandle, bus: Bus) -> bool {
        self.state.lock().units.get(&unit).is_some_and(|u| match bus {
            Bus::Input => u.input_callback.is_some(),
            Bus::Output => u.output_callback.is_some(),
        })
    }

    /// Handles of all live units.
    pub fn units(&self) -> Vec<UnitHandle> {
        self.state.lock().units.keys().copied().collect()
    }

    /// Deliver one input render quantum to the running unit, as the platform
    /// audio thread would. Returns `None` when no unit is running.
    pub fn render_quantum(&self, frame_count: u32) -> Option<Result<(), UnitStatus>> {
        let mut state = self.state.lock();
        let failure = state.render_failure;

        let unit = state
            .units
            .values_mut()
            .find(|u| u.running && u.input_callback.is_some())?;
        let callback = unit.input_callback.as_mut()?;

        let mut pull = |buf: &mut [u8]| -> Result<usize, UnitStatus> {
            if let Some(status) = failure {
                return Err(status);
            }
            buf.fill(SIGNAL_BYTE);
            Ok(buf.len())
        };
        let mut cycle = RenderCycle::new(frame_count, &mut pull);
        Some(callback(&mut cycle))
    }

    /// Deliver one output-bus quantum, if the running unit has an output
    /// callback.
    pub fn render_output_quantum(&self, frame_count: u32) -> Option<Result<(), UnitStatus>> {
        let mut state = self.state.lock();
        let unit = state
            .units
            .values_mut()
            .find(|u| u.running && u.output_callback.is_some())?;
        let callback = unit.output_callback.as_mut()?;

        let mut pull = |buf: &mut [u8]| -> Result<usize, UnitStatus> {
            buf.fill(0);
            Ok(buf.len())
        };
        let mut cycle = RenderCycle::new(frame_count, &mut pull);
        Some(callback(&mut cycle))
    }

    fn check(state: &FakeState, step: Step) -> Result<(), UnitStatus> {
        match state.failures.get(&step) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }

    fn unit_mut(state: &mut FakeState, unit: UnitHandle) -> Result<&mut FakeUnit, UnitStatus> {
        state.units.get_mut(&unit).ok_or(UnitStatus::INVALID_UNIT)
    }
}

impl AudioHardware for FakeAudioHardware {
    fn find_component(&self, kind: UnitKind) -> Option<ComponentId> {
        self.journal.record(HardwareCall::FindComponent(kind));
        let state = self.state.lock();
        if state.missing.contains(&kind) {
            return None;
        }
        Some(match kind {
            UnitKind::EchoCancelling => ComponentId(1),
            UnitKind::Passthrough => ComponentId(2),
        })
    }

    fn instantiate(&self, component: ComponentId) -> Result<UnitHandle, UnitStatus> {
        let mut state = self.state.lock();
        Self::check(&state, Step::Instantiate)?;

        let kind = match component {
            ComponentId(1) => UnitKind::EchoCancelling,
            ComponentId(2) => UnitKind::Passthrough,
            _ => return Err(UnitStatus::INVALID_UNIT),
        };

        state.next_unit += 1;
        let handle = UnitHandle(state.next_unit);
        state.units.insert(
            handle,
            FakeUnit {
                kind,
                input_enabled: false,
                format: None,
                initialized: false,
                running: false,
                input_callback: None,
                output_callback: None,
            },
        );
        self.journal.record(HardwareCall::Instantiate(handle));
        Ok(handle)
    }

    fn enable_input(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        self.journal.record(HardwareCall::EnableInput(unit));
        let mut state = self.state.lock();
        Self::check(&state, Step::EnableInput)?;
        Self::unit_mut(&mut state, unit)?.input_enabled = true;
        Ok(())
    }

    fn set_stream_format(
        &self,
        unit: UnitHandle,
        format: &StreamFormatDescriptor,
    ) -> Result<(), UnitStatus> {
        self.journal.record(HardwareCall::SetStreamFormat {
            unit,
            sample_rate: format.sample_rate(),
        });
        let mut state = self.state.lock();
        Self::check(&state, Step::SetStreamFormat)?;
        if state.rejected_rates.contains(&format.sample_rate()) {
            return Err(UnitStatus::FORMAT_NOT_SUPPORTED);
        }
        Self::unit_mut(&mut state, unit)?.format = Some(*format);
        Ok(())
    }

    fn set_render_callback(
        &self,
        unit: UnitHandle,
        bus: Bus,
        callback: RenderCallback,
    ) -> Result<(), UnitStatus> {
        self.journal
            .record(HardwareCall::SetRenderCallback { unit, bus });
        let mut state = self.state.lock();
        let step = match bus {
            Bus::Input => Step::SetInputCallback,
            Bus::Output => Step::SetOutputCallback,
        };
        Self::check(&state, step)?;

        let fake = Self::unit_mut(&mut state, unit)?;
        match bus {
            Bus::Input => fake.input_callback = Some(callback),
            Bus::Output => fake.output_callback = Some(callback),
        }
        Ok(())
    }

    fn initialize(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        self.journal.record(HardwareCall::Initialize(unit));
        let mut state = self.state.lock();
        Self::check(&state, Step::Initialize)?;

        let fake = Self::unit_mut(&mut state, unit)?;
        if !fake.input_enabled || fake.format.is_none() {
            return Err(UnitStatus::UNINITIALIZED);
        }
        fake.initialized = true;
        Ok(())
    }

    fn start(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        self.journal.record(HardwareCall::Start(unit));
        let mut state = self.state.lock();
        Self::check(&state, Step::Start)?;

        let fake = Self::unit_mut(&mut state, unit)?;
        if !fake.initialized {
            return Err(UnitStatus::UNINITIALIZED);
        }
        fake.running = true;
        Ok(())
    }

    fn stop(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        let mut state = self.state.lock();
        // Recorded under the lock: any callback that was in flight has
        // already finished by now.
        self.journal.record(HardwareCall::Stop(unit));
        Self::check(&state, Step::Stop)?;
        Self::unit_mut(&mut state, unit)?.running = false;
        Ok(())
    }

    fn dispose(&self, unit: UnitHandle) -> Result<(), UnitStatus> {
        let mut state = self.state.lock();
        self.journal.record(HardwareCall::Dispose(unit));
        Self::check(&state, Step::Dispose)?;
        state
            .units
            .remove(&unit)
            .map(|_| ())
            .ok_or(UnitStatus::INVALID_UNIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_unit(hw: &FakeAudioHardware) -> UnitHandle {
        let component = hw.find_component(UnitKind::Passthrough).unwrap();
        let unit = hw.instantiate(component).unwrap();
        hw.enable_input(unit).unwrap();
        hw.set_stream_format(unit, &StreamFormatDescriptor::linear_pcm(48000.0))
            .unwrap();
        hw.set_render_callback(unit, Bus::Input, Box::new(|_: &mut RenderCycle<'_>| Ok(())))
            .unwrap();
        hw.initialize(unit).unwrap();
        hw.start(unit).unwrap();
        unit
    }

    #[test]
    fn start_requires_initialize() {
        let hw = FakeAudioHardware::new();
        let component = hw.find_component(UnitKind::EchoCancelling).unwrap();
        let unit = hw.instantiate(component).unwrap();

        assert_eq!(hw.start(unit), Err(UnitStatus::UNINITIALIZED));
        assert_eq!(hw.unit_kind(unit), Some(UnitKind::EchoCancelling));
    }

    #[test]
    fn render_only_while_running() {
        let hw = FakeAudioHardware::new();
        let unit = started_unit(&hw);

        assert_eq!(hw.render_quantum(128), Some(Ok(())));
        hw.stop(unit).unwrap();
        assert_eq!(hw.render_quantum(128), None);
    }

    #[test]
    fn dispose_releases_unit() {
        let hw = FakeAudioHardware::new();
        let unit = started_unit(&hw);
        assert_eq!(hw.live_units(), 1);

        hw.stop(unit).unwrap();
        hw.dispose(unit).unwrap();
        assert_eq!(hw.live_units(), 0);
        assert_eq!(hw.dispose(unit), Err(UnitStatus::INVALID_UNIT));
    }

    #[test]
    fn injected_failures() {
        let hw = FakeAudioHardware::new();
        hw.remove_component(UnitKind::Passthrough);
        assert!(hw.find_component(UnitKind::Passthrough).is_none());

        hw.fail_at(Step::Instantiate, UnitStatus(-1));
        let component = hw.find_component(UnitKind::EchoCancelling).unwrap();
        assert_eq!(hw.instantiate(component), Err(UnitStatus(-1)));

        hw.clear_failures();
        assert!(hw.instantiate(component).is_ok());
    }
}
