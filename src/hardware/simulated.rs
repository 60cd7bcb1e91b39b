//! Host-side stand-ins for the rig hardware.
//!
//! Handles are cheap clones over shared state so a test can keep one copy
//! to script or inspect while the controller owns the other. Everything
//! here is single-threaded, matching the control loop.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
    rc::Rc,
    time::Duration,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    constants::{LOG_BUFFER_SIZE, SEA_LEVEL_PRESSURE},
    errors::RigError,
};

use super::{Clock, PressureSensor, Pump, PumpCommand, PumpDirection, Storage};

#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_secs(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Physical parameters of the simulated chamber.
#[derive(Debug, Clone, Copy)]
pub struct ChamberParams {
    pub ambient: f64,     // Pa, absolute frame
    pub pump_rate: f64,   // Pa/s at 100% duty
    pub leak_rate: f64,   // 1/s, first-order return towards ambient
    pub noise: f64,       // Pa, uniform sensor noise half-width
}

impl Default for ChamberParams {
    fn default() -> Self {
        ChamberParams {
            ambient: SEA_LEVEL_PRESSURE,
            pump_rate: 6_000.0,
            leak_rate: 0.05,
            noise: 20.0,
        }
    }
}

struct ChamberModel {
    params: ChamberParams,
    pressure: f64,
    command: i8,
    last_update: Duration,
    fail_reads: bool,
    rng: StdRng,
}

impl ChamberModel {
    fn advance_to(&mut self, now: Duration) {
        let dt = now.saturating_sub(self.last_update).as_secs_f64();
        self.last_update = self.last_update.max(now);
        if dt <= 0.0 {
            return;
        }

        let drive = PumpCommand::from_percent(self.command, u8::MAX);
        let direction = match drive.direction {
            PumpDirection::Blow => 1.0,
            PumpDirection::Suck => -1.0,
        };
        let pump = direction * drive.duty as f64 / u8::MAX as f64 * self.params.pump_rate;
        let leak = self.params.leak_rate * (self.params.ambient - self.pressure);
        self.pressure = (self.pressure + (pump + leak) * dt).max(0.0);
    }

    fn sample_noise(&mut self) -> f64 {
        if self.params.noise > 0.0 {
            self.rng.gen_range(-self.params.noise..=self.params.noise)
        } else {
            0.0
        }
    }
}

/// A leaky vacuum chamber with a reversible pump and a noisy sensor.
#[derive(Clone)]
pub struct SimulatedChamber {
    model: Rc<RefCell<ChamberModel>>,
    clock: ManualClock,
}

impl SimulatedChamber {
    pub fn new(params: ChamberParams, seed: u64) -> Self {
        SimulatedChamber {
            model: Rc::new(RefCell::new(ChamberModel {
                params,
                pressure: params.ambient,
                command: 0,
                last_update: Duration::ZERO,
                fail_reads: false,
                rng: StdRng::seed_from_u64(seed),
            })),
            clock: ManualClock::new(),
        }
    }

    pub fn sensor(&self) -> SimulatedSensor {
        SimulatedSensor {
            chamber: self.clone(),
            ready: false,
            base_pressure: 0.0,
        }
    }

    pub fn pump(&self) -> SimulatedPump {
        SimulatedPump {
            chamber: self.clone(),
        }
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    pub fn pressure(&self) -> f64 {
        let mut model = self.model.borrow_mut();
        model.advance_to(self.clock.now());
        model.pressure
    }

    pub fn set_pressure(&self, pressure: f64) {
        let mut model = self.model.borrow_mut();
        model.advance_to(self.clock.now());
        model.pressure = pressure;
    }

    pub fn pump_command(&self) -> i8 {
        self.model.borrow().command
    }

    pub fn set_read_failures(&self, fail: bool) {
        self.model.borrow_mut().fail_reads = fail;
    }
}

pub struct SimulatedSensor {
    chamber: SimulatedChamber,
    ready: bool,
    base_pressure: f32,
}

impl PressureSensor for SimulatedSensor {
    fn init(&mut self) -> Result<(), RigError> {
        if self.ready {
            return Ok(());
        }
        let readings = 20;
        let mut total = 0.0;
        for _ in 0..readings {
            total += self.read(true)?;
        }
        self.base_pressure = total / readings as f32;
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn read(&mut self, absolute: bool) -> Result<f32, RigError> {
        let now = self.chamber.clock.now();
        let mut model = self.chamber.model.borrow_mut();
        if model.fail_reads {
            return Err(RigError::SensorRead("simulated bus error".to_string()));
        }
        model.advance_to(now);
        let noise = model.sample_noise();
        let reading = model.pressure + noise;
        let offset = if absolute { 0.0 } else { model.params.ambient };
        Ok((reading - offset) as f32)
    }

    fn base_pressure(&self) -> f32 {
        self.base_pressure
    }
}

pub struct SimulatedPump {
    chamber: SimulatedChamber,
}

impl Pump for SimulatedPump {
    fn send(&mut self, percent: i8) {
        let now = self.chamber.clock.now();
        let mut model = self.chamber.model.borrow_mut();
        model.advance_to(now);
        model.command = percent.clamp(-100, 100);
    }
}

/// Replays queued readings; `None` entries fail the read. Once the queue
/// runs dry the last successful reading repeats.
#[derive(Clone)]
pub struct ScriptedSensor {
    readings: Rc<RefCell<VecDeque<Option<f32>>>>,
    last: Rc<Cell<f32>>,
    ready: bool,
    fail_init: bool,
    base_pressure: f32,
}

impl ScriptedSensor {
    pub fn new(base_pressure: f32) -> Self {
        ScriptedSensor {
            readings: Rc::new(RefCell::new(VecDeque::new())),
            last: Rc::new(Cell::new(base_pressure)),
            ready: false,
            fail_init: false,
            base_pressure,
        }
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn push(&self, reading: f32) {
        self.readings.borrow_mut().push_back(Some(reading));
    }

    pub fn push_all(&self, readings: impl IntoIterator<Item = f32>) {
        self.readings
            .borrow_mut()
            .extend(readings.into_iter().map(Some));
    }

    pub fn push_failure(&self) {
        self.readings.borrow_mut().push_back(None);
    }

    pub fn pending(&self) -> usize {
        self.readings.borrow().len()
    }
}

impl PressureSensor for ScriptedSensor {
    fn init(&mut self) -> Result<(), RigError> {
        if self.fail_init {
            return Err(RigError::SensorRead("sensor not detected".to_string()));
        }
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn read(&mut self, absolute: bool) -> Result<f32, RigError> {
        let next = self.readings.borrow_mut().pop_front();
        let reading = match next {
            Some(Some(value)) => {
                self.last.set(value);
                value
            }
            Some(None) => return Err(RigError::SensorRead("scripted failure".to_string())),
            None => self.last.get(),
        };
        if absolute {
            Ok(reading)
        } else {
            Ok(reading - SEA_LEVEL_PRESSURE as f32)
        }
    }

    fn base_pressure(&self) -> f32 {
        self.base_pressure
    }
}

#[derive(Clone, Default)]
pub struct RecordingPump {
    commands: Rc<RefCell<Vec<i8>>>,
}

impl RecordingPump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<i8> {
        self.commands.borrow().clone()
    }

    pub fn last(&self) -> Option<i8> {
        self.commands.borrow().last().copied()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl Pump for RecordingPump {
    fn send(&mut self, percent: i8) {
        self.commands.borrow_mut().push(percent);
    }
}

#[derive(Default)]
struct MemoryFiles {
    files: BTreeMap<String, String>,
    current: Option<String>,
    buffer: String,
    fail_create: bool,
    fail_append: bool,
}

impl MemoryFiles {
    fn flush(&mut self) {
        if let Some(name) = &self.current {
            let buffered = std::mem::take(&mut self.buffer);
            self.files.entry(name.clone()).or_default().push_str(&buffered);
        }
    }
}

/// In-memory [`Storage`] with switchable failures.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryFiles>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&self, path: &str, contents: &str) {
        self.inner
            .borrow_mut()
            .files
            .insert(path.to_string(), contents.to_string());
    }

    /// Flushed contents of `name`.
    pub fn file(&self, name: &str) -> Option<String> {
        self.inner.borrow().files.get(name).cloned()
    }

    pub fn current_file(&self) -> Option<String> {
        self.inner.borrow().current.clone()
    }

    /// Everything written to the open file, including unflushed lines.
    pub fn current_contents(&self) -> String {
        let inner = self.inner.borrow();
        let flushed = inner
            .current
            .as_ref()
            .and_then(|name| inner.files.get(name))
            .cloned()
            .unwrap_or_default();
        flushed + &inner.buffer
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.inner.borrow_mut().fail_create = fail;
    }

    pub fn set_fail_append(&self, fail: bool) {
        self.inner.borrow_mut().fail_append = fail;
    }
}

impl Storage for MemoryStorage {
    fn create_file(&mut self, header: &str, prefix: &str) -> Result<String, RigError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_create {
            return Err(RigError::Storage("card not present".to_string()));
        }
        inner.flush();

        let name = (0_u32..)
            .map(|index| format!("{}_{}.txt", prefix, index))
            .find(|name| !inner.files.contains_key(name))
            .ok_or_else(|| RigError::Storage("no free file name".to_string()))?;
        inner.files.insert(name.clone(), format!("{}\n", header));
        inner.current = Some(name.clone());
        Ok(name)
    }

    fn append_buffered(&mut self, line: &str) -> Result<(), RigError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_append {
            return Err(RigError::Storage("write rejected".to_string()));
        }
        if inner.current.is_none() {
            return Err(RigError::Storage("no log file open".to_string()));
        }
        inner.buffer.push_str(line);
        if inner.buffer.len() >= LOG_BUFFER_SIZE {
            inner.flush();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RigError> {
        self.inner.borrow_mut().flush();
        Ok(())
    }

    fn load_table(&mut self, path: &str) -> Result<String, RigError> {
        self.inner
            .borrow()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RigError::Storage(format!("{}: not found", path)))
    }
}
