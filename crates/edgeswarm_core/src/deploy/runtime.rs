//! Device-side control loop over an exported parameter set.
//!
//! The loop is single threaded and allocation free once constructed: the
//! inference engine and its tanh table are built up front, telemetry goes to a
//! fixed pool, and neighbor messages arrive through a shared inbox.

use super::inbox::NeighborInbox;
use super::pool::BufferPool;
use super::power::{next_mode, PowerThresholds, ResourceReading, RunMode};
use crate::config::DeployConfig;
use crate::controller::{safe_output, sanitize_perception};
use crate::fixed::{QFormat, TanhTable};
use edgeswarm_data::{
    Action, ExportedParams, NeighborMessage, NumericRepr, ParamSet, Perception, Vector2,
    CONTROLLER_HIDDEN, CONTROLLER_INPUTS, CONTROLLER_OUTPUTS,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Multiply-adds of one forward pass.
pub const CORE_MACS: u32 =
    (CONTROLLER_INPUTS * CONTROLLER_HIDDEN + CONTROLLER_HIDDEN * CONTROLLER_OUTPUTS) as u32;
/// Cost charged for drawing exploration noise.
pub const NOISE_MACS: u32 = 4;
/// Cost charged for recording a telemetry sample.
pub const TELEMETRY_MACS: u32 = 8;
pub const TELEMETRY_SLOTS: usize = 16;

/// Raw sensor data for one tick, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub position: Vector2,
    pub target: Vector2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepStatus {
    /// Core inference alone exceeded the multiply-add budget.
    pub budget_exceeded: bool,
    /// Noise or telemetry was dropped to stay within budget.
    pub secondary_skipped: bool,
    /// Telemetry pool had no free slot.
    pub pool_exhausted: bool,
    /// Non-finite inputs or outputs replaced by zero this tick.
    pub numeric_faults: u32,
    /// The previous command was reused instead of running inference.
    pub held: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    pub mode: RunMode,
    /// Motor command in world units, length at most `max_speed`.
    pub command: Vector2,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryRecord {
    pub tick: u64,
    pub command: [f64; 2],
    pub neighbor_count: u32,
    pub avg_rssi: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeDiagnostics {
    pub ticks: u64,
    pub inferences: u64,
    pub held_ticks: u64,
    pub budget_overruns: u64,
    pub secondary_skips: u64,
    pub pool_exhaustions: u64,
    pub numeric_faults: u64,
    pub mode_changes: u64,
}

#[derive(Debug, Clone)]
enum InferenceEngine {
    Float(ParamSet<f32>),
    Fixed {
        format: QFormat,
        params: ParamSet<i32>,
        tanh: TanhTable,
    },
}

impl InferenceEngine {
    fn infer(&self, input: &Perception) -> Action {
        match self {
            InferenceEngine::Float(params) => infer_float(params, input),
            InferenceEngine::Fixed {
                format,
                params,
                tanh,
            } => infer_fixed(*format, params, tanh, input),
        }
    }
}

fn infer_float(params: &ParamSet<f32>, input: &Perception) -> Action {
    let x = input.map(|v| v as f32);
    let mut hidden = [0.0f32; CONTROLLER_HIDDEN];
    for (j, h) in hidden.iter_mut().enumerate() {
        let mut acc = params.b1[j];
        for i in 0..CONTROLLER_INPUTS {
            acc += x[i] * params.w1[i][j];
        }
        *h = acc.tanh();
    }
    let mut output = [0.0; CONTROLLER_OUTPUTS];
    for (k, o) in output.iter_mut().enumerate() {
        let mut acc = params.b2[k];
        for (j, h) in hidden.iter().enumerate() {
            acc += h * params.w2[j][k];
        }
        *o = f64::from(acc.tanh());
    }
    output
}

fn infer_fixed(format: QFormat, params: &ParamSet<i32>, tanh: &TanhTable, input: &Perception) -> Action {
    let x = input.map(|v| format.to_fixed(v));
    let mut hidden = [0i32; CONTROLLER_HIDDEN];
    for (j, h) in hidden.iter_mut().enumerate() {
        let mut acc = format.widen(params.b1[j]);
        for i in 0..CONTROLLER_INPUTS {
            acc = format.mac(acc, x[i], params.w1[i][j]);
        }
        *h = tanh.eval(format.narrow(acc));
    }
    let mut output = [0.0; CONTROLLER_OUTPUTS];
    for (k, o) in output.iter_mut().enumerate() {
        let mut acc = format.widen(params.b2[k]);
        for (j, h) in hidden.iter().enumerate() {
            acc = format.mac(acc, *h, params.w2[j][k]);
        }
        *o = format.to_float(tanh.eval(format.narrow(acc)));
    }
    output
}

pub struct DeploymentRuntime {
    params: ExportedParams,
    engine: InferenceEngine,
    thresholds: PowerThresholds,
    mac_budget: u32,
    /// Control ticks per inference in simple-reactive mode.
    reactive_interval: u32,
    reactive_phase: u32,
    last_action: Action,
    last_mode: RunMode,
    tick: u64,
    rng: ChaCha8Rng,
    telemetry: BufferPool<TelemetryRecord, TELEMETRY_SLOTS>,
    diagnostics: RuntimeDiagnostics,
}

impl DeploymentRuntime {
    pub fn new(params: ExportedParams, config: &DeployConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(config.control_hz > 0, "Control rate must be positive");
        anyhow::ensure!(
            config.low_power_hz > 0 && config.low_power_hz <= config.control_hz,
            "Low power rate must be in (0, control_hz]"
        );
        let rc = &params.config;
        anyhow::ensure!(
            rc.max_speed.is_finite() && rc.max_speed > 0.0,
            "Max speed must be positive"
        );
        anyhow::ensure!(
            rc.position_scale.is_finite() && rc.position_scale > 0.0,
            "Position scale must be positive"
        );
        anyhow::ensure!(
            rc.neighbor_scale.is_finite() && rc.neighbor_scale > 0.0,
            "Neighbor scale must be positive"
        );

        let engine = match &params.repr {
            NumericRepr::Float { params } => {
                anyhow::ensure!(
                    params.values().all(f32::is_finite),
                    "Float parameters must be finite"
                );
                InferenceEngine::Float(params.clone())
            }
            NumericRepr::Fixed { frac_bits, params } => {
                let format = QFormat::new(*frac_bits)?;
                InferenceEngine::Fixed {
                    format,
                    params: params.clone(),
                    tanh: TanhTable::new(format),
                }
            }
        };
        tracing::info!(
            name = %params.name,
            format = ?params.repr.format(),
            mac_budget = config.mac_budget,
            "Deployment runtime ready"
        );

        Ok(Self {
            params,
            engine,
            thresholds: PowerThresholds::from_config(config),
            mac_budget: config.mac_budget,
            reactive_interval: (config.control_hz / config.low_power_hz).max(1),
            reactive_phase: 0,
            last_action: [0.0; CONTROLLER_OUTPUTS],
            last_mode: RunMode::Full,
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(config.noise_seed),
            telemetry: BufferPool::new(),
            diagnostics: RuntimeDiagnostics::default(),
        })
    }

    /// The loaded parameters. Never modified by the control loop.
    #[must_use]
    pub fn params(&self) -> &ExportedParams {
        &self.params
    }

    #[must_use]
    pub fn diagnostics(&self) -> RuntimeDiagnostics {
        self.diagnostics
    }

    /// Normalized controller output for `input`, after the safety clip.
    #[must_use]
    pub fn infer(&self, input: &Perception) -> Action {
        self.engine.infer(input).map(safe_output)
    }

    /// Builds the controller input the same way training does.
    #[must_use]
    pub fn perception(&self, frame: &SensorFrame, neighbors: Option<NeighborMessage>) -> Perception {
        let rc = &self.params.config;
        let neighbors = neighbors.unwrap_or_default();
        [
            frame.position.x / rc.position_scale,
            frame.position.y / rc.position_scale,
            frame.target.x / rc.position_scale,
            frame.target.y / rc.position_scale,
            f64::from(neighbors.neighbor_count) / rc.neighbor_scale,
            neighbors.avg_rssi,
        ]
    }

    fn noise_amplitude(&self) -> f64 {
        let rc = &self.params.config;
        let amplitude = rc.noise_scale * (-rc.noise_decay * self.tick as f64).exp();
        if amplitude.is_finite() {
            amplitude.max(0.0)
        } else {
            0.0
        }
    }

    /// Runs one control tick.
    pub fn step(
        &mut self,
        mode: RunMode,
        reading: ResourceReading,
        frame: SensorFrame,
        inbox: &NeighborInbox,
    ) -> ControlOutput {
        let mode = next_mode(mode, reading, &self.thresholds);
        if mode != self.last_mode {
            tracing::info!(from = ?self.last_mode, to = ?mode, tick = self.tick, "Run mode changed");
            self.diagnostics.mode_changes += 1;
            if mode == RunMode::SimpleReactive {
                self.reactive_phase = 0;
            }
            self.last_mode = mode;
        }
        let message = inbox.take();
        let mut status = StepStatus::default();

        let action = match mode {
            RunMode::SafeStop => {
                self.last_action = [0.0; CONTROLLER_OUTPUTS];
                self.last_action
            }
            RunMode::Full => self.run_inference(&frame, message, &mut status),
            RunMode::SimpleReactive => {
                let due = self.reactive_phase == 0;
                self.reactive_phase = (self.reactive_phase + 1) % self.reactive_interval;
                if due {
                    self.run_inference(&frame, None, &mut status)
                } else {
                    status.held = true;
                    self.diagnostics.held_ticks += 1;
                    self.last_action
                }
            }
        };

        let max_speed = self.params.config.max_speed;
        let mut command = (Vector2::new(action[0], action[1]) * max_speed).clamp_length(max_speed);
        if !command.is_finite() {
            command = Vector2::ZERO;
            status.numeric_faults += 1;
        }

        if mode != RunMode::SafeStop {
            self.record_telemetry(command, message, &mut status);
        }

        self.diagnostics.ticks += 1;
        self.diagnostics.numeric_faults += u64::from(status.numeric_faults);
        if status.budget_exceeded {
            self.diagnostics.budget_overruns += 1;
        }
        if status.secondary_skipped {
            self.diagnostics.secondary_skips += 1;
        }
        if status.pool_exhausted {
            self.diagnostics.pool_exhaustions += 1;
        }
        self.tick += 1;

        ControlOutput {
            mode,
            command,
            status,
        }
    }

    /// Core inference always runs; exploration noise is charged against
    /// whatever budget remains.
    fn run_inference(
        &mut self,
        frame: &SensorFrame,
        message: Option<NeighborMessage>,
        status: &mut StepStatus,
    ) -> Action {
        let raw = self.perception(frame, message);
        let (input, faults) = sanitize_perception(&raw);
        status.numeric_faults += faults;

        let output = self.engine.infer(&input);
        self.diagnostics.inferences += 1;
        let mut action = [0.0; CONTROLLER_OUTPUTS];
        for (a, o) in action.iter_mut().zip(output) {
            if !o.is_finite() {
                status.numeric_faults += 1;
            }
            *a = safe_output(o);
        }

        let remaining = self.mac_budget.checked_sub(CORE_MACS);
        status.budget_exceeded = remaining.is_none();
        let remaining = remaining.unwrap_or(0);

        let amplitude = self.noise_amplitude();
        if amplitude > 0.0 {
            if remaining >= NOISE_MACS {
                for a in &mut action {
                    *a = safe_output(*a + amplitude * self.rng.gen_range(-1.0..=1.0));
                }
            } else {
                status.secondary_skipped = true;
            }
        }

        self.last_action = action;
        action
    }

    fn record_telemetry(
        &mut self,
        command: Vector2,
        message: Option<NeighborMessage>,
        status: &mut StepStatus,
    ) {
        let spent = if status.held { 0 } else { CORE_MACS + NOISE_MACS };
        if self.mac_budget.saturating_sub(spent) < TELEMETRY_MACS {
            status.secondary_skipped = true;
            return;
        }
        let neighbors = message.unwrap_or_default();
        let record = TelemetryRecord {
            tick: self.tick,
            command: [command.x, command.y],
            neighbor_count: neighbors.neighbor_count,
            avg_rssi: neighbors.avg_rssi,
        };
        if self.telemetry.acquire(record).is_err() {
            status.pool_exhausted = true;
        }
    }

    /// Hands every buffered telemetry record to `sink`, oldest slot first.
    pub fn drain_telemetry(&mut self, sink: impl FnMut(TelemetryRecord)) {
        self.telemetry.drain(sink);
    }

    #[must_use]
    pub fn pending_telemetry(&self) -> usize {
        self.telemetry.in_use()
    }
}
