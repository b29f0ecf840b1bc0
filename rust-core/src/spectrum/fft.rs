//! Transform engine using realfft for real-valued signals
//!
//! Re-derives the window, the frequency scale and the transform plan only
//! when their governing parameters change; every cycle re-applies the
//! window to new input and re-executes the plan.

use std::sync::Arc;

use num_complex::Complex;
use parking_lot::Mutex;
use realfft::{RealFftPlanner, RealToComplex};

use super::buffer::SampleBuffer;
use super::windowing::{apply_window_inplace, generate_window, WindowType};
use crate::error::{EngineError, Result};

/// Process-wide lock around plan construction.
///
/// Only one plan may be built at a time anywhere in the process.
static PLANNER_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Parameters changed without a size change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaleParams {
    Window,
    Scale,
    Both,
}

/// What the engine must recompute before the next execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    Clean,
    /// Input length changed (or nothing built yet): window, scale and plan
    SizeChanged,
    ParamsChanged(StaleParams),
}

/// Recomputation decision for one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Recompute {
    window: bool,
    scale: bool,
    plan: bool,
}

impl Staleness {
    fn recompute(self) -> Recompute {
        match self {
            Staleness::Clean => Recompute::default(),
            Staleness::SizeChanged => Recompute {
                window: true,
                scale: true,
                plan: true,
            },
            Staleness::ParamsChanged(p) => Recompute {
                window: matches!(p, StaleParams::Window | StaleParams::Both),
                scale: matches!(p, StaleParams::Scale | StaleParams::Both),
                plan: false,
            },
        }
    }

    fn with_window(self) -> Self {
        match self {
            Staleness::Clean | Staleness::ParamsChanged(StaleParams::Window) => {
                Staleness::ParamsChanged(StaleParams::Window)
            }
            Staleness::ParamsChanged(_) => Staleness::ParamsChanged(StaleParams::Both),
            Staleness::SizeChanged => Staleness::SizeChanged,
        }
    }

    fn with_scale(self) -> Self {
        match self {
            Staleness::Clean | Staleness::ParamsChanged(StaleParams::Scale) => {
                Staleness::ParamsChanged(StaleParams::Scale)
            }
            Staleness::ParamsChanged(_) => Staleness::ParamsChanged(StaleParams::Both),
            Staleness::SizeChanged => Staleness::SizeChanged,
        }
    }

    /// State after the window has been regenerated.
    /// A size change stays pending until the plan is rebuilt.
    fn window_done(self) -> Self {
        match self {
            Staleness::ParamsChanged(StaleParams::Both)
            | Staleness::ParamsChanged(StaleParams::Scale) => {
                Staleness::ParamsChanged(StaleParams::Scale)
            }
            Staleness::ParamsChanged(StaleParams::Window) => Staleness::Clean,
            other => other,
        }
    }

    /// State after replanning. Window staleness survives only if the
    /// window step has not run since it was flagged.
    fn plan_done(self) -> Self {
        match self {
            Staleness::ParamsChanged(StaleParams::Both)
            | Staleness::ParamsChanged(StaleParams::Window) => {
                Staleness::ParamsChanged(StaleParams::Window)
            }
            _ => Staleness::Clean,
        }
    }
}

/// A forward real-to-complex plan bound to one input length
struct Plan {
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Working copy of the windowed input (realfft clobbers its input)
    work: Vec<f64>,

    scratch: Vec<Complex<f64>>,
}

impl Plan {
    fn build(ntime: usize) -> Self {
        let _guard = PLANNER_LOCK.lock();
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(ntime);
        let work = r2c.make_input_vec();
        let scratch = r2c.make_scratch_vec();

        Self { r2c, work, scratch }
    }
}

/// Windowed real-to-complex transform with incremental recomputation
pub struct TransformEngine {
    window_type: WindowType,
    window: Vec<f64>,

    /// Current input generation, windowed in place
    input: Option<SampleBuffer>,

    /// Input arrived since the last windowing step
    new_value: bool,

    /// Length (N) of the current input
    ntime: usize,

    plan: Option<Plan>,

    /// Complex spectrum, N/2+1 bins
    output: Vec<Complex<f64>>,

    sample_freq: f64,
    fscale: Vec<f64>,

    staleness: Staleness,

    /// Number of plans constructed over the engine's lifetime
    plan_builds: u64,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine {
    /// Create an engine with no input, no window and fs = 0
    pub fn new() -> Self {
        Self {
            window_type: WindowType::None,
            window: Vec::new(),
            input: None,
            new_value: false,
            ntime: 0,
            plan: None,
            output: Vec::new(),
            sample_freq: 0.0,
            fscale: Vec::new(),
            staleness: Staleness::SizeChanged,
            plan_builds: 0,
        }
    }

    /// Set the sampling frequency (Hz)
    ///
    /// # Returns
    /// Whether the value changed; a change marks the frequency scale stale
    pub fn set_sample_freq(&mut self, freq: f64) -> bool {
        let changed = self.sample_freq != freq;
        if changed {
            self.sample_freq = freq;
            self.staleness = self.staleness.with_scale();
        }
        changed
    }

    /// Select the window function; takes effect on the next windowing step
    pub fn set_window_type(&mut self, window_type: WindowType) -> bool {
        let changed = self.window_type != window_type;
        if changed {
            self.window_type = window_type;
            self.staleness = self.staleness.with_window();
        }
        changed
    }

    /// Take ownership of a new input generation
    ///
    /// A length change invalidates window, scale and plan.
    pub fn set_input(&mut self, input: SampleBuffer) {
        if input.len() != self.ntime {
            self.ntime = input.len();
            self.staleness = Staleness::SizeChanged;
        }
        self.input = Some(input);
        self.new_value = true;
    }

    /// Regenerate the window if stale, then window any new input in place
    ///
    /// # Returns
    /// Whether the window coefficients were regenerated by this call
    pub fn apply_window(&mut self) -> bool {
        if self.ntime == 0 {
            return false;
        }

        let mut window_changed = false;
        if self.staleness.recompute().window {
            self.window = generate_window(self.window_type, self.ntime);
            self.staleness = self.staleness.window_done();
            window_changed = true;
        }

        if self.new_value {
            if let Some(input) = self.input.as_mut() {
                apply_window_inplace(input.as_mut_slice(), &self.window);
            }
            self.new_value = false;
        }

        window_changed
    }

    /// Rebuild the plan, output buffer and frequency scale as needed
    ///
    /// # Returns
    /// Whether the frequency scale was recomputed by this call
    pub fn replan(&mut self) -> bool {
        if self.ntime == 0 {
            return false;
        }

        let todo = self.staleness.recompute();

        if todo.plan {
            self.plan = None;
            self.output = vec![Complex::new(0.0, 0.0); self.nfreq()];
            self.plan = Some(Plan::build(self.ntime));
            self.plan_builds += 1;
        }

        if todo.scale {
            let mult = self.sample_freq / self.ntime as f64;
            self.fscale = (0..self.nfreq()).map(|k| k as f64 * mult).collect();
        }

        self.staleness = self.staleness.plan_done();
        todo.scale
    }

    /// Execute the plan against the current (windowed) input
    ///
    /// # Errors
    /// `NoPlan` if no input has been planned for yet
    pub fn transform(&mut self) -> Result<()> {
        let (plan, input) = match (self.plan.as_mut(), self.input.as_ref()) {
            (Some(plan), Some(input)) if plan.work.len() == input.len() => (plan, input),
            _ => return Err(EngineError::NoPlan),
        };

        plan.work.copy_from_slice(input.as_slice());
        plan.r2c
            .process_with_scratch(&mut plan.work, &mut self.output, &mut plan.scratch)
            .map_err(|e| EngineError::Transform(e.to_string()))
    }

    /// Number of time-domain samples (N)
    pub fn ntime(&self) -> usize {
        self.ntime
    }

    /// Number of frequency bins (N/2 + 1, or 0 without input)
    pub fn nfreq(&self) -> usize {
        if self.ntime == 0 {
            0
        } else {
            self.ntime / 2 + 1
        }
    }

    pub fn output(&self) -> &[Complex<f64>] {
        &self.output
    }

    pub fn window(&self) -> &[f64] {
        &self.window
    }

    /// Frequency of each bin in Hz: k * fs / N
    pub fn fscale(&self) -> &[f64] {
        &self.fscale
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn sample_freq(&self) -> f64 {
        self.sample_freq
    }

    pub fn has_plan(&self) -> bool {
        self.plan.is_some()
    }

    /// Number of plans built so far
    pub fn plan_builds(&self) -> u64 {
        self.plan_builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn cycle(engine: &mut TransformEngine, samples: &[f64]) -> (bool, bool) {
        engine.set_input(SampleBuffer::from_slice(samples));
        let window_changed = engine.apply_window();
        let scale_changed = engine.replan();
        engine.transform().unwrap();
        (window_changed, scale_changed)
    }

    #[test]
    fn test_pulse_matches_reference() {
        // rfft([0, 1, 0, 0]) = [1, -i, -1]
        let mut engine = TransformEngine::new();
        cycle(&mut engine, &[0.0, 1.0, 0.0, 0.0]);

        let out = engine.output();
        assert_eq!(out.len(), 3);
        assert!((out[0] - Complex::new(1.0, 0.0)).norm() < 1e-12);
        assert!((out[1] - Complex::new(0.0, -1.0)).norm() < 1e-12);
        assert!((out[2] - Complex::new(-1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_no_window_leaves_input_unchanged() {
        let mut engine = TransformEngine::new();
        let samples: Vec<f64> = (0..32).map(|n| n as f64 - 7.5).collect();
        engine.set_input(SampleBuffer::from_slice(&samples));
        engine.apply_window();

        assert_eq!(engine.input.as_ref().unwrap().as_slice(), &samples[..]);
    }

    #[test]
    fn test_plan_built_once_per_size() {
        let mut engine = TransformEngine::new();

        assert_eq!(cycle(&mut engine, &[1.0; 16]), (true, true));
        assert_eq!(cycle(&mut engine, &[2.0; 16]), (false, false));
        assert_eq!(cycle(&mut engine, &[3.0; 16]), (false, false));
        assert_eq!(engine.plan_builds(), 1);

        assert_eq!(cycle(&mut engine, &[1.0; 32]), (true, true));
        assert_eq!(engine.plan_builds(), 2);
        assert_eq!(engine.output().len(), 17);
    }

    #[test]
    fn test_sample_freq_change_rescales_without_replanning() {
        let mut engine = TransformEngine::new();
        engine.set_sample_freq(1000.0);
        cycle(&mut engine, &[0.5; 10]);
        assert_eq!(engine.fscale()[1], 100.0);

        assert!(engine.set_sample_freq(2000.0));
        assert!(!engine.set_sample_freq(2000.0));
        assert_eq!(cycle(&mut engine, &[0.5; 10]), (false, true));
        assert_eq!(engine.fscale()[1], 200.0);
        assert_eq!(engine.plan_builds(), 1);
    }

    #[test]
    fn test_window_type_change_regenerates_window_only() {
        let mut engine = TransformEngine::new();
        cycle(&mut engine, &[1.0; 8]);
        assert!(engine.window().iter().all(|&w| w == 1.0));

        assert!(engine.set_window_type(WindowType::Hann));
        assert_eq!(cycle(&mut engine, &[1.0; 8]), (true, false));
        assert!(engine.window()[0].abs() < 1e-12);
        assert_eq!(engine.plan_builds(), 1);
    }

    #[test]
    fn test_fscale_values() {
        for n in [2usize, 5, 8, 33, 100] {
            let mut engine = TransformEngine::new();
            engine.set_sample_freq(48000.0);
            cycle(&mut engine, &vec![0.0; n]);

            assert_eq!(engine.fscale().len(), n / 2 + 1);
            assert_eq!(engine.output().len(), n / 2 + 1);
            for (k, &f) in engine.fscale().iter().enumerate() {
                assert!((f - k as f64 * 48000.0 / n as f64).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_sine_peak_bin() {
        let fs = 1024.0;
        let f0 = 50.0;
        let n = 512;
        let samples: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * f0 * i as f64 / fs).sin())
            .collect();

        let mut engine = TransformEngine::new();
        engine.set_sample_freq(fs);
        cycle(&mut engine, &samples);

        let (peak_bin, _) = engine
            .output()
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.norm().partial_cmp(&b.norm()).unwrap())
            .unwrap();

        assert_eq!(peak_bin, (f0 * n as f64 / fs).round() as usize);
    }

    #[test]
    fn test_transform_without_input_fails() {
        let mut engine = TransformEngine::new();
        assert!(!engine.apply_window());
        assert!(!engine.replan());
        assert!(matches!(engine.transform(), Err(EngineError::NoPlan)));
        assert!(!engine.has_plan());
    }

    #[test]
    fn test_retransform_is_repeatable() {
        let mut engine = TransformEngine::new();
        cycle(&mut engine, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let first = engine.output().to_vec();

        engine.transform().unwrap();
        assert_eq!(engine.output(), &first[..]);
    }

    #[test]
    fn test_staleness_transitions() {
        let s = Staleness::Clean.with_window().with_scale();
        assert_eq!(s, Staleness::ParamsChanged(StaleParams::Both));
        assert_eq!(s.window_done(), Staleness::ParamsChanged(StaleParams::Scale));
        assert_eq!(s.window_done().plan_done(), Staleness::Clean);
        assert_eq!(Staleness::SizeChanged.with_scale(), Staleness::SizeChanged);
        assert_eq!(Staleness::SizeChanged.window_done(), Staleness::SizeChanged);
    }
}
