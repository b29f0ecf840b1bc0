//! Instances: a transform engine plus the channels feeding and reading it
//!
//! One cycle collects pending inputs, windows, (re)plans, executes, derives
//! the subscribed output categories, distributes them to the output
//! channels and raises data-ready notifications. Cycles run on the job
//! scheduler only.

pub mod registry;
pub mod report;
pub mod scan;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Instant, SystemTime};

use parking_lot::{Mutex, RwLock};

use crate::channel::{Category, Channel, ChannelRole, ScanKind};
use crate::config::{EngineConfig, StageThresholds};
use crate::error::{EngineError, Result};
use crate::scheduler::{Job, JobScheduler};
use crate::spectrum::analysis;
use crate::spectrum::TransformEngine;

pub use registry::InstanceRegistry;
pub use report::InstanceReport;
pub use scan::DataReady;

use scan::Scans;

/// Named aggregate of channels around one transform engine
pub struct Instance {
    name: String,

    inputs: RwLock<Vec<Arc<Channel>>>,
    outputs: RwLock<Vec<Arc<Channel>>>,

    /// First input channel marked as trigger
    trigger_src: OnceLock<Weak<Channel>>,

    engine: Mutex<TransformEngine>,

    /// Last cycle produced a complete result
    valid: AtomicBool,

    /// Duration of the last cycle in seconds
    last_runtime: Mutex<f64>,

    triggered_at: Mutex<Option<Instant>>,

    scans: Scans,
    thresholds: StageThresholds,
    job: Job,
}

impl Instance {
    pub(crate) fn new(name: &str, scheduler: &JobScheduler, config: &EngineConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Instance>| {
            let weak = weak.clone();
            let job = scheduler.create_job(name, move || {
                if let Some(instance) = weak.upgrade() {
                    instance.calculate();
                }
            });

            Self {
                name: name.to_string(),
                inputs: RwLock::new(Vec::new()),
                outputs: RwLock::new(Vec::new()),
                trigger_src: OnceLock::new(),
                engine: Mutex::new(TransformEngine::new()),
                valid: AtomicBool::new(false),
                last_runtime: Mutex::new(0.0),
                triggered_at: Mutex::new(None),
                scans: Scans::new(config.notify_depth),
                thresholds: config.thresholds,
                job,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a channel; the first input channel marked `trigger` becomes
    /// the trigger source
    pub(crate) fn attach(&self, channel: Arc<Channel>, trigger: bool) {
        if trigger && channel.role().is_input() {
            if self.trigger_src.set(Arc::downgrade(&channel)).is_ok() {
                log::trace!("{}: will trigger instance '{}'", channel.name(), self.name);
            } else {
                log::warn!(
                    "{}: instance '{}' already has a trigger source, ignoring",
                    channel.name(),
                    self.name
                );
            }
        }

        log::trace!(
            "{}: connected as {} to instance '{}'",
            channel.name(),
            channel.role(),
            self.name
        );

        if channel.role().is_input() {
            self.inputs.write().push(channel);
        } else {
            self.outputs.write().push(channel);
        }
    }

    pub fn is_trigger_source(&self, channel: &Channel) -> bool {
        self.trigger_src
            .get()
            .is_some_and(|src| std::ptr::eq(src.as_ptr(), channel))
    }

    /// Queue a cycle; returns without waiting for it
    pub fn trigger(&self) -> Result<()> {
        *self.triggered_at.lock() = Some(Instant::now());
        if self.job.queue()? {
            log::debug!("Queueing calculation job for {}", self.name);
        } else {
            log::debug!("Calculation job for {} already pending", self.name);
        }
        Ok(())
    }

    /// Whether the last cycle produced a complete result
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Duration of the last cycle in seconds
    pub fn last_runtime(&self) -> f64 {
        *self.last_runtime.lock()
    }

    /// Number of transform plans built so far
    pub fn plan_builds(&self) -> u64 {
        self.engine.lock().plan_builds()
    }

    /// Receive a notification each time a cycle raises `kind`
    pub fn subscribe(&self, kind: ScanKind) -> flume::Receiver<DataReady> {
        self.scans.get(kind).subscribe()
    }

    pub fn inputs(&self) -> Vec<Arc<Channel>> {
        self.inputs.read().clone()
    }

    pub fn outputs(&self) -> Vec<Arc<Channel>> {
        self.outputs.read().clone()
    }

    /// Largest view (offset + registered size) any subscriber of
    /// `category` will request, or `None` without subscribers
    pub fn required_size(&self, category: Category) -> Option<usize> {
        required_size(&self.outputs.read(), category)
    }

    /// Diagnostic summary of the instance
    pub fn report(&self) -> InstanceReport {
        let channels = self
            .inputs
            .read()
            .iter()
            .chain(self.outputs.read().iter())
            .map(|c| (c.role(), c.name().to_string()))
            .collect();

        let trigger = self
            .trigger_src
            .get()
            .and_then(Weak::upgrade)
            .map(|c| c.name().to_string());

        let engine = self.engine.lock();
        InstanceReport {
            name: self.name.clone(),
            channels,
            trigger,
            input_size: engine.ntime(),
            window_type: engine.window_type(),
            sample_freq: engine.sample_freq(),
            exec_time: self.last_runtime(),
            plan_builds: engine.plan_builds(),
            valid: self.is_valid(),
        }
    }

    /// Run one cycle
    pub(crate) fn calculate(&self) {
        let started = Instant::now();
        if let Some(queued) = self.triggered_at.lock().take() {
            log::trace!(
                "{}: cycle started {:?} after trigger",
                self.name,
                started.duration_since(queued)
            );
        }

        let mut timer = StageTimer::new(&self.name, started);
        let mut engine = self.engine.lock();

        // Collect. Each value is read together with its timestamp so the
        // result carries the stamp of the generation it was computed from.
        let mut trigger_stamp = None;
        for conn in self.inputs.read().iter() {
            if conn.role() == ChannelRole::InputReal {
                if let Some(buffer) = conn.get_next_input_value() {
                    engine.set_input(buffer);
                }
            }

            let scalars = conn.scalars();
            match conn.role() {
                ChannelRole::SetSampleFreq => {
                    engine.set_sample_freq(scalars.sample_freq);
                }
                ChannelRole::SetWindowType => {
                    engine.set_window_type(scalars.window_type);
                }
                _ => {}
            }

            if self.is_trigger_source(conn) {
                trigger_stamp = scalars.timestamp;
            }
        }
        let timestamp = trigger_stamp.unwrap_or_else(SystemTime::now);

        let window_changed = engine.apply_window();
        timer.lap("prepare", self.thresholds.prepare);

        let scale_changed = engine.replan();
        timer.lap("replan", self.thresholds.replan);

        let executed = match engine.transform() {
            Ok(()) => true,
            Err(EngineError::NoPlan) => {
                log::debug!("{}: no input collected yet, result invalid", self.name);
                false
            }
            Err(e) => {
                log::warn!("{}: {}", self.name, e);
                false
            }
        };
        timer.lap("execute", self.thresholds.execute);

        let valid = executed
            && !engine.output().is_empty()
            && !engine.window().is_empty()
            && !engine.fscale().is_empty();
        self.valid.store(valid, Ordering::Release);

        let outputs = self.outputs.read();
        if valid {
            let derived = Derived::compute(&engine, &outputs, window_changed, scale_changed);
            for conn in outputs.iter() {
                if let Some(value) = conn.role().category().and_then(|c| derived.get(c)) {
                    conn.set_next_output_value(Arc::clone(value));
                }
            }
        }
        timer.lap("post-proc", self.thresholds.post_process);
        drop(engine);

        let runtime = started.elapsed().as_secs_f64();
        *self.last_runtime.lock() = runtime;
        for conn in outputs.iter() {
            conn.set_timestamp(timestamp);
            if conn.role() == ChannelRole::ExecutionTime {
                conn.set_runtime(runtime);
            }
        }
        drop(outputs);

        self.raise(ScanKind::Value, timestamp);
        if valid && scale_changed {
            self.raise(ScanKind::Scale, timestamp);
        }
        if valid && window_changed {
            self.raise(ScanKind::Window, timestamp);
        }
    }

    fn raise(&self, kind: ScanKind, timestamp: SystemTime) {
        self.scans.get(kind).raise(&DataReady {
            instance: self.name.clone(),
            kind,
            timestamp,
        });
    }
}

fn required_size(outputs: &[Arc<Channel>], category: Category) -> Option<usize> {
    outputs
        .iter()
        .filter(|c| c.role().category() == Some(category))
        .map(|c| c.offset() + c.required_output_size().unwrap_or(0))
        .max()
}

/// Output categories computed in one cycle
struct Derived {
    buffers: [Option<Arc<[f64]>>; Category::COUNT],
}

impl Derived {
    /// Compute every category with at least one subscriber; scale and
    /// window only when they changed
    fn compute(
        engine: &TransformEngine,
        outputs: &[Arc<Channel>],
        window_changed: bool,
        scale_changed: bool,
    ) -> Self {
        let mut buffers: [Option<Arc<[f64]>>; Category::COUNT] = Default::default();

        for category in Category::ALL {
            let Some(required) = required_size(outputs, category) else {
                continue;
            };

            let values = match category {
                Category::Real => analysis::real_part(engine.output()),
                Category::Imag => analysis::imag_part(engine.output()),
                Category::Magnitude => analysis::magnitude_db(engine.output()),
                Category::Phase => analysis::phase(engine.output()),
                Category::Scale if scale_changed => engine.fscale().to_vec(),
                Category::Window if window_changed => engine.window().to_vec(),
                Category::Scale | Category::Window => continue,
            };

            if required > values.len() {
                log::debug!(
                    "{:?} output holds {} values, readers registered for {}",
                    category,
                    values.len(),
                    required
                );
            }
            buffers[category.index()] = Some(Arc::from(values));
        }

        Self { buffers }
    }

    fn get(&self, category: Category) -> Option<&Arc<[f64]>> {
        self.buffers[category.index()].as_ref()
    }
}

/// Wall-clock lap timer reporting stages that exceed a threshold
struct StageTimer<'a> {
    instance: &'a str,
    last: Instant,
}

impl<'a> StageTimer<'a> {
    fn new(instance: &'a str, start: Instant) -> Self {
        Self {
            instance,
            last: start,
        }
    }

    fn lap(&mut self, stage: &str, threshold: f64) {
        let now = Instant::now();
        let interval = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        if interval > threshold {
            log::debug!(
                "{}: calculate() {} over threshold {:.6} > {:.6}",
                self.instance,
                stage,
                interval,
                threshold
            );
        }
    }
}
