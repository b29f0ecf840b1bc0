//! Channels: named, role-tagged endpoints bound to one instance
//!
//! A channel has two sides. The producer side (external event source and
//! readers) queues input and retrieves results; the instance side pulls
//! queued input into the engine and stages computed results. Buffers are
//! handed over by move; only the slot swap is locked.

pub mod link;
pub mod role;

use std::sync::{Arc, OnceLock, Weak};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::instance::Instance;
use crate::spectrum::{SampleBuffer, WindowType};

pub use link::{parse_link, LinkSpec};
pub use role::{Category, ChannelRole, ScanKind};

/// Result handed to a reader
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRead {
    /// Exactly the requested number of values, zero-padded
    pub values: Arc<[f64]>,

    /// How many leading values are real results rather than padding
    pub delivered: usize,
}

/// Scalar state shared between producer threads and the cycle
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scalars {
    pub(crate) sample_freq: f64,
    pub(crate) window_type: WindowType,
    /// Seconds
    pub(crate) runtime: f64,
    pub(crate) timestamp: Option<SystemTime>,
}

/// One input generation: samples and the time they were written
#[derive(Debug)]
struct QueuedInput {
    samples: SampleBuffer,
    timestamp: Option<SystemTime>,
}

#[derive(Debug, Default)]
struct OutputSlots {
    /// Staged by the cycle, not yet read
    next: Option<Arc<[f64]>>,
    /// Last value handed to a reader
    current: Option<OutputRead>,
}

/// Named I/O endpoint of an instance
#[derive(Debug)]
pub struct Channel {
    name: String,
    role: ChannelRole,

    /// First index of the category buffer this channel presents
    offset: usize,

    instance: Weak<Instance>,

    next_input: Mutex<Option<QueuedInput>>,
    output: Mutex<OutputSlots>,
    scalars: Mutex<Scalars>,

    /// Largest element count a reader will request, registered at setup
    required_size: OnceLock<usize>,
}

impl Channel {
    pub(crate) fn new(
        name: impl Into<String>,
        role: ChannelRole,
        offset: usize,
        instance: Weak<Instance>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            offset,
            instance,
            next_input: Mutex::new(None),
            output: Mutex::new(OutputSlots::default()),
            scalars: Mutex::new(Scalars {
                sample_freq: 0.0,
                window_type: WindowType::None,
                runtime: 0.0,
                timestamp: None,
            }),
            required_size: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Owning instance, if it is still alive
    pub fn instance(&self) -> Option<Arc<Instance>> {
        self.instance.upgrade()
    }

    // ---- Producer side ----

    /// Copy `samples` into a fresh aligned buffer and queue it,
    /// replacing any queued buffer the instance has not consumed yet
    pub fn set_next_input_value(&self, samples: &[f64]) {
        self.queue_input(samples, None);
    }

    /// Queue samples together with their timestamp, which becomes the
    /// channel timestamp only once the instance takes the samples
    pub(crate) fn queue_input(&self, samples: &[f64], timestamp: Option<SystemTime>) {
        let input = QueuedInput {
            samples: SampleBuffer::from_slice(samples),
            timestamp,
        };
        *self.next_input.lock() = Some(input);
    }

    /// Hand over the most recent result, sized to `count`
    ///
    /// The view starts at this channel's offset. Shorter results are
    /// zero-padded, longer ones truncated. Returns `None` if nothing new
    /// was staged since the last read; the previous value stays available
    /// through [`Channel::current_output_value`].
    pub fn get_next_output_value(&self, count: usize) -> Option<OutputRead> {
        let mut slots = self.output.lock();
        let next = slots.next.take()?;

        let available = next.get(self.offset..).unwrap_or(&[]);
        let delivered = available.len().min(count);

        let mut values = vec![0.0; count];
        values[..delivered].copy_from_slice(&available[..delivered]);

        let read = OutputRead {
            values: values.into(),
            delivered,
        };
        slots.current = Some(read.clone());
        Some(read)
    }

    /// Allocate a zero-filled buffer of `count` values and make it current
    pub fn create_empty_output_value(&self, count: usize) -> OutputRead {
        let read = OutputRead {
            values: vec![0.0; count].into(),
            delivered: 0,
        };
        self.output.lock().current = Some(read.clone());
        read
    }

    /// Last value handed to a reader
    pub fn current_output_value(&self) -> Option<OutputRead> {
        self.output.lock().current.clone()
    }

    /// Register the largest count a reader will request
    ///
    /// Setup-time only; a second registration is rejected.
    pub fn set_required_output_size(&self, size: usize) -> Result<()> {
        self.required_size
            .set(size)
            .map_err(|_| EngineError::RequiredSizeAlreadySet(self.name.clone()))
    }

    pub fn required_output_size(&self) -> Option<usize> {
        self.required_size.get().copied()
    }

    // ---- Instance side ----

    /// Take the queued input buffer, if a new one arrived
    ///
    /// A timestamp queued with the buffer becomes the channel timestamp.
    pub fn get_next_input_value(&self) -> Option<SampleBuffer> {
        let input = self.next_input.lock().take()?;
        if let Some(timestamp) = input.timestamp {
            self.set_timestamp(timestamp);
        }
        Some(input.samples)
    }

    /// Stage a computed result for the next reader
    pub fn set_next_output_value(&self, value: Arc<[f64]>) {
        self.output.lock().next = Some(value);
    }

    // ---- Scalars ----

    pub fn sample_freq(&self) -> f64 {
        self.scalars.lock().sample_freq
    }

    pub fn set_sample_freq(&self, freq: f64) {
        self.scalars.lock().sample_freq = freq;
    }

    pub fn window_type(&self) -> WindowType {
        self.scalars.lock().window_type
    }

    pub fn set_window_type(&self, window_type: WindowType) {
        self.scalars.lock().window_type = window_type;
    }

    /// Duration of the last cycle in seconds
    pub fn runtime(&self) -> f64 {
        self.scalars.lock().runtime
    }

    pub fn set_runtime(&self, seconds: f64) {
        self.scalars.lock().runtime = seconds;
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.scalars.lock().timestamp
    }

    pub fn set_timestamp(&self, timestamp: SystemTime) {
        self.scalars.lock().timestamp = Some(timestamp);
    }

    /// All scalars read under one lock
    pub(crate) fn scalars(&self) -> Scalars {
        *self.scalars.lock()
    }

    // ---- Event-source surface ----

    /// Queue a new sample set; triggers the instance if this is its
    /// trigger channel
    pub fn write_samples(&self, samples: &[f64], timestamp: SystemTime) -> Result<()> {
        self.expect_role(ChannelRole::InputReal, "accept samples")?;
        self.queue_input(samples, Some(timestamp));
        self.finish_write()
    }

    /// Set the sampling frequency (Hz); triggers if this is the trigger channel
    pub fn write_sample_freq(&self, freq: f64, timestamp: SystemTime) -> Result<()> {
        self.expect_role(ChannelRole::SetSampleFreq, "accept a sampling frequency")?;
        {
            let mut scalars = self.scalars.lock();
            scalars.sample_freq = freq;
            scalars.timestamp = Some(timestamp);
        }
        self.finish_write()
    }

    /// Select the window by index; triggers if this is the trigger channel
    pub fn write_window_type(&self, index: u32, timestamp: SystemTime) -> Result<()> {
        self.expect_role(ChannelRole::SetWindowType, "accept a window type")?;
        let window_type = WindowType::from_index(index)?;
        {
            let mut scalars = self.scalars.lock();
            scalars.window_type = window_type;
            scalars.timestamp = Some(timestamp);
        }
        log::trace!("{}: set window type {}", self.name, window_type);
        self.finish_write()
    }

    /// Read the next array result of a valid instance
    ///
    /// # Errors
    /// `InvalidResult` if the last cycle of the instance was invalid
    pub fn read_array(&self, count: usize) -> Result<Option<OutputRead>> {
        if self.role.category().is_none() {
            return Err(self.role_mismatch("be read as an array"));
        }
        let instance = self.live_instance()?;
        if !instance.is_valid() {
            return Err(EngineError::InvalidResult(instance.name().to_string()));
        }
        Ok(self.get_next_output_value(count))
    }

    /// Read the last cycle duration (seconds) and its timestamp
    pub fn read_exec_time(&self) -> Result<(f64, Option<SystemTime>)> {
        self.expect_role(ChannelRole::ExecutionTime, "report execution time")?;
        let scalars = *self.scalars.lock();
        Ok((scalars.runtime, scalars.timestamp))
    }

    fn finish_write(&self) -> Result<()> {
        let instance = self.live_instance()?;
        if instance.is_trigger_source(self) {
            instance.trigger()?;
        }
        Ok(())
    }

    fn live_instance(&self) -> Result<Arc<Instance>> {
        self.instance
            .upgrade()
            .ok_or_else(|| EngineError::Detached(self.name.clone()))
    }

    fn expect_role(&self, role: ChannelRole, action: &'static str) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(self.role_mismatch(action))
        }
    }

    fn role_mismatch(&self, action: &'static str) -> EngineError {
        EngineError::RoleMismatch {
            channel: self.name.clone(),
            role: self.role.name(),
            action,
        }
    }
}
