//! FFT Instance Core - Incremental Real-to-Complex Spectral Engine
//!
//! Named FFT instances fed by role-tagged channels. A write to an
//! instance's trigger channel queues a cycle on a worker pool; the cycle
//! windows the latest input, re-plans only when the input length changes,
//! executes the transform and hands real/imaginary/magnitude/phase,
//! frequency scale and window arrays to subscribed output channels.
//!
//! ```no_run
//! use std::time::SystemTime;
//! use fft_instance::{EngineConfig, InstanceRegistry, ScanKind};
//!
//! let registry = InstanceRegistry::new(EngineConfig::default())?;
//! let wave = registry.connect("wave", "A1 input-real trigger=yes")?;
//! let magn = registry.connect("magn", "A1 output-magn")?;
//! let ready = registry.find("A1").unwrap().subscribe(ScanKind::Value);
//!
//! wave.write_samples(&[0.0, 1.0, 0.0, 0.0], SystemTime::now())?;
//! ready.recv().unwrap();
//! let spectrum = magn.read_array(3)?;
//! # Ok::<(), fft_instance::EngineError>(())
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod instance;
pub mod scheduler;
pub mod spectrum;

pub use channel::{Channel, ChannelRole, OutputRead, ScanKind};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use instance::{DataReady, Instance, InstanceRegistry, InstanceReport};
pub use spectrum::{TransformEngine, WindowType};

/// Crate version reported in the startup banner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
