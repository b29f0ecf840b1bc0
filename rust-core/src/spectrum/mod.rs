//! Spectral analysis: aligned input buffers, windowing, the transform
//! engine and derived output representations

pub mod analysis;
pub mod buffer;
pub mod fft;
pub mod windowing;

pub use buffer::SampleBuffer;
pub use fft::TransformEngine;
pub use windowing::{generate_window, WindowType};
