//! Window functions applied to time-domain input before the transform
//!
//! Reduces spectral leakage. Coefficients are generated once per
//! (type, length) and multiplied into each new input in place.

use std::f64::consts::PI;
use std::fmt;

use crate::error::{EngineError, Result};

/// Window function types, indexed by the value written to a
/// `windowtype` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    /// No windowing: w[n] = 1
    #[default]
    None,

    /// Hann window: w[n] = sin²(πn/(N-1))
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(N-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(N-1)) + 0.08*cos(4πn/(N-1))
    Blackman,
}

impl WindowType {
    pub const ALL: [WindowType; 4] = [
        WindowType::None,
        WindowType::Hann,
        WindowType::Hamming,
        WindowType::Blackman,
    ];

    /// Look up a window type by its selector index
    pub fn from_index(index: u32) -> Result<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or(EngineError::UnknownWindowType(index))
    }

    /// Selector index of this window type
    pub fn index(self) -> u32 {
        match self {
            WindowType::None => 0,
            WindowType::Hann => 1,
            WindowType::Hamming => 2,
            WindowType::Blackman => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WindowType::None => "None",
            WindowType::Hann => "Hann",
            WindowType::Hamming => "Hamming",
            WindowType::Blackman => "Blackman",
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generate window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (N)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..N-1.
/// A window of length 0 or 1 is all ones for every type.
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length];
    }

    let denom = (length - 1) as f64;

    match window_type {
        WindowType::None => vec![1.0; length],

        WindowType::Hann => (0..length)
            .map(|n| {
                let s = (PI * n as f64 / denom).sin();
                s * s
            })
            .collect(),

        WindowType::Hamming => (0..length)
            .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f64 / denom).cos())
            .collect(),

        WindowType::Blackman => (0..length)
            .map(|n| {
                let angle = 2.0 * PI * n as f64 / denom;
                0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos()
            })
            .collect(),
    }
}

/// Multiply `signal` by `window` element-wise, in place
pub fn apply_window_inplace(signal: &mut [f64], window: &[f64]) {
    for (s, w) in signal.iter_mut().zip(window.iter()) {
        *s *= w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hann_endpoints_and_center() {
        let hann = generate_window(WindowType::Hann, 161);

        assert_eq!(hann.len(), 161);
        assert!(hann[0].abs() < 1e-12);
        assert!(hann[160].abs() < 1e-12);
        assert!((hann[80] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hamming_endpoints() {
        let hamming = generate_window(WindowType::Hamming, 64);
        assert!(hamming[0] > 0.07 && hamming[0] < 0.09);
        assert!((hamming[0] - hamming[63]).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(generate_window(WindowType::Hann, 0).is_empty());
        assert_eq!(generate_window(WindowType::Hann, 1), vec![1.0]);
        assert_eq!(generate_window(WindowType::Blackman, 1), vec![1.0]);
    }

    #[test]
    fn test_index_lookup() {
        for wt in WindowType::ALL {
            assert_eq!(WindowType::from_index(wt.index()).unwrap(), wt);
        }
        assert!(matches!(
            WindowType::from_index(7),
            Err(EngineError::UnknownWindowType(7))
        ));
    }

    proptest! {
        #[test]
        fn prop_no_window_is_identity(signal in prop::collection::vec(-1e6f64..1e6, 2..512)) {
            let window = generate_window(WindowType::None, signal.len());
            let mut windowed = signal.clone();
            apply_window_inplace(&mut windowed, &window);
            prop_assert_eq!(windowed, signal);
        }

        #[test]
        fn prop_hann_symmetric_with_zero_ends(n in 2usize..2048) {
            let hann = generate_window(WindowType::Hann, n);
            prop_assert_eq!(hann.len(), n);
            prop_assert!(hann[0].abs() < 1e-12);
            prop_assert!(hann[n - 1].abs() < 1e-12);
            for i in 0..n {
                prop_assert!((hann[i] - hann[n - 1 - i]).abs() < 1e-12);
            }
        }
    }
}
