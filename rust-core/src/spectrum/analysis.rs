//! Derived representations of the complex spectrum
//!
//! Each function maps the N/2+1 complex bins to one real value per bin.

use num_complex::Complex;

/// Real part of each bin
pub fn real_part(spectrum: &[Complex<f64>]) -> Vec<f64> {
    spectrum.iter().map(|c| c.re).collect()
}

/// Imaginary part of each bin
pub fn imag_part(spectrum: &[Complex<f64>]) -> Vec<f64> {
    spectrum.iter().map(|c| c.im).collect()
}

/// Magnitude spectrum in dB: 20*log10(|X[k]|)
///
/// A bin of exactly zero magnitude yields negative infinity.
pub fn magnitude_db(spectrum: &[Complex<f64>]) -> Vec<f64> {
    spectrum.iter().map(|c| 20.0 * c.norm().log10()).collect()
}

/// Phase of each bin as atan(im/re), in (-π/2, π/2)
///
/// A bin with a zero real part yields ±π/2, or NaN when both parts are zero.
pub fn phase(spectrum: &[Complex<f64>]) -> Vec<f64> {
    spectrum.iter().map(|c| (c.im / c.re).atan()).collect()
}
