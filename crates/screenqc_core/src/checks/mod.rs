//! Concrete quality checks and their numeric helpers.

pub mod contrast;
pub mod plot;
pub mod power_spectrum;
pub mod saturation;
pub mod spectral;
pub mod stats;

pub use contrast::ContrastMeasure;
pub use power_spectrum::PowerSpectrum;
pub use saturation::SaturationCheck;
