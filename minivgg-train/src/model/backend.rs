//! Burn backend selection
//!
//! Training runs on the CPU `ndarray` backend wrapped in `Autodiff`;
//! inference and persistence use the plain backend.
//!
//! The backend RNG behind weight init and dropout is process-wide, so a
//! seeded run only reproduces while it holds [`rng_guard`].

use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;
use std::sync::{Mutex, MutexGuard, PoisonError};

static RNG_LOCK: Mutex<()> = Mutex::new(());

/// Backend for inference and saved artifacts
pub type InferenceBackend = NdArray;

/// Autodiff backend used while fitting
pub type TrainingBackend = Autodiff<InferenceBackend>;

pub fn default_device() -> <InferenceBackend as Backend>::Device {
    Default::default()
}

/// Exclusive use of the backend RNG until the guard drops
pub fn rng_guard() -> MutexGuard<'static, ()> {
    // A panicked holder leaves no state behind worth rejecting
    RNG_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Seed the backend RNG used for weight initialization and dropout masks
pub fn seed(seed: u64) {
    <TrainingBackend as Backend>::seed(seed);
}

pub fn backend_name() -> &'static str {
    "ndarray (CPU)"
}
