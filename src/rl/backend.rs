//! Backend type aliases and device management
//!
//! - **TrainingBackend**: autodiff-enabled NdArray backend (CPU), used by the
//!   online and target Q-networks. `valid()` hands back its inner NdArray
//!   backend for gradient-free forward passes.
//!
//! The Q-network is a small MLP over 11 features, so the CPU backend is all
//! the agent needs.

use burn::backend::{
    Autodiff,
    ndarray::{NdArray, NdArrayDevice},
};

/// Backend type for training (with autodiff)
pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Get the default device for computation (CPU)
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}
