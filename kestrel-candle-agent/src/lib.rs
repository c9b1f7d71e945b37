//! Q-networks implemented with [candle](https://crates.io/crates/candle-core).
//!
//! [`QNet`] implements [`QFunction`](kestrel_core::QFunction) with a multilayer
//! perceptron over the flattened, `[0, 1]`-scaled frame stack.
pub mod mlp;
pub mod opt;
mod qnet;
pub mod util;
use anyhow::Result;
pub use qnet::{QNet, QNetConfig};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = anyhow::Error;

    fn try_from(device: Device) -> Result<Self> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}
