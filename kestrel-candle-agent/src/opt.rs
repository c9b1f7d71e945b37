//! Optimizers.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::{
    adam::{Adam, ParamsAdam},
    rmsprop::{ParamsRMSprop, RMSprop},
};
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer of a Q-network.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// AdamW optimizer.
    AdamW {
        /// Learning rate.
        lr: f64,
        /// Decay of the first moment.
        #[serde(default = "default_beta1")]
        beta1: f64,
        /// Decay of the second moment.
        #[serde(default = "default_beta2")]
        beta2: f64,
        /// Term added to the denominator.
        #[serde(default = "default_eps")]
        eps: f64,
        /// Weight decay.
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },

    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },

    /// RMSProp, the optimizer of the Nature DQN.
    RmsProp {
        /// Learning rate.
        lr: f64,
        /// Smoothing constant of the squared-gradient average.
        alpha: f64,
        /// Term added to the denominator.
        eps: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs an optimizer over the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match *self {
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr,
                    beta1,
                    beta2,
                    eps,
                    weight_decay,
                };
                Ok(Optimizer::AdamW(AdamW::new(vars, params)?))
            }
            OptimizerConfig::Adam { lr } => {
                let params = ParamsAdam {
                    lr,
                    ..ParamsAdam::default()
                };
                Ok(Optimizer::Adam(Adam::new(vars, params)?))
            }
            OptimizerConfig::RmsProp { lr, alpha, eps } => {
                let params = ParamsRMSprop {
                    lr,
                    alpha,
                    eps,
                    ..ParamsRMSprop::default()
                };
                Ok(Optimizer::RmsProp(RMSprop::new(vars, params)?))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        match &mut self {
            Self::AdamW { lr, .. } | Self::Adam { lr } | Self::RmsProp { lr, .. } => *lr = v,
        }
        self
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 1e-4 }
    }
}

/// Optimizers.
pub enum Optimizer {
    /// AdamW optimizer.
    AdamW(AdamW),

    /// Adam optimizer.
    Adam(Adam),

    /// RMSProp optimizer.
    RmsProp(RMSprop),
}

impl Optimizer {
    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt) => Ok(opt.backward_step(loss)?),
            Self::Adam(opt) => Ok(opt.backward_step(loss)?),
            Self::RmsProp(opt) => Ok(opt.backward_step(loss)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_rate_override() {
        let c = OptimizerConfig::RmsProp {
            lr: 0.1,
            alpha: 0.95,
            eps: 0.01,
        }
        .learning_rate(2.5e-4);
        assert_eq!(
            c,
            OptimizerConfig::RmsProp {
                lr: 2.5e-4,
                alpha: 0.95,
                eps: 0.01
            }
        );
    }
}
