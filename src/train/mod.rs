//! Training module for CRF models
//!
//! This module contains the forward-backward engine and the gradient
//! trainer that estimates feature weights from labeled sequences.

mod forward_backward;
mod trainer;

pub use self::forward_backward::{
    observed_counts_into, ForwardBackward, LogLinear, Potential, STABILITY_OFFSET,
};
pub use self::trainer::Trainer;
