//! Model architecture built with Burn.

pub mod cnn;

pub use cnn::{LeNet, LeNetConfig};
