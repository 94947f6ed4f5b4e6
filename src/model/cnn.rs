//! LeNet5-style CNN architecture.
//!
//! A fixed feed-forward stack parameterized only by input shape and output
//! class count: two convolution/pool stages followed by three fully
//! connected layers. `forward` produces logits; the softmax normalization
//! lives in `forward_softmax` so the loss functions can work on logits.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::error::Error;

/// Configuration for the LeNet classifier
#[derive(Config, Debug)]
pub struct LeNetConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "28")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB, 1 for grayscale)
    #[config(default = "3")]
    pub in_channels: usize,
}

impl LeNetConfig {
    /// Flattened feature count after the conv/pool stack.
    ///
    /// Both convolutions are 5x5 without padding, both pools halve the side
    /// length. Inputs too small to survive the stack are a configuration
    /// error, reported before any tensor is allocated.
    pub fn feature_size(&self) -> crate::error::Result<usize> {
        let side = self
            .input_size
            .checked_sub(4)
            .map(|s| s / 2)
            .and_then(|s| s.checked_sub(4))
            .map(|s| s / 2)
            .unwrap_or(0);

        if side == 0 {
            return Err(Error::Config(format!(
                "input size {} is too small for the conv/pool stack (minimum 16)",
                self.input_size
            )));
        }

        Ok(16 * side * side)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.num_classes < 2 {
            return Err(Error::Config(format!(
                "need at least 2 classes, got {}",
                self.num_classes
            )));
        }
        if self.in_channels != 1 && self.in_channels != 3 {
            return Err(Error::Config(format!(
                "channel depth must be 1 or 3, got {}",
                self.in_channels
            )));
        }
        self.feature_size().map(|_| ())
    }
}

/// LeNet5-style classifier
///
/// conv(6, 5x5) -> ReLU -> maxpool(2x2) -> conv(16, 5x5) -> ReLU ->
/// maxpool(2x2) -> flatten -> fc(120) -> ReLU -> fc(84) -> ReLU ->
/// fc(num_classes)
#[derive(Module, Debug)]
pub struct LeNet<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    activation: Relu,

    num_classes: usize,
}

impl<B: Backend> LeNet<B> {
    /// Create a new model from configuration with freshly initialized weights.
    pub fn new(config: &LeNetConfig, device: &B::Device) -> crate::error::Result<Self> {
        config.validate()?;
        let feature_size = config.feature_size()?;

        let conv1 = Conv2dConfig::new([config.in_channels, 6], [5, 5]).init(device);
        let pool1 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let conv2 = Conv2dConfig::new([6, 16], [5, 5]).init(device);
        let pool2 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        let fc1 = LinearConfig::new(feature_size, 120).init(device);
        let fc2 = LinearConfig::new(120, 84).init(device);
        let fc3 = LinearConfig::new(84, config.num_classes).init(device);

        Ok(Self {
            conv1,
            pool1,
            conv2,
            pool2,
            fc1,
            fc2,
            fc3,
            activation: Relu::new(),
            num_classes: config.num_classes,
        })
    }

    /// Forward pass producing logits of shape `[batch_size, num_classes]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);
        self.fc3.forward(x)
    }

    /// Forward pass normalized into a probability distribution over classes.
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, DefaultBackend};

    #[test]
    fn test_feature_size() {
        // 28 -> 24 -> 12 -> 8 -> 4; 16 * 4 * 4
        let config = LeNetConfig::new(3);
        assert_eq!(config.feature_size().unwrap(), 256);
    }

    #[test]
    fn test_rejects_too_small_input() {
        let config = LeNetConfig::new(3).with_input_size(12);
        assert!(config.feature_size().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_single_class() {
        let config = LeNetConfig::new(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_shape() {
        let device = default_device();
        let config = LeNetConfig::new(5);
        let model = LeNet::<DefaultBackend>::new(&config, &device).unwrap();

        let input = Tensor::<DefaultBackend, 4>::zeros([2, 3, 28, 28], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 5]);
    }

    #[test]
    fn test_softmax_output_is_distribution() {
        let device = default_device();
        let config = LeNetConfig::new(4).with_in_channels(1).with_input_size(20);
        let model = LeNet::<DefaultBackend>::new(&config, &device).unwrap();

        let input = Tensor::<DefaultBackend, 4>::zeros([1, 1, 20, 20], &device);
        let probs = model.forward_softmax(input);
        let values = probs.into_data().to_vec::<f32>().unwrap();

        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(values.iter().all(|&p| p >= 0.0));
    }
}
