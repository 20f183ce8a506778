//! MiniVGGNet architecture
//!
//! ```text
//! INPUT => [CONV => RELU => BN] * 2 => POOL => DROPOUT
//!       => [CONV => RELU => BN] * 2 => POOL => DROPOUT
//!       => FC => RELU => DROPOUT => FC
//! ```
//! Convolutions are 3x3 with same padding; pools are 2x2 with stride 2.
//! The network returns logits; softmax is folded into the loss.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

#[derive(Config, Debug)]
pub struct MiniVggConfig {
    pub num_classes: usize,

    /// Square input side; must be divisible by 4
    #[config(default = "256")]
    pub input_size: usize,

    #[config(default = "3")]
    pub channels: usize,

    /// Filters in the first block; the second block uses twice as many
    #[config(default = "32")]
    pub base_filters: usize,

    #[config(default = "512")]
    pub dense_units: usize,

    #[config(default = "0.25")]
    pub conv_dropout: f64,

    #[config(default = "0.5")]
    pub dense_dropout: f64,
}

impl MiniVggConfig {
    /// Input width of the first dense layer
    pub fn flattened_features(&self) -> usize {
        let side = self.input_size / 4;
        self.base_filters * 2 * side * side
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> MiniVgg<B> {
        let block1 = ConvBlock::new(self.channels, self.base_filters, self.conv_dropout, device);
        let block2 = ConvBlock::new(
            self.base_filters,
            self.base_filters * 2,
            self.conv_dropout,
            device,
        );

        MiniVgg {
            block1,
            block2,
            fc1: LinearConfig::new(self.flattened_features(), self.dense_units).init(device),
            relu: Relu::new(),
            dropout: DropoutConfig::new(self.dense_dropout).init(),
            fc2: LinearConfig::new(self.dense_units, self.num_classes).init(device),
            num_classes: self.num_classes,
        }
    }
}

/// `[CONV => RELU => BN] * 2 => POOL => DROPOUT`
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    relu: Relu,
    pool: MaxPool2d,
    dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, dropout: f64, device: &B::Device) -> Self {
        let conv = |input: usize| -> Conv2d<B> {
            Conv2dConfig::new([input, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };

        Self {
            conv1: conv(in_channels),
            bn1: BatchNormConfig::new(out_channels).init(device),
            conv2: conv(out_channels),
            bn2: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.bn1.forward(self.relu.forward(self.conv1.forward(x)));
        let x = self.bn2.forward(self.relu.forward(self.conv2.forward(x)));
        self.dropout.forward(self.pool.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct MiniVgg<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    fc1: Linear<B>,
    relu: Relu,
    dropout: Dropout,
    fc2: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> MiniVgg<B> {
    /// `[batch, channels, size, size]` => logits `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block1.forward(x);
        let x = self.block2.forward(x);

        let [batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);

        let x = self.dropout.forward(self.relu.forward(self.fc1.forward(x)));
        self.fc2.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
