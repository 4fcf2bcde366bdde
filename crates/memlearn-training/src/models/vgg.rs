use super::{Classifier, LayerNode};
use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{AdaptiveAvgPool1d, AdaptiveAvgPool1dConfig, MaxPool1d, MaxPool1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d, Relu};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct Vgg1dConfig {
    pub num_classes: usize,
    /// Output channels of each conv block.
    pub channels: Vec<usize>,
    /// Sequence length after the adaptive pool.
    pub pooled_len: usize,
    pub hidden: usize,
    pub dropout: f64,
}

impl Vgg1dConfig {
    #[must_use]
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes, ..Default::default() }
    }
}

impl Default for Vgg1dConfig {
    fn default() -> Self {
        Self { num_classes: 2, channels: vec![16, 32, 64], pooled_len: 4, hidden: 128, dropout: 0.5 }
    }
}

#[derive(Debug, Module)]
pub struct VggBlock<B: Backend> {
    conv_a: Conv1d<B>,
    conv_b: Conv1d<B>,
    pool: MaxPool1d,
    activation: Relu,
    channels_out: usize,
}

impl<B: Backend> VggBlock<B> {
    fn new(channels_in: usize, channels_out: usize, device: &B::Device) -> Self {
        let conv = |c_in| {
            Conv1dConfig::new(c_in, channels_out, 3).with_padding(PaddingConfig1d::Explicit(1)).init(device)
        };
        Self {
            conv_a: conv(channels_in),
            conv_b: conv(channels_out),
            pool: MaxPool1dConfig::new(2).with_stride(2).init(),
            activation: Relu::new(),
            channels_out,
        }
    }

    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.activation.forward(self.conv_a.forward(input));
        let x = self.activation.forward(self.conv_b.forward(x));
        // Windows of a single slice can be shorter than the pool kernel.
        if x.dims()[2] >= 2 { self.pool.forward(x) } else { x }
    }
}

/// VGG-style 1-D convolutional classifier.
#[derive(Debug, Module)]
pub struct Vgg1d<B: Backend> {
    blocks: Vec<VggBlock<B>>,
    pool: AdaptiveAvgPool1d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    dropout: Dropout,
    activation: Relu,
    pooled_len: usize,
}

impl<B: Backend> Vgg1d<B> {
    pub fn new(cfg: &Vgg1dConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(cfg.channels.len());
        let mut channels_in = 1;
        for &channels_out in &cfg.channels {
            blocks.push(VggBlock::new(channels_in, channels_out, device));
            channels_in = channels_out;
        }

        Self {
            blocks,
            pool: AdaptiveAvgPool1dConfig::new(cfg.pooled_len).init(),
            fc1: LinearConfig::new(channels_in * cfg.pooled_len, cfg.hidden).init(device),
            fc2: LinearConfig::new(cfg.hidden, cfg.num_classes).init(device),
            dropout: DropoutConfig::new(cfg.dropout).init(),
            activation: Relu::new(),
            pooled_len: cfg.pooled_len,
        }
    }
}

impl<B: Backend> Classifier<B> for Vgg1d<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut x = input;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.pool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 2);
        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    fn graph(&self) -> Vec<LayerNode> {
        let mut nodes = Vec::new();
        for (i, block) in self.blocks.iter().enumerate() {
            let c = block.channels_out;
            nodes.push(LayerNode::new(format!("block{}_conv_a", i + 1), format!("Conv1d k=3 -> {c}")));
            nodes.push(LayerNode::new(format!("block{}_relu_a", i + 1), "ReLU"));
            nodes.push(LayerNode::new(format!("block{}_conv_b", i + 1), format!("Conv1d k=3 -> {c}")));
            nodes.push(LayerNode::new(format!("block{}_relu_b", i + 1), "ReLU"));
            nodes.push(LayerNode::new(format!("block{}_pool", i + 1), "MaxPool1d k=2 s=2"));
        }
        let [d_in, d_hidden] = self.fc1.weight.dims();
        let [_, d_out] = self.fc2.weight.dims();
        nodes.push(LayerNode::new("avg_pool", format!("AdaptiveAvgPool1d -> {}", self.pooled_len)));
        nodes.push(LayerNode::new("fc1", format!("Linear {d_in} -> {d_hidden}")));
        nodes.push(LayerNode::new("fc1_relu", "ReLU"));
        nodes.push(LayerNode::new("dropout", "Dropout"));
        nodes.push(LayerNode::new("fc2", format!("Linear {d_hidden} -> {d_out}")));
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_forward_shape_for_long_and_single_slice_windows() {
        let device = Default::default();
        let model = Vgg1d::<B>::new(&Vgg1dConfig::new(2), &device);

        let long = Tensor::<B, 3>::zeros([3, 1, 40], &device);
        assert_eq!(model.forward(long).dims(), [3, 2]);

        let short = Tensor::<B, 3>::zeros([2, 1, 3], &device);
        assert_eq!(model.forward(short).dims(), [2, 2]);
    }

    #[test]
    fn test_graph_ends_in_classifier_head() {
        let model = Vgg1d::<B>::new(&Vgg1dConfig::new(3), &Default::default());
        let graph = model.graph();
        assert_eq!(graph.len(), 3 * 5 + 5);
        let last = graph.last().unwrap();
        assert_eq!(last.name, "fc2");
        assert_eq!(last.detail, "Linear 128 -> 3");
    }
}
