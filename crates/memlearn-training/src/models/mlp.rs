use super::{Classifier, LayerNode};
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct MlpConfig {
    pub input_width: usize,
    pub hidden: usize,
    pub num_classes: usize,
}

impl MlpConfig {
    #[must_use]
    pub fn new(input_width: usize, num_classes: usize) -> Self {
        Self { input_width, hidden: 100, num_classes }
    }
}

/// Two hidden layers of fully connected units.
#[derive(Debug, Module)]
pub struct Mlp<B: Backend> {
    l1: Linear<B>,
    l2: Linear<B>,
    l3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Mlp<B> {
    pub fn new(cfg: &MlpConfig, device: &B::Device) -> Self {
        Self {
            l1: LinearConfig::new(cfg.input_width, cfg.hidden).init(device),
            l2: LinearConfig::new(cfg.hidden, cfg.hidden).init(device),
            l3: LinearConfig::new(cfg.hidden, cfg.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Classifier<B> for Mlp<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let x: Tensor<B, 2> = input.flatten(1, 2);
        let x = self.activation.forward(self.l1.forward(x));
        let x = self.activation.forward(self.l2.forward(x));
        self.l3.forward(x)
    }

    fn graph(&self) -> Vec<LayerNode> {
        [&self.l1, &self.l2, &self.l3]
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                let [d_in, d_out] = layer.weight.dims();
                let linear = LayerNode::new(format!("l{}", i + 1), format!("Linear {d_in} -> {d_out}"));
                if i < 2 { vec![linear, LayerNode::new(format!("l{}_relu", i + 1), "ReLU")] } else { vec![linear] }
            })
            .collect()
    }
}
