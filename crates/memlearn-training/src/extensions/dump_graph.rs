use crate::error::TrainingResult;
use crate::models::LayerNode;
use crate::trainer::{Extension, TrainContext, Trigger};
use crate::updater::MAIN_LOSS;
use std::fmt::Write as _;

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render a layer chain as a DOT digraph from the input node to the loss node.
#[must_use]
pub fn render_dot(nodes: &[LayerNode], input_width: usize, loss: &str) -> String {
    let mut out = String::from("digraph model {\n    rankdir=TB;\n");
    let _ = writeln!(out, "    n0 [shape=octagon, label=\"input\\n[batch, 1, {input_width}]\"];");
    for (i, node) in nodes.iter().enumerate() {
        let _ = writeln!(
            out,
            "    n{} [shape=box, label=\"{}\\n{}\"];",
            i + 1,
            escape(&node.name),
            escape(&node.detail)
        );
    }
    let loss_id = nodes.len() + 1;
    let _ = writeln!(out, "    n{loss_id} [shape=octagon, label=\"{}\"];", escape(loss));
    for i in 0..loss_id {
        let _ = writeln!(out, "    n{i} -> n{};", i + 1);
    }
    out.push_str("}\n");
    out
}

/// Writes the model graph once, on the first triggered iteration.
pub struct DumpGraph {
    loss: String,
    written: bool,
}

impl DumpGraph {
    #[must_use]
    pub fn new(loss: impl Into<String>) -> Self {
        Self { loss: loss.into(), written: false }
    }
}

impl Default for DumpGraph {
    fn default() -> Self {
        Self::new(MAIN_LOSS)
    }
}

impl Extension for DumpGraph {
    fn name(&self) -> &str {
        "dump_graph"
    }

    fn trigger(&self) -> Trigger {
        Trigger::iterations(1)
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        if self.written {
            return Ok(());
        }
        let dot = render_dot(&ctx.updater.graph(), ctx.updater.signature().input_width, &self.loss);
        let path = ctx.layout.graph_path();
        std::fs::write(&path, dot)?;
        self.written = true;
        tracing::debug!(path = %path.display(), "wrote computational graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dot_chains_nodes_to_loss() {
        let nodes = vec![LayerNode::new("l1", "Linear 4 -> 2"), LayerNode::new("relu", "ReLU")];
        let dot = render_dot(&nodes, 4, "main/loss");

        assert!(dot.starts_with("digraph model {"));
        assert!(dot.contains("n0 [shape=octagon, label=\"input\\n[batch, 1, 4]\"]"));
        assert!(dot.contains("n1 [shape=box, label=\"l1\\nLinear 4 -> 2\"]"));
        assert!(dot.contains("n3 [shape=octagon, label=\"main/loss\"]"));
        assert!(dot.contains("n2 -> n3;"));
        assert_eq!(dot.matches("->").count(), 4);
    }

    #[test]
    fn test_render_dot_escapes_quotes() {
        let nodes = vec![LayerNode::new("a\"b", "")];
        assert!(render_dot(&nodes, 1, "loss").contains("a\\\"b"));
    }
}
