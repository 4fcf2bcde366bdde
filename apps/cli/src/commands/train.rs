//! Training command implementation.

use anyhow::{Context, Result};
use memlearn_training::TrainConfig;

pub fn execute(config: &TrainConfig) -> Result<()> {
    println!("GPU: {}", config.gpu);
    println!("# Minibatch-size: {}", config.batch_size);
    println!("# epoch: {}", config.epochs);
    println!();

    let outcome = memlearn_training::run(config).context("Training failed")?;
    let manifest = &outcome.manifest;

    println!();
    println!("{:<12} {}", "Run:", manifest.run_id);
    println!("{:<12} {} ({} params)", "Model:", manifest.model.kind, manifest.model.num_params);
    println!("{:<12} {} (iteration {})", "Epoch:", manifest.metrics.epoch, manifest.metrics.iteration);
    if let Some(accuracy) = manifest.metrics.validation_accuracy {
        println!("{:<12} {:.4}", "Val. acc.:", accuracy);
    }
    println!("{:<12} {}", "Output:", config.out.display());
    println!("{:<12} {}", "Snapshots:", outcome.snapshots.len());
    Ok(())
}
