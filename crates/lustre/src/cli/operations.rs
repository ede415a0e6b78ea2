//! The `lustre operations` command: list the registry in pipeline order.

use lustre_core::{Config, Lustre};

/// One row per registered operation.
fn rows(lustre: &Lustre) -> Vec<String> {
    lustre
        .operations()
        .iter()
        .map(|spec| {
            let enabled = lustre.plan().iter().any(|op| op.name == spec.name);
            format!(
                "  {:>2}  {} {:<24} {:<9} {}",
                spec.order,
                if enabled { '*' } else { ' ' },
                spec.name,
                spec.transform.kind(),
                spec.description
            )
        })
        .collect()
}

pub async fn execute(config: Config) -> anyhow::Result<()> {
    let lustre = Lustre::new(config);

    println!("Operations in pipeline order (* = enabled by current config):");
    println!();
    for row in rows(&lustre) {
        println!("{row}");
    }

    let status = lustre.inference_status().await;
    if !status.available {
        println!();
        println!(
            "Inference backend '{}' is unavailable: inference operations will be skipped.",
            status.backend
        );
    }
    Ok(())
}
