use anyhow::Result;
use serde::Serialize;

use triage_core::registry::default_registry;

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub dsls: Vec<String>,
    pub default_timeout_secs: u64,
    pub description: String,
}

/// List the analyzers this binary knows how to drive.
pub fn list_tools_command(json: bool) -> Result<()> {
    let registry = default_registry();
    let entries: Vec<ToolInfo> = registry
        .descriptors()
        .into_iter()
        .map(|descriptor| {
            let description = match descriptor.id.as_str() {
                "circomspect" => {
                    "Static analyzer for Circom; reports located diagnostics per template"
                        .to_string()
                }
                "picus" => {
                    "SMT-based under-constraint prover (requires run-picus or ZK_TRIAGE_PICUS_BIN)"
                        .to_string()
                }
                "zkfuzz" => "Mutation fuzzer for Circom witness generators".to_string(),
                other => format!("Tool '{}'", other),
            };
            ToolInfo {
                name: descriptor.id.clone(),
                dsls: descriptor.dsls.iter().map(|d| d.to_string()).collect(),
                default_timeout_secs: descriptor.default_timeout_secs,
                description,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Tools: (none)");
        return Ok(());
    }

    println!("Tools:");
    for entry in entries {
        println!(
            "- {} [{}] (timeout {}s): {}",
            entry.name,
            entry.dsls.join(", "),
            entry.default_timeout_secs,
            entry.description
        );
    }

    Ok(())
}
