//! Topology validation command.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use tributary_config::{MixGroupConfig, PipelineConfig};
use tributary_effects::EffectRegistry;

#[derive(Args)]
pub struct ValidateArgs {
    /// Topology file (TOML)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::load(&args.config)?;
    let errors = config.validation_errors(&EffectRegistry::new());
    tracing::info!(
        path = %args.config.display(),
        groups = config.groups.len(),
        problems = errors.len(),
        "validated topology"
    );

    if args.json {
        let report = json!({
            "valid": errors.is_empty(),
            "root": config.root,
            "block_size_frames": config.block_size_frames,
            "groups": config.groups.iter().map(group_json).collect::<Vec<_>>(),
            "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if errors.is_empty() {
        println!("{}: ok", args.config.display());
        println!();
        print_tree(&config, &config.root, 0);
    } else {
        println!("{}: {} problem(s)", args.config.display(), errors.len());
        for error in &errors {
            println!("  - {error}");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} is not a valid topology", args.config.display())
    }
}

fn group_json(group: &MixGroupConfig) -> serde_json::Value {
    json!({
        "name": group.name,
        "usages": group.usages.iter().map(|u| u.as_str()).collect::<Vec<_>>(),
        "inputs": group.inputs,
        "effects": group
            .effects
            .iter()
            .map(|e| json!({ "type": e.effect_type, "instance": e.instance }))
            .collect::<Vec<_>>(),
        "loopback": group.loopback,
        "format": format!(
            "{} {}ch {}Hz",
            group.sample_format.as_str(),
            group.channels,
            group.frame_rate
        ),
    })
}

fn print_tree(config: &PipelineConfig, name: &str, depth: usize) {
    let Some(group) = config.group(name) else {
        return;
    };
    let usages: Vec<&str> = group.usages.iter().map(|u| u.as_str()).collect();
    let effects: Vec<&str> = group.effects.iter().map(|e| e.instance.as_str()).collect();
    println!(
        "{:indent$}{} [{} {}ch {}Hz]{}",
        "",
        group.name,
        group.sample_format.as_str(),
        group.channels,
        group.frame_rate,
        if group.loopback { " (loopback)" } else { "" },
        indent = depth * 2
    );
    if !usages.is_empty() {
        println!("{:indent$}  usages: {}", "", usages.join(", "), indent = depth * 2);
    }
    if !effects.is_empty() {
        println!("{:indent$}  effects: {}", "", effects.join(" -> "), indent = depth * 2);
    }
    for child in &group.inputs {
        print_tree(config, child, depth + 1);
    }
}
