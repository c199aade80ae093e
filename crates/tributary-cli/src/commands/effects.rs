//! Effect listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use tributary_effects::EffectRegistry;

#[derive(Args)]
pub struct EffectsArgs {
    /// Show details for a specific effect type
    #[arg(value_name = "EFFECT")]
    effect: Option<String>,
}

pub fn run(args: EffectsArgs) -> anyhow::Result<()> {
    let registry = EffectRegistry::new();

    if let Some(id) = &args.effect {
        let effect = registry
            .all_effects()
            .find(|e| e.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| anyhow::anyhow!("Unknown effect: {}", id))?;

        println!("{} ({})", effect.name, effect.id);
        println!("{}", "=".repeat(effect.name.len() + effect.id.len() + 3));
        println!();
        println!("{}", effect.description);
        println!();
        println!("Configuration: {}", effect.config_hint);
        println!();
        println!("Example topology entry:");
        println!();
        println!("  [[groups.effects]]");
        println!("  type = \"{}\"", effect.id);
        println!("  instance = \"my_{}\"", effect.id);
        println!("  config = \"\"");
        return Ok(());
    }

    println!("Available Effects");
    println!("=================");
    println!();
    println!("  {:12}  {:40}  {}", "Type", "Description", "Configuration");
    println!("  {:12}  {:40}  {}", "----", "-----------", "-------------");
    for effect in registry.all_effects() {
        println!(
            "  {:12}  {:40}  {}",
            effect.id, effect.description, effect.config_hint
        );
    }
    println!();
    println!("Use 'tributary effects <type>' for details.");
    Ok(())
}
