//! Processor listing command.

use cadenza_registry::{ProcessorCategory, ProcessorRegistry};
use clap::Args;

const CATEGORIES: [ProcessorCategory; 4] = [
    ProcessorCategory::Level,
    ProcessorCategory::Format,
    ProcessorCategory::Channels,
    ProcessorCategory::Rate,
];

#[derive(Args)]
pub struct ProcessorsArgs {
    /// Show details for a specific processor
    #[arg(value_name = "PROCESSOR")]
    processor: Option<String>,
}

pub fn run(args: &ProcessorsArgs) -> anyhow::Result<()> {
    let registry = ProcessorRegistry::new();

    if let Some(id) = &args.processor {
        let descriptor = registry
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("Unknown processor: {id}"))?;

        println!("{}", descriptor.name);
        println!("{}", "=".repeat(descriptor.name.len()));
        println!();
        println!("{}", descriptor.description);
        println!();
        println!("Id:       {}", descriptor.id);
        println!("Category: {}", descriptor.category.name());
        if descriptor.params.is_empty() {
            println!("Params:   (none)");
        } else {
            println!("Params:   {}", descriptor.params.join(", "));
        }
        println!();
        println!("In an export configuration:");
        println!();
        println!("  [[processors]]");
        println!("  type = \"{}\"", descriptor.id);
        return Ok(());
    }

    println!("Available Processors");
    println!("====================");

    for category in CATEGORIES {
        let processors = registry.in_category(category);
        if processors.is_empty() {
            continue;
        }
        println!();
        println!("{} - {}", category.name(), category.description());
        for descriptor in processors {
            println!("  {:12} - {}", descriptor.id, descriptor.description);
        }
    }

    println!();
    println!("Use 'cadenza processors <id>' for parameter details.");
    println!("Prefix a type with '!' in a configuration to bypass it.");
    Ok(())
}
