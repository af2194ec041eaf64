//! Asset loader listing command.

use cadenza_registry::AssetLoaderRegistry;
use clap::Args;

#[derive(Args)]
pub struct LoadersArgs {
    /// Print one capability tag per line
    #[arg(long)]
    tags: bool,
}

pub fn run(args: &LoadersArgs) -> anyhow::Result<()> {
    let registry = AssetLoaderRegistry::new();

    if args.tags {
        for descriptor in registry.all_loaders() {
            println!("{}", descriptor.tag);
        }
        return Ok(());
    }

    println!("Available Asset Loaders");
    println!("=======================");
    println!();
    for descriptor in registry.all_loaders() {
        println!(
            "  {:8} {:6} - {}",
            descriptor.tag,
            descriptor.track.name(),
            descriptor.description
        );
        println!("           params: {}", descriptor.params.join(", "));
    }
    Ok(())
}
