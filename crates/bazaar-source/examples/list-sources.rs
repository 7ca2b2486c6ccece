//! Example: Load and display source definitions from the source-definitions directory.

use bazaar_source::{AccessMethod, SourceLoader, SourceRegistry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading source definitions from source-definitions/...\n");

    let loader = match SourceLoader::with_default_dir() {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("\nMake sure you're running this from the workspace root!");
            return Err(Box::new(e));
        }
    };

    let registry = SourceRegistry::load_from(&loader)?;

    println!("Loaded {} source definitions:\n", registry.count());

    for descriptor in registry.list() {
        println!("  {} ({})", descriptor.display_name(), descriptor.id());
        println!("    Category: {}", descriptor.category().display_name());
        println!("    Capability: {}", descriptor.capability());
        println!(
            "    Rate limit: {}/s",
            descriptor.rate_limit().max_per_second
        );

        match &descriptor.access {
            AccessMethod::Api {
                adapter,
                credentials,
                ..
            } => {
                println!("    Adapter: {adapter:?}");
                println!("    Credentials: {:?}", credentials.fields());
            }
            AccessMethod::PublicSearch {
                template, format, ..
            } => {
                println!("    Template: {template}");
                println!("    Format: {format:?}");
            }
            AccessMethod::Unavailable { reason, .. } => {
                println!("    Not automatable: {reason}");
            }
        }

        println!();
    }

    Ok(())
}
