use anyhow::Result;

/// Print the registered providers and their API key variables.
pub fn run() -> Result<()> {
    let registry = murmur_core::registry();
    for name in registry.list() {
        if let Some(backend) = registry.get(name) {
            println!(
                "{name:<10} {} (key: {})",
                backend.display_name(),
                backend.api_key_env()
            );
        }
    }
    Ok(())
}
