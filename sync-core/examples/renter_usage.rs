use siasync_core::api::{RenterClientBuilder, DEFAULT_ADDRESS};
use siasync_core::{RemotePath, RemoteStore};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Sia Renter Client Usage");
    println!("=======================");

    let address = std::env::var("SIA_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
    let password = std::env::var("SIA_API_PASSWORD").unwrap_or_default();

    let client = RenterClientBuilder::new(address)
        .password(password)
        .timeout(Duration::from_secs(30))
        .read_retry_window(Duration::from_secs(5))
        .build()?;
    println!("✓ Created renter client for {}", client.base_url());

    match client.daemon_version().await {
        Ok(version) => println!("✓ Connected to Sia {}", version.version),
        Err(e) => {
            println!("✗ Could not reach the renter: {}", e);
            return Ok(());
        }
    }

    let prefix = RemotePath::new("siasync")?;
    match client.list(&prefix).await {
        Ok(objects) => {
            println!("✓ {} files under '{}'", objects.len(), prefix);
            for object in objects.iter().take(10) {
                println!("  {} ({} bytes)", object.path, object.size);
            }
        }
        Err(e) if e.is_prefix_not_found() => println!("✓ '{}' has not been used yet", prefix),
        Err(e) => println!("✗ Listing failed: {}", e),
    }

    Ok(())
}
