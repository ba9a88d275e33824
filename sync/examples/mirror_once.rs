//! Mirror a directory into an in-memory store, then show what a second pass does

use siasync_core::{MemoryStore, RemoteStore};
use siasync_engine::{mirror_once, FilterOptions, SyncOptions, TracingSink};
use std::error::Error;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    println!("Mirror Once Example");
    println!("===================");

    let temp_dir = tempfile::TempDir::new()?;
    let root = temp_dir.path();
    tokio::fs::write(root.join("notes.txt"), b"meeting notes").await?;
    tokio::fs::write(root.join("scratch.tmp"), b"ignore me").await?;
    tokio::fs::create_dir(root.join("photos")).await?;
    tokio::fs::write(root.join("photos").join("cat.jpg"), b"not really a jpeg").await?;

    let options = SyncOptions {
        filter: FilterOptions::from_comma_lists("", "tmp"),
        ..Default::default()
    };

    let store = Arc::new(MemoryStore::new());
    let remote: Arc<dyn RemoteStore> = store.clone();

    let first = mirror_once(root, options.clone(), remote.clone(), Arc::new(TracingSink)).await?;
    println!(
        "First pass:  {} uploaded, {} removed, {} skipped",
        first.uploaded, first.removed, first.skipped
    );

    let second = mirror_once(root, options, remote, Arc::new(TracingSink)).await?;
    println!(
        "Second pass: {} uploaded, {} removed, {} skipped",
        second.uploaded, second.removed, second.skipped
    );

    println!();
    println!("Remote contents:");
    for path in store.paths() {
        println!("  {}", path);
    }

    Ok(())
}
