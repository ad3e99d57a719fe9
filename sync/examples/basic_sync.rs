//! Two in-process sessions mirroring a directory without a network

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let temp_dir = tempfile::TempDir::new()?;
    let ours = temp_dir.path().join("ours");
    let theirs = temp_dir.path().join("theirs");
    tokio::fs::create_dir_all(&ours).await?;
    tokio::fs::create_dir_all(&theirs).await?;

    // Each session queues outbound packets on its channel; normally a relay
    // client drains it, here we cross-wire the two sessions directly.
    let (tx_ours, mut rx_ours) = mpsc::unbounded_channel();
    let (tx_theirs, mut rx_theirs) = mpsc::unbounded_channel();
    let (session_ours, _events_ours) = sync::start_project(&ours, false, tx_ours).await?;
    let (session_theirs, _events_theirs) = sync::start_project(&theirs, false, tx_theirs).await?;

    println!("editing under {}", ours.display());
    tokio::fs::write(ours.join("notes.txt"), "hello\nfrom the engine\n").await?;

    // Pump both directions for a moment.
    for _ in 0..20 {
        while let Ok(packet) = rx_ours.try_recv() {
            session_theirs.interpret(packet).await;
        }
        while let Ok(packet) = rx_theirs.try_recv() {
            session_ours.interpret(packet).await;
        }
        sleep(Duration::from_millis(100)).await;
    }

    let replica = tokio::fs::read_to_string(theirs.join("notes.txt")).await?;
    println!("replica under {} now reads:", theirs.display());
    print!("{replica}");

    session_ours.close();
    session_theirs.close();
    Ok(())
}
