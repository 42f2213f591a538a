//! Viewer side in a few lines: follows one application's streams.
//!
//! `cargo run --example tail_app -- sampler fancy-stream...`

use log0::{StartPosition, TailConfig, default_root_dir, watch_app};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let app = args.next().unwrap_or_else(|| "sampler".to_string());
    let directives: Vec<String> = args.collect();

    let config = TailConfig {
        start: StartPosition::Beginning,
        ..TailConfig::default()
    };
    let mut tail = watch_app(default_root_dir(), &app, &directives, config).await?;

    println!("Following {app} ...");

    let mut count = 0;
    while let Some(chunk) = tail.next().await {
        match chunk {
            Ok(chunk) => print!("{}", chunk.text),
            Err(e) => eprintln!("Error: {e}"),
        }

        count += 1;
        if count >= 50 {
            // only show the first few chunks for the demo
            break;
        }
    }
    println!();

    Ok(())
}
