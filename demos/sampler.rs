//! Producer side: writes a handful of streams for a few seconds.
//!
//! Run `cargo run --example sampler -- 100`, then in other terminals
//! `log0 sampler`, `log0 sampler fancy-stream...` or `log0 sampler -tags important-info`.

use log0::{
    AppIdentity, Formatted, Formatter, RegistryConfig, StdoutConsole, StreamRegistry, Value, log0,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let iterations: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(100);

    let registry = StreamRegistry::new(
        Arc::new(AppIdentity::new()),
        RegistryConfig::default(),
        Arc::new(StdoutConsole),
    );

    // the root stream always goes to the console
    let console = registry.root();
    log0!(console, "Hello World!");

    // before the app has a name, named streams fall back to the console too
    let early = registry.resolve("startup")?;
    log0!(early, "no app id yet, so this is on the console");

    let app = registry.set_app("sampler")?;
    log0!(console, "to view the other streams, run `log0", app, "` in another terminal");
    if let Some(dir) = registry.app_dir() {
        log0!(console, "stream files live in", dir.display().to_string());
    }

    let important = registry.resolve("importantInfo")?;
    let another = registry.resolve("anotherStream")?;
    let fancy = registry.resolve("fancyStream")?;
    let sub1 = registry.resolve("fancyStream.substream1")?;
    let sub2 = registry.resolve("fancyStream.substream2")?;
    let subsub = registry.resolve("fancyStream.substream2.subsub2b")?;

    log0!(important, "this is need to know only");
    sub1.set_tracing(true);
    sub2.set_formatter(Formatter::args(|args| {
        let mut stamped = vec![Value::from(format!("{:?}", std::time::SystemTime::now()))];
        stamped.extend_from_slice(args);
        Formatted::Args(stamped)
    }));
    subsub.set_filter(|args| !args.is_empty());

    for remaining in (0..iterations).rev() {
        tokio::time::sleep(Duration::from_millis(100)).await;
        log0!(important, "hello again for the", remaining, "time!");
        log0!(another, "this is different for the", remaining, "time!");
        log0!(fancy, "this is different for the", remaining, "time!");
        sub1.emit_if(remaining % 2 == 0, log0::args!["even countdown", remaining]);
        log0!(sub2, "countdown", remaining);
        log0!(subsub, Value::object([("remaining", Value::from(remaining))]));
    }

    log0!(console, "done");
    registry.close();
    Ok(())
}
