//! Console harness for poking at the plugin without a chat network.
//!
//! Reads lines from stdin as channel traffic for a fake `#dev` channel.
//! Lines starting with `!tracker` are explicit subcommand invocations;
//! everything else goes through passive ticket matching.
//!
//! Usage: `cargo run --example console_bot -- corvid.toml [nick]`

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use corvid_plugin::{
    load_plugin_config, ChatTransport, EventOutcome, TrackerPlugin, TriggerEvent,
    TriggerInvocation,
};
use corvid_store::DocStore;

struct ConsoleTransport;

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_message(&self, target: &str, text: &str) -> anyhow::Result<()> {
        for line in text.lines() {
            println!("-> {target}: {line}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("corvid_plugin=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(
        args.next()
            .unwrap_or_else(|| "corvid.toml".to_string()),
    );
    let nick = args.next().unwrap_or_else(|| "console".to_string());

    let config = load_plugin_config(&config_path)?;
    let store = DocStore::open(config_path.with_file_name("corvid-state.json"))?;
    let plugin = TrackerPlugin::new(config, store, Arc::new(ConsoleTransport))?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let invocation = match line.strip_prefix("!tracker") {
            Some(rest) => {
                let mut words = rest.split_whitespace().map(str::to_string);
                TriggerInvocation::Command {
                    subcommand: words.next(),
                    args: words.collect(),
                }
            }
            None => TriggerInvocation::Passive,
        };
        let outcome = plugin
            .handle_event(TriggerEvent {
                channel: "#dev".to_string(),
                nick: nick.clone(),
                message: line,
                invocation,
            })
            .await?;
        // Wait deferred replies out so the prompt ordering stays sane.
        if let EventOutcome::Deferred(handle) = outcome {
            if let Err(error) = handle.await? {
                eprintln!("!! unhandled failure: {error}");
            }
        }
    }
    Ok(())
}
