use anyhow::Result;
use clap::Parser;
use sipbridge::config::{AccountConfig, Config};
use sipbridge::engine::CallState;
use sipbridge::fixtures::SimulatedEngine;
use sipbridge::VoipBridgeBuilder;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tracing::{info, level_filters::LevelFilter};

#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[clap(long, default_value = "sipbridge.toml")]
    conf: String,
}

/// Smoke binary: runs the bridge over the simulated engine, registers, drives
/// a scripted inbound call and prints events as JSON lines.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if Path::new(&cli.conf).exists() {
        Config::load(&cli.conf)?
    } else {
        Config::default()
    };

    let mut log_fmt = tracing_subscriber::fmt();
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }

    let _guard = if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        log_fmt.with_writer(non_blocking).try_init().ok();
        Some(guard)
    } else {
        log_fmt.try_init().ok();
        None
    };

    let engine = SimulatedEngine::new();
    let bridge = Arc::new(VoipBridgeBuilder::new(engine.clone()).build());
    bridge.init()?;
    let mut events = bridge.subscribe();

    let account = config.account.clone().unwrap_or_else(|| AccountConfig {
        username: "alice".to_string(),
        password: "secret".to_string(),
        domain: "example.com".to_string(),
        proxy: None,
    });
    info!(username = %account.username, domain = %account.domain, "registering");
    bridge.register(
        &account.username,
        &account.password,
        &account.domain,
        account.proxy.as_deref(),
    )?;
    engine.complete_registration(200, "OK");

    {
        let engine = engine.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let call = engine.push_incoming_call();
            tokio::time::sleep(Duration::from_millis(200)).await;
            engine.set_call_state(call, CallState::Confirmed, 200, "OK");
            engine.set_media_active(call, true);
            tokio::time::sleep(Duration::from_secs(1)).await;
            engine.set_call_state(call, CallState::Disconnected, 200, "Normal call clearing");
        });
    }

    let token = bridge.token().clone();
    loop {
        select! {
            _ = token.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("received CTRL+C, shutting down");
                bridge.stop();
                break;
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(_) => break,
            }
        }
    }
    Ok(())
}
