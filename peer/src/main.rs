use clap::Parser;
use log::{debug, info, warn};
use peer::config::{Args, Mode, NodeConfig, Settings};
use peer::network::{Command, Node};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let settings = Settings::load(&args.settings).unwrap_or_else(|e| {
        warn!("Using default settings: {}", e);
        Settings::default()
    });

    let config = NodeConfig::from(&args);
    let (node, handle) = Node::new(config, settings, Some(args.settings.clone()));
    let mut node_handle = tokio::spawn(node.run());

    match args.mode {
        Mode::Solo => info!("Playing alone"),
        Mode::Host => handle.commands.send(Command::Host)?,
        Mode::Join => handle.commands.send(Command::Join(args.address.clone()))?,
    }
    info!("Commands: start stop pause resume left right straight thrust coast fire");
    info!("          host join <addr> leave sound music status quit");

    // Forward stdin lines as commands
    let commands = handle.commands.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
        if commands.send(Command::Quit).is_err() {
            debug!("Node already stopped when input ended");
        }
    });

    let mut notices = handle.notices;
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            println!("{:?}", notice);
        }
    });

    // Handle shutdown gracefully
    tokio::select! {
        result = &mut node_handle => {
            if let Err(e) = result {
                eprintln!("Node task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
            if handle.commands.send(Command::Quit).is_err() {
                debug!("Node already stopped");
            }
            if let Err(e) = node_handle.await {
                eprintln!("Node task panicked: {}", e);
            }
        }
    }

    Ok(())
}
