use std::net::Ipv4Addr;

use lx_artnet::network::NodeService;
use lx_artnet::{NodeConfig, UniverseAddress};

/// Runs a node on the Art-Net port and logs every frame it accepts.
///
/// Usage: dmx_node <node address> [subnet mask] [subnet.universe]
#[tokio::main]
async fn main() -> lx_artnet::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let address: Ipv4Addr = args
        .next()
        .as_deref()
        .unwrap_or("2.0.0.10")
        .parse()
        .map_err(|e| lx_artnet::Error::config(format!("Invalid node address: {}", e)))?;
    let subnet_mask = args
        .next()
        .map(|mask| mask.parse::<Ipv4Addr>())
        .transpose()
        .map_err(|e| lx_artnet::Error::config(format!("Invalid subnet mask: {}", e)))?;
    let universe = match args.next() {
        Some(text) => parse_universe(&text)?,
        None => UniverseAddress::default(),
    };

    let config = NodeConfig {
        address,
        subnet_mask,
        universe: universe.as_byte(),
        ..Default::default()
    };

    let (mut service, handle) = NodeService::bind(config).await?;
    let mut frames = handle.subscribe();

    let node_task = tokio::spawn(async move { service.run().await });

    println!("Listening for Art-Net on universe {} (ctrl-c to stop)", universe);
    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                let preview: Vec<String> = frame.levels.iter().take(16).map(|l| l.to_string()).collect();
                println!(
                    "{} slots from {:?}: {} ...",
                    frame.levels.len(),
                    frame.source,
                    preview.join(" ")
                );
            }
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown().await?;
                break;
            }
        }
    }

    node_task
        .await
        .map_err(|e| lx_artnet::Error::network(format!("Node task failed: {}", e)))?
}

fn parse_universe(text: &str) -> lx_artnet::Result<UniverseAddress> {
    let invalid = || lx_artnet::Error::config(format!("Invalid universe '{}', expected subnet.universe", text));
    let (subnet, universe) = text.split_once('.').ok_or_else(invalid)?;
    let subnet: u8 = subnet.parse().map_err(|_| invalid())?;
    let universe: u8 = universe.parse().map_err(|_| invalid())?;
    if subnet > 15 || universe > 15 {
        return Err(invalid());
    }
    Ok(UniverseAddress::new(subnet, universe))
}
