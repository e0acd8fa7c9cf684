use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::bind_socket;
use crate::core::{Error, NodeConfig, Result, UniverseAddress};
use crate::protocol::{ArtNetNode, OpCode};

/// Requests the owner can make of a running service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Replace the active levels (1 to 512 of them)
    SetLevels(Vec<u8>),
    /// Send the active levels as ArtDmx
    SendDmx(Ipv4Addr),
    /// Change the subnet/universe address
    SetUniverse(UniverseAddress),
    /// Release the merge lock
    CancelMerge,
    /// Stop the service loop
    Shutdown,
}

/// Snapshot of the node's levels published after each DMX update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmxFrame {
    /// Address the levels were received on
    pub universe: UniverseAddress,
    /// Sender holding the merge lock, if any
    pub source: Option<Ipv4Addr>,
    /// Active levels, slot 1 first
    pub levels: Vec<u8>,
}

/// Drives an [`ArtNetNode`] from a tokio UDP socket.
///
/// Polls are answered as they arrive and accepted levels are published to
/// every [`NodeHandle`] subscriber. The loop ends on a shutdown command or
/// once every handle has been dropped.
pub struct NodeService {
    node: ArtNetNode,
    socket: UdpSocket,
    remote_port: u16,
    command_rx: mpsc::Receiver<NodeCommand>,
    frame_tx: watch::Sender<DmxFrame>,
}

/// Handle for controlling a running service. Clone it for more owners.
#[derive(Clone)]
pub struct NodeHandle {
    command_tx: mpsc::Sender<NodeCommand>,
    frame_rx: watch::Receiver<DmxFrame>,
}

impl NodeHandle {
    /// Replaces the active levels
    pub async fn set_levels(&self, levels: Vec<u8>) -> Result<()> {
        self.send(NodeCommand::SetLevels(levels)).await
    }

    /// Sends the active levels to `destination`
    pub async fn send_dmx(&self, destination: Ipv4Addr) -> Result<()> {
        self.send(NodeCommand::SendDmx(destination)).await
    }

    /// Changes the subnet/universe address
    pub async fn set_universe(&self, universe: UniverseAddress) -> Result<()> {
        self.send(NodeCommand::SetUniverse(universe)).await
    }

    /// Releases the merge lock
    pub async fn cancel_merge(&self) -> Result<()> {
        self.send(NodeCommand::CancelMerge).await
    }

    /// Stops the service loop
    pub async fn shutdown(&self) -> Result<()> {
        self.send(NodeCommand::Shutdown).await
    }

    /// Receiver of level snapshots
    pub fn subscribe(&self) -> watch::Receiver<DmxFrame> {
        self.frame_rx.clone()
    }

    async fn send(&self, command: NodeCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| Error::network(format!("Failed to send command: {}", e)))
    }
}

impl NodeService {
    /// Creates the node, binds its socket and returns the service with
    /// its first handle
    pub async fn bind(config: NodeConfig) -> Result<(Self, NodeHandle)> {
        let node = ArtNetNode::from_config(&config)?;
        let socket = UdpSocket::from_std(bind_socket(config.bind_addr)?)
            .map_err(|e| Error::network(format!("Failed to bind socket: {}", e)))?;

        let (command_tx, command_rx) = mpsc::channel(32);
        let (frame_tx, frame_rx) = watch::channel(DmxFrame::default());

        let service = NodeService {
            node,
            socket,
            remote_port: config.remote_port,
            command_rx,
            frame_tx,
        };
        let handle = NodeHandle {
            command_tx,
            frame_rx,
        };
        Ok((service, handle))
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }

    /// The node being driven
    pub fn node(&self) -> &ArtNetNode {
        &self.node
    }

    /// Runs until a shutdown command arrives or all handles are dropped
    pub async fn run(&mut self) -> Result<()> {
        info!(
            addr = ?self.socket.local_addr().ok(),
            universe = %self.node.universe_address(),
            "art-net node running"
        );

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let running = match command {
                        Some(command) => self.handle_command(command).await,
                        None => false,
                    };
                    if !running {
                        info!("art-net node stopped");
                        return Ok(());
                    }
                }

                received = self.socket.recv_from(self.node.packet_buffer_mut()) => {
                    match received {
                        Ok((len, SocketAddr::V4(source))) => {
                            self.handle_datagram(len, *source.ip()).await;
                        }
                        Ok((_, source)) => trace!(%source, "ignoring datagram from IPv6 sender"),
                        Err(e) => warn!(error = %e, "receive failed"),
                    }
                }
            }
        }
    }

    async fn handle_datagram(&mut self, len: usize, source: Ipv4Addr) {
        match self.node.decode(len, source) {
            OpCode::Poll => {
                let destination = self.node.poll_reply_destination(source);
                let reply = self.node.encode_poll_reply();
                if let Err(e) = self.socket.send_to(reply, (destination, self.remote_port)).await {
                    warn!(%destination, error = %e, "poll reply failed");
                }
            }
            OpCode::Dmx => self.publish_frame(),
            _ => {}
        }
    }

    /// Returns false when the loop should stop
    async fn handle_command(&mut self, command: NodeCommand) -> bool {
        match command {
            NodeCommand::SetLevels(levels) => {
                if !self.node.set_levels(&levels) {
                    warn!(count = levels.len(), "level count out of range");
                }
            }
            NodeCommand::SendDmx(destination) => {
                let datagram = self.node.encode_dmx();
                if let Err(e) = self.socket.send_to(datagram, (destination, self.remote_port)).await {
                    warn!(%destination, error = %e, "dmx send failed");
                }
            }
            NodeCommand::SetUniverse(universe) => {
                self.node.set_subnet_universe(universe.subnet(), universe.universe());
            }
            NodeCommand::CancelMerge => self.node.cancel_merge(),
            NodeCommand::Shutdown => return false,
        }
        true
    }

    fn publish_frame(&self) {
        let universe = self.node.universe_address();
        let source = self.node.merge_lock().sender();
        let levels = self.node.dmx_data();

        let changed = self.frame_tx.send_if_modified(|frame| {
            if frame.universe == universe && frame.source == source && frame.levels == levels {
                return false;
            }
            frame.universe = universe;
            frame.source = source;
            frame.levels = levels.to_vec();
            true
        });
        if changed {
            debug!(slots = levels.len(), "levels published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinHandle;
    use tokio::time::{timeout, Duration};

    async fn start(peer: &UdpSocket) -> (NodeHandle, SocketAddr, JoinHandle<Result<()>>) {
        let config = NodeConfig {
            address: Ipv4Addr::LOCALHOST,
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            remote_port: peer.local_addr().unwrap().port(),
            ..Default::default()
        };
        let (mut service, handle) = NodeService::bind(config).await.unwrap();
        let addr = service.local_addr().unwrap();
        let task = tokio::spawn(async move { service.run().await });
        (handle, addr, task)
    }

    async fn peer() -> UdpSocket {
        UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap()
    }

    #[tokio::test]
    async fn test_publishes_received_levels() {
        let peer = peer().await;
        let (handle, addr, task) = start(&peer).await;
        let mut frames = handle.subscribe();

        let mut datagram = b"Art-Net\0".to_vec();
        datagram.extend_from_slice(&[0x00, 0x50, 0, 14, 1, 0, 0, 0, 0, 4, 11, 22, 33, 44]);
        peer.send_to(&datagram, addr).await.unwrap();

        timeout(Duration::from_secs(2), frames.changed())
            .await
            .expect("no frame published")
            .unwrap();
        let frame = frames.borrow().clone();
        assert_eq!(frame.levels, vec![11, 22, 33, 44]);
        assert_eq!(frame.source, Some(Ipv4Addr::LOCALHOST));

        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_answers_poll() {
        let peer = peer().await;
        let (handle, addr, task) = start(&peer).await;

        let mut poll = b"Art-Net\0".to_vec();
        poll.extend_from_slice(&[0x00, 0x20, 0, 14, 0, 0]);
        peer.send_to(&poll, addr).await.unwrap();

        let mut buf = [0u8; 600];
        let (len, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .expect("no poll reply")
            .unwrap();
        assert_eq!(len, 239);
        assert_eq!(&buf[8..10], &[0x00, 0x21]);
        assert_eq!(&buf[10..14], &[127, 0, 0, 1]);

        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_sends_dmx() {
        let peer = peer().await;
        let (handle, _addr, task) = start(&peer).await;

        handle.set_universe(UniverseAddress::new(0, 3)).await.unwrap();
        handle.set_levels(vec![5, 6, 7, 8]).await.unwrap();
        handle.send_dmx(Ipv4Addr::LOCALHOST).await.unwrap();

        let mut buf = [0u8; 600];
        let (len, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .expect("no dmx sent")
            .unwrap();
        assert_eq!(len, 22);
        assert_eq!(buf[12], 1);
        assert_eq!(buf[14], 3);
        assert_eq!(&buf[18..22], &[5, 6, 7, 8]);

        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_handles_dropped() {
        let peer = peer().await;
        let (handle, _addr, task) = start(&peer).await;

        let second = handle.clone();
        drop(handle);
        second.cancel_merge().await.unwrap();
        drop(second);

        timeout(Duration::from_secs(2), task)
            .await
            .expect("service kept running without handles")
            .unwrap()
            .unwrap();
    }
}
