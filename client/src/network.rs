use crate::input::{parse_command, Command, HELP};
use crate::rendering::{render, render_themes};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Packet, Snapshot, CLIENT_VERSION, HEARTBEAT_INTERVAL_MS, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::interval;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,

    /// Join sent automatically once the server accepts the connection
    auto_join: Option<Command>,
    last_snapshot: Option<Snapshot>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: Option<String>,
        theme_key: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            auto_join: name.map(|name| Command::Join { name, theme_key }),
            last_snapshot: None,
        })
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);

        let packet = Packet::Connect {
            client_version: CLIENT_VERSION,
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;

                if let Some(join) = self.auto_join.take() {
                    self.handle_command(join).await;
                }
            }

            Packet::State(snapshot) => {
                println!("{}", render(&snapshot, self.client_id));
                self.last_snapshot = Some(snapshot);
            }

            Packet::Error { message } => {
                println!("! {}", message);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Returns false when the user asked to leave
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Quit => return false,
            Command::Help => println!("{}", HELP),
            Command::Themes => print!("{}", render_themes()),
            command => {
                if !self.connected {
                    println!("! not connected yet");
                    return true;
                }
                if let Some(packet) = command.to_packet() {
                    if let Err(e) = self.send_packet(&packet).await {
                        error!("Error sending {:?}: {}", packet, e);
                    }
                }
            }
        }
        true
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat = interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
        let mut lines = BufReader::new(stdin()).lines();
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        println!("Type 'help' for commands.");

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parse_command(&line) {
                        Ok(Some(command)) => {
                            if !self.handle_command(command).await {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("! {}", e),
                    }
                },

                _ = heartbeat.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        self.leave().await;
        Ok(())
    }

    async fn leave(&mut self) {
        if !self.connected {
            return;
        }
        if let Err(e) = self.send_packet(&Packet::Disconnect).await {
            error!("Error sending disconnect: {}", e);
        }
        self.connected = false;
        self.client_id = None;
    }
}
