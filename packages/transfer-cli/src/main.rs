//! Terminal front end for `transfer-core`.
//!
//! Deliberately thin: no progress bars, no TUI (that's UI, out of
//! scope for the engine this wraps) — just line-oriented `tracing`
//! output. `send`/`receive` run the bulk engine over a plain TCP
//! socket standing in for an already-established DataChannel; `pair`
//! exercises the rendezvous handshake against a `rendezvous-server`.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use transfer_core::config::{ReceiveConfig, SendConfig};
use transfer_core::rendezvous_client::{ClientMessage, ServerMessage};
use transfer_core::session::{Role, Session};
use transfer_core::sink::TokioFileSink;
use transfer_core::source::{SourceFile, TokioFileSource};
use transfer_core::transport::TcpTransport;

#[derive(Parser, Debug)]
#[command(name = "transfer", version, about = "Bulk file transfer over a paired P2P channel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dial a peer already listening and send a file.
    Send {
        /// Path of the file to send.
        file: std::path::PathBuf,
        /// Peer address, e.g. 127.0.0.1:9000.
        #[arg(long)]
        to: String,
        /// Sub-chunk size in bytes.
        #[arg(long, default_value_t = transfer_core::config::DEFAULT_SUB_CHUNK_SIZE)]
        sub_chunk_size: u32,
        /// Main chunk size in bytes.
        #[arg(long, default_value_t = transfer_core::config::DEFAULT_MAIN_CHUNK_SIZE)]
        main_chunk_size: u64,
    },
    /// Listen for one incoming connection and receive a file.
    Receive {
        /// Destination path for the assembled file.
        out: std::path::PathBuf,
        /// Address to listen on, e.g. 0.0.0.0:9000.
        #[arg(long, default_value = "0.0.0.0:9000")]
        listen: String,
    },
    /// Create or join a rendezvous room and print the exchanged frames.
    Pair {
        /// Rendezvous server WebSocket URL.
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        url: String,
        /// Join an existing room instead of creating one.
        #[arg(long)]
        join: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transfer_cli=info,transfer_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Send {
            file,
            to,
            sub_chunk_size,
            main_chunk_size,
        } => run_send(file, to, sub_chunk_size, main_chunk_size).await,
        Command::Receive { out, listen } => run_receive(out, listen).await,
        Command::Pair { url, join } => run_pair(url, join).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "transfer failed");
        std::process::exit(1);
    }
}

async fn run_send(
    file: std::path::PathBuf,
    to: String,
    sub_chunk_size: u32,
    main_chunk_size: u64,
) -> anyhow::Result<()> {
    let source = Arc::new(TokioFileSource::open(&file).await?);
    tracing::info!(file = %file.display(), to = to.as_str(), bytes = source.size(), "connecting");

    let stream = tokio::net::TcpStream::connect(&to).await?;
    let transport = Arc::new(TcpTransport::new(stream, sub_chunk_size));

    let config = SendConfig {
        main_chunk_size,
        sub_chunk_size,
        ..Default::default()
    };

    let mut session = Session::new(Role::Sender);
    session.mark_ready()?;
    let stats = session.run_send(transport, source, config).await?;
    tracing::info!(bytes = stats.bytes_completed, "transfer complete");
    Ok(())
}

async fn run_receive(out: std::path::PathBuf, listen: String) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(listen = listen.as_str(), "waiting for a sender");
    let (stream, peer) = listener.accept().await?;
    tracing::info!(peer = %peer, "sender connected");

    let transport = Arc::new(TcpTransport::new(
        stream,
        transfer_core::config::DEFAULT_SUB_CHUNK_SIZE,
    ));
    let sink = TokioFileSink::create(&out).await?;

    let mut session = Session::new(Role::Receiver);
    session.mark_ready()?;
    session
        .run_receive(transport, sink, ReceiveConfig::default())
        .await?;
    tracing::info!(out = %out.display(), "transfer complete");
    Ok(())
}

async fn run_pair(url: String, join: Option<String>) -> anyhow::Result<()> {
    let (ws, _response) = tokio_tungstenite::connect_async(&url).await?;
    let (mut write, mut read) = ws.split();

    let request = match &join {
        Some(code) => ClientMessage::JoinRoom { code: code.clone() },
        None => ClientMessage::CreateRoom,
    };
    write
        .send(Message::Text(serde_json::to_string(&request)?))
        .await?;

    while let Some(msg) = read.next().await {
        let msg = msg?;
        let Message::Text(text) = msg else { continue };
        let server_msg: ServerMessage = serde_json::from_str(&text)?;
        match &server_msg {
            ServerMessage::RoomCreated { code } => {
                tracing::info!(code = code.as_str(), "room created — share this code with your peer");
            }
            ServerMessage::RoomJoined { code } => {
                tracing::info!(code = code.as_str(), "joined room");
            }
            ServerMessage::ClientJoined { client_id } => {
                tracing::info!(client_id = client_id.as_str(), "peer joined — ready to connect directly");
                break;
            }
            ServerMessage::Error { message } => {
                tracing::error!(message = message.as_str(), "rendezvous error");
                break;
            }
            other => tracing::info!(?other, "relayed frame"),
        }
    }
    Ok(())
}
