//! Line Relay Client
//!
//! Interactive terminal client: sends a name, then relays stdin lines to
//! the server and prints everything the server sends back.

use std::env;
use std::io::Write;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::error;
use tracing_subscriber::EnvFilter;

use line_relay::config::DEFAULT_MAX_LINE_LENGTH;
use line_relay::{ClientLine, Identifier, RelayLineCodec};

/// Default server address
const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:1234";

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay_client=warn")),
        )
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to connect to server at {}: {}", addr, e);
            return Err(e.into());
        }
    };

    let (read_half, write_half) = stream.into_split();
    let mut from_server = FramedRead::new(read_half, RelayLineCodec::new(DEFAULT_MAX_LINE_LENGTH));
    let mut to_server = FramedWrite::new(write_half, RelayLineCodec::new(DEFAULT_MAX_LINE_LENGTH));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    prompt("Enter your name: ");
    let name = Identifier::from_name_line(&stdin.next_line().await?.unwrap_or_default());
    to_server.send(name.as_str()).await?;

    println!("Welcome {}! Type messages and press Enter to send.", name);
    println!("Type 'exit' to disconnect.");

    // Print server lines; the process ends when the server goes away
    tokio::spawn(async move {
        while let Some(Ok(line)) = from_server.next().await {
            if !line.is_empty() {
                println!("{}", line);
            }
        }
        println!("Disconnected from server.");
        std::process::exit(0);
    });

    loop {
        prompt("> ");
        let Some(line) = stdin.next_line().await? else {
            return Ok(());
        };

        match ClientLine::parse(&line) {
            ClientLine::Blank => continue,
            ClientLine::Exit => {
                println!("Bye!");
                to_server.send("exit").await?;
                return Ok(());
            }
            ClientLine::Text(text) => {
                if let Err(e) = to_server.send(text.as_str()).await {
                    error!("Send error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}
