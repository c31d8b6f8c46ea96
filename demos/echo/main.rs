//! A tiny loopback demonstration of the `resp_proto` codec: accepts TCP
//! connections and echoes back whatever RESP frame each client sends.
//!
//! This is not a product surface — no command dispatch, no storage, no
//! configuration beyond the listen address. It exists purely so the
//! codec can be exercised end-to-end over a real stream instead of only
//! through unit tests, the same role an accept-loop-plus-handler split
//! plays in a full RESP server.

use clap::Parser as ClapParser;
use log::{error, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use resp_proto::{encode_array, encode_bulk_string, encode_error, encode_integer, encode_null_array, encode_null_bulk, encode_simple_string, CodecError, Reader, ReaderOptions, Reply};

#[derive(ClapParser)]
#[command(name = "resp-echo-demo")]
#[command(about = "Echoes RESP frames back to whoever sends them", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1")]
    host: String,
    #[arg(short, long, default_value = "6380")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!("resp-echo-demo listening on {addr}");
            listener
        }
        Err(e) => anyhow::bail!("could not bind {addr}: {e}"),
    };

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("accepted connection from {peer}");
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket).await {
                error!("connection from {peer} ended with an error: {e}");
            }
        });
    }
}

async fn handle_connection(mut socket: TcpStream) -> anyhow::Result<()> {
    let mut reader = Reader::new(ReaderOptions {
        accept_inline: true,
        ..ReaderOptions::default()
    });
    let mut read_buf = [0u8; 4096];

    loop {
        match reader.gets() {
            Ok(Some(reply)) => {
                let encoded = encode_reply(&reply);
                socket.write_all(&encoded).await?;
            }
            Ok(None) => {
                let n = socket.read(&mut read_buf).await?;
                if n == 0 {
                    return Ok(());
                }
                reader.feed(&read_buf[..n])?;
            }
            Err(CodecError::Poisoned) => return Ok(()),
            Err(e) => {
                let message = format!("ERR {e}");
                socket.write_all(&encode_error(message.as_bytes())).await?;
                return Ok(());
            }
        }
    }
}

/// Serialize any parsed [`Reply`] back to its wire form, recursively for
/// arrays. Not part of the library's public contract: the codec only
/// promises encoders for *outbound commands* (`build_command` and its
/// primitives); a generic reply-to-bytes encoder is a demo-only
/// convenience, following the same recursive encode-and-concatenate
/// shape other RESP codecs use for their own reply encoders.
fn encode_reply(reply: &Reply) -> bytes::Bytes {
    match reply {
        Reply::Integer(n) => encode_integer(*n),
        Reply::SimpleString(s) => encode_simple_string(s),
        Reply::BulkString(b) => encode_bulk_string(b),
        Reply::Text(t) => encode_bulk_string(t.as_bytes()),
        Reply::BulkNull => encode_null_bulk(),
        Reply::ArrayNull => encode_null_array(),
        Reply::Error(e) => encode_error(e.payload()),
        Reply::Array(items) => encode_array(items.iter().map(encode_reply)),
    }
}
