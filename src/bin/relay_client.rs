//! Group Relay Client - Entry Point
//!
//! Reads command lines from stdin, wraps each in SOH/EOT and sends it.
//! Everything the server sends back is printed one unit per line.

use bytes::BytesMut;
use clap::Parser;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use group_relay::codec::{frame, FrameCodec, SOH};
use group_relay::error::{CodecError, ProtocolError};
use group_relay::ClientConfig;

/// Largest reply the client buffers while waiting for its EOT
const MAX_REPLY_LEN: usize = 1 << 20;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing host or port prints usage and exits
    let config = ClientConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let stream = TcpStream::connect(config.server_addr()).await?;
    let (reader, mut writer) = stream.into_split();

    let listener = tokio::spawn(print_replies(reader));

    println!("Connected to {}. Type /quit to exit.", config.server_addr());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.starts_with("/quit") {
            println!("Exiting chat...");
            break;
        }
        if let Err(e) = writer.write_all(&frame(&line)).await {
            error!("send() to server failed: {}", e);
            break;
        }
        debug!("Sent: {}", line);
    }

    writer.shutdown().await.ok();
    listener.abort();
    Ok(())
}

/// Print server output until it hangs up, then exit the process
async fn print_replies(reader: OwnedReadHalf) {
    let mut replies = FramedRead::new(reader, ReplyCodec::default());
    while let Some(output) = replies.next().await {
        match output {
            Ok(ServerOutput::Frame(tokens)) => println!("{}", tokens.join(",")),
            Ok(ServerOutput::Text(text)) => println!("{}", text),
            Ok(ServerOutput::Malformed(e)) => warn!("unreadable reply: {}", e),
            Err(e) => {
                error!("read from server failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    println!("Over and Out");
    std::process::exit(0);
}

/// One unit of server output
#[derive(Debug, PartialEq, Eq)]
enum ServerOutput {
    Frame(Vec<String>),
    /// Plain text sent without sentinels (legacy oversize errors)
    Text(String),
    Malformed(ProtocolError),
}

/// Frames through [`FrameCodec`]; bytes outside a frame come out as text
struct ReplyCodec {
    frames: FrameCodec,
}

impl Default for ReplyCodec {
    fn default() -> Self {
        Self {
            frames: FrameCodec::new(MAX_REPLY_LEN),
        }
    }
}

impl Decoder for ReplyCodec {
    type Item = ServerOutput;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.first().is_some_and(|b| *b != SOH) {
            let end = buf.iter().position(|b| *b == SOH).unwrap_or(buf.len());
            let text = buf.split_to(end);
            return Ok(Some(ServerOutput::Text(
                String::from_utf8_lossy(&text).into_owned(),
            )));
        }
        Ok(self.frames.decode(buf)?.map(|item| match item {
            Ok(tokens) => ServerOutput::Frame(tokens),
            Err(e) => ServerOutput::Malformed(e),
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(output) = self.decode(buf)? {
            return Ok(Some(output));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // unterminated frame at hang-up: show what arrived
        let rest = buf.split();
        let text = rest.strip_prefix(&[SOH]).unwrap_or(&rest[..]);
        Ok(Some(ServerOutput::Text(String::from_utf8_lossy(text).into_owned())))
    }
}
