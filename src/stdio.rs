//! Line-delimited stdio transport
//!
//! Each line on the input is one JSON-RPC message (or batch); each response is
//! written as a single line. A session tracks the handshake for the lifetime
//! of the stream.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, info, warn};

use crate::mcp::{
    rpc::{json_rpc_error, PARSE_ERROR},
    server::handle_json_rpc_payload,
    session::Session,
};
use crate::server::McpServer;

pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

pub async fn serve_stdio(server: Arc<McpServer>) -> std::io::Result<()> {
    info!(server = server.name(), "serving on stdio");
    let reader = BufReader::new(tokio::io::stdin());
    serve_lines(&server, reader, tokio::io::stdout()).await
}

/// Serves messages read from `reader` until it reaches end of input.
///
/// Lines are handled as raw bytes: anything that is not valid JSON (including
/// invalid UTF-8) is answered with a parse error and the loop carries on.
pub async fn serve_lines<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session = Session::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_REQUEST_SIZE as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            break;
        }

        if line.last() != Some(&b'\n') && line.len() > MAX_REQUEST_SIZE {
            warn!(limit = MAX_REQUEST_SIZE, "request too large");
            skip_rest_of_line(&mut reader).await?;
            write_message(
                &mut writer,
                &json_rpc_error(None, PARSE_ERROR, "Request too large"),
            )
            .await?;
            continue;
        }

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let payload: Value = match serde_json::from_slice(&line) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "unparseable line");
                write_message(&mut writer, &json_rpc_error(None, PARSE_ERROR, "Parse error"))
                    .await?;
                continue;
            }
        };

        if let Some(response) = handle_json_rpc_payload(server, Some(&session), payload).await {
            write_message(&mut writer, &response).await?;
        }
    }

    session.close();
    info!("stdio input closed");
    Ok(())
}

/// Drops buffered input up to and including the next newline.
async fn skip_rest_of_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, found_newline) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|byte| *byte == b'\n') {
                Some(position) => (position + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);
        if found_newline {
            return Ok(());
        }
    }
}

async fn write_message<W>(writer: &mut W, message: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await
}
