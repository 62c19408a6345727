//! Line-delimited stdio transport
//!
//! One JSON-RPC request per input line, one response per output line.
//! Stdout carries protocol traffic only; logs belong on stderr.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::RpcHandler;

/// Serve requests from `reader` until EOF
pub async fn serve<R, W>(handler: &RpcHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        debug!(bytes = line.len(), "request");
        if let Some(response) = handler.handle_text(line) {
            writer.write_all(response.to_line().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

/// Serve on the process stdin/stdout
pub async fn run(handler: &RpcHandler) -> Result<()> {
    info!("diced serving on stdio");
    serve(handler, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!("stdin closed, shutting down");
    Ok(())
}
