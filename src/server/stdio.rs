// image-convert/src/server/stdio.rs
use super::mcp::{parse_error, McpServer};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Serves MCP over stdin/stdout until stdin closes.
pub async fn serve_stdio(server: Arc<McpServer>) -> io::Result<()> {
    log::info!("MCP server listening on stdio");
    serve_io(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Newline-delimited JSON-RPC over any reader/writer pair.
///
/// Messages are handled concurrently, so responses may be written in a
/// different order than the requests arrived. Returns once the reader hits
/// EOF and every pending response has been flushed.
pub async fn serve_io<R, W>(server: Arc<McpServer>, mut reader: R, writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<serde_json::Value>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = rx.recv().await {
            let mut line = serde_json::to_string(&message)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<(), io::Error>(())
    });

    let mut handlers = JoinSet::new();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buffer) {
            Ok(line) => line.trim().to_string(),
            Err(e) => {
                log::warn!("Rejecting non-UTF-8 message: {}", e);
                if tx.send(parse_error(e)).is_err() {
                    log::warn!("Dropping response: output closed");
                }
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        let tx = tx.clone();
        handlers.spawn(async move {
            if let Some(response) = server.handle_message(&line).await {
                if tx.send(response).is_err() {
                    log::warn!("Dropping response: output closed");
                }
            }
        });
    }

    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            log::error!("MCP handler failed: {}", e);
        }
    }
    drop(tx);

    writer_task.await.map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerConfig;
    use serde_json::Value;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_serve_io_answers_requests_only() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        );

        let (mut client, server_end) = tokio::io::duplex(64 * 1024);
        let server = Arc::new(McpServer::new(ServerConfig::default()));
        serve_io(server, input.as_bytes(), server_end).await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();

        let mut ids: Vec<i64> = output
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .map(|message| message["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_parse_error_and_serving_continues() {
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\xfe\"}\n".to_vec();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.push(b'\n');

        let (mut client, server_end) = tokio::io::duplex(64 * 1024);
        let server = Arc::new(McpServer::new(ServerConfig::default()));
        serve_io(server, input.as_slice(), server_end).await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        let messages: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(messages.len(), 2);
        let rejected = messages.iter().find(|m| m["id"].is_null()).unwrap();
        assert_eq!(rejected["error"]["code"], crate::server::mcp::PARSE_ERROR);
        let pong = messages.iter().find(|m| m["id"] == 2).unwrap();
        assert_eq!(pong["result"], serde_json::json!({}));
    }
}
