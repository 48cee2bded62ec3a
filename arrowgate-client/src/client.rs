//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use arrowgate_core::{ipc, Datum, Table};
use arrowgate_protocol::{Encoder, Incoming, ReplyLine, GET_DATA_COMMAND};
use serde_json::Value;
use std::sync::Arc;

/// The result of a call: a framed table or a JSON reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Table(Table),
    Value(Value),
}

impl CallOutcome {
    pub fn into_table(self) -> Option<Table> {
        match self {
            CallOutcome::Table(t) => Some(t),
            CallOutcome::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            CallOutcome::Table(_) => None,
            CallOutcome::Value(v) => Some(v),
        }
    }
}

/// High-level arrowgate client.
#[derive(Clone)]
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Fetches the served table.
    pub async fn fetch_table(&self) -> Result<Table, ClientError> {
        let incoming = self.conn.send_command(GET_DATA_COMMAND).await?;
        match Self::outcome(incoming)? {
            CallOutcome::Table(table) => Ok(table),
            CallOutcome::Value(value) => Err(ClientError::UnexpectedReply(value)),
        }
    }

    /// Sends a raw command line. Unknown commands come back as a text reply.
    pub async fn send_command(&self, command: &str) -> Result<CallOutcome, ClientError> {
        Self::outcome(self.conn.send_command(command).await?)
    }

    /// Calls `operation` with `argument`.
    pub async fn call(&self, operation: &str, argument: &Datum) -> Result<CallOutcome, ClientError> {
        Self::outcome(self.conn.send_call(operation, argument).await?)
    }

    /// Sends arbitrary structured elements as one message.
    pub async fn call_elements(&self, elements: &[Value]) -> Result<CallOutcome, ClientError> {
        let line = Encoder::encode_elements(elements)?;
        Self::outcome(self.conn.request(&line).await?)
    }

    fn outcome(incoming: Incoming) -> Result<CallOutcome, ClientError> {
        match incoming {
            Incoming::Frame(frame) => {
                tracing::debug!("Decoding frame of {} bytes", frame.payload.len());
                Ok(CallOutcome::Table(ipc::decode_stream(&frame.payload)?))
            }
            Incoming::Reply(ReplyLine::Reply { value }) => Ok(CallOutcome::Value(value)),
            Incoming::Reply(ReplyLine::Error {
                code,
                message,
                retryable,
            }) => Err(ClientError::Server {
                code,
                message,
                retryable,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrowgate_core::SerializationOptions;
    use arrowgate_protocol::{ErrorCode, UNRECOGNIZED_COMMAND, UNSUPPORTED_MESSAGE_FORMAT};
    use arrowgate_server::{ConnectionDispatcher, Server, ServerConfig, ServerState};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn start_server(rows: usize, options: SerializationOptions) -> (Arc<Server>, Client) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ServerState::new(Table::sample(rows), options);
        let dispatcher = ConnectionDispatcher::new(Arc::new(state));
        let server = Arc::new(Server::new(ServerConfig::new(addr), dispatcher));
        let running = server.clone();
        tokio::spawn(async move { running.run_with_listener(listener).await });

        let client = Client::new(ConnectionConfig::new(addr));
        client.connect().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_fetch_table() {
        let (server, client) = start_server(200, SerializationOptions::default().with_batch_size(64)).await;

        let table = client.fetch_table().await.unwrap();
        assert_eq!(table, Table::sample(200));

        // Same connection, same table
        assert_eq!(client.fetch_table().await.unwrap(), table);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_calls() {
        let (server, client) = start_server(20, SerializationOptions::default()).await;

        let head = client
            .call("head", &Datum::scalar(5))
            .await
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(head.row_count(), 5);

        let count = client
            .call("count", &Datum::table(head.clone()))
            .await
            .unwrap();
        assert_eq!(count, CallOutcome::Value(json!(5)));

        let echoed = client.call("identity", &Datum::scalar("hi")).await.unwrap();
        assert_eq!(echoed, CallOutcome::Value(json!("hi")));

        let roundtrip = client.call("identity", &Datum::table(head.clone())).await.unwrap();
        assert_eq!(roundtrip, CallOutcome::Table(head));
        server.shutdown();
    }

    #[tokio::test]
    async fn test_text_replies() {
        let (server, client) = start_server(5, SerializationOptions::default()).await;

        let reply = client.send_command("ping").await.unwrap();
        assert_eq!(reply, CallOutcome::Value(json!(UNRECOGNIZED_COMMAND)));

        let reply = client.call_elements(&[json!("identity")]).await.unwrap();
        assert_eq!(reply, CallOutcome::Value(json!(UNSUPPORTED_MESSAGE_FORMAT)));
        server.shutdown();
    }

    #[tokio::test]
    async fn test_server_error() {
        let (server, client) = start_server(5, SerializationOptions::default()).await;

        let err = client.call("nope", &Datum::scalar(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Server {
                code: ErrorCode::UnknownOperation,
                ..
            }
        ));

        // The connection survives an operation error
        assert_eq!(client.fetch_table().await.unwrap().row_count(), 5);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_fetch_reports_text_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await.unwrap();
            let line = Encoder::encode_reply(&ReplyLine::Reply { value: json!("nope") }).unwrap();
            socket.write_all(&line).await.unwrap();
        });

        let client = Client::new(ConnectionConfig::new(addr));
        client.connect().await.unwrap();
        assert!(matches!(
            client.fetch_table().await,
            Err(ClientError::UnexpectedReply(_))
        ));
    }
}
