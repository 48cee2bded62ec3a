//! Request dispatch.
//!
//! The dispatcher classifies each inbound message and runs one of two
//! handlers:
//!
//! - raw command: `getArrowData` frames the served table onto the
//!   connection; anything else replies `Unrecognized command`
//! - structured call `[operation, argument]`: applies the operation and
//!   frames the result if it is a table, otherwise replies with the result
//!
//! A frame written to the connection is reported as [`Reply::Sent`].
//! Serializer, operation and write failures are returned to the caller
//! unchanged.

use crate::error::DispatchError;
use crate::frame_builder::build_frame;
use crate::metrics::Metrics;
use arrowgate_core::{
    ArrowIpcSerializer, Datum, OperationError, OperationRegistry, SerializationOptions,
    Serializer, Table,
};
use arrowgate_protocol::{
    Inbound, Reply, GET_DATA_COMMAND, UNRECOGNIZED_COMMAND, UNSUPPORTED_MESSAGE_FORMAT,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// State shared by every connection. Read-only while requests are served.
pub struct ServerState {
    /// The served table.
    pub table: Arc<Table>,
    /// Options passed to every serialization.
    pub options: SerializationOptions,
    /// Encoder for frame payloads.
    pub serializer: Arc<dyn Serializer>,
    /// Operations available to structured calls.
    pub operations: OperationRegistry,
}

impl ServerState {
    /// Creates state serving `table` through the Arrow IPC serializer, with
    /// the built-in operations registered.
    pub fn new(table: Table, options: SerializationOptions) -> Self {
        let table = Arc::new(table);
        Self {
            operations: OperationRegistry::with_builtins(table.clone()),
            table,
            options,
            serializer: Arc::new(ArrowIpcSerializer::new()),
        }
    }

    /// Replaces the serializer.
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Replaces the operation registry.
    pub fn with_operations(mut self, operations: OperationRegistry) -> Self {
        self.operations = operations;
        self
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("rows", &self.table.row_count())
            .field("columns", &self.table.column_names())
            .field("options", &self.options)
            .field("serializer", &self.serializer.name())
            .field("operations", &self.operations)
            .finish()
    }
}

/// Routes inbound messages to their handlers.
#[derive(Clone)]
pub struct ConnectionDispatcher {
    state: Arc<ServerState>,
    metrics: Option<Arc<Metrics>>,
}

impl ConnectionDispatcher {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Handles one inbound message.
    ///
    /// `conn` is the originating connection. It is only written to when a
    /// frame is sent.
    pub async fn handle<W>(&self, conn: &mut W, message: Inbound) -> Result<Reply, DispatchError>
    where
        W: AsyncWrite + Unpin,
    {
        match message {
            Inbound::Command(command) => self.handle_command(conn, &command).await,
            Inbound::Call(elements) => self.handle_call(conn, elements).await,
        }
    }

    /// Handles a raw command.
    pub async fn handle_command<W>(
        &self,
        conn: &mut W,
        command: &[u8],
    ) -> Result<Reply, DispatchError>
    where
        W: AsyncWrite + Unpin,
    {
        if command != GET_DATA_COMMAND.as_bytes() {
            return Ok(Reply::text(UNRECOGNIZED_COMMAND));
        }
        let table = self.state.table.clone();
        self.send_table(conn, &table).await
    }

    /// Handles a structured call. `elements` must be `[operation, argument]`.
    pub async fn handle_call<W>(
        &self,
        conn: &mut W,
        elements: Vec<Value>,
    ) -> Result<Reply, DispatchError>
    where
        W: AsyncWrite + Unpin,
    {
        let [operation, argument]: [Value; 2] = match elements.try_into() {
            Ok(pair) => pair,
            Err(_) => return Ok(Reply::text(UNSUPPORTED_MESSAGE_FORMAT)),
        };

        let name = match operation {
            Value::String(name) => name,
            other => {
                return Err(OperationError::TypeMismatch {
                    operation: other.to_string(),
                    expected: "operation name",
                    actual: Datum::Scalar(other).type_name(),
                }
                .into())
            }
        };

        let argument = Datum::from_json(argument)?;
        tracing::debug!("Applying '{}' to {}", name, argument.type_name());

        match self.state.operations.apply(&name, argument)? {
            Datum::Table(table) => self.send_table(conn, &table).await,
            Datum::Scalar(value) => Ok(Reply::Value(value)),
        }
    }

    /// Frames `table` and writes it to `conn`.
    async fn send_table<W>(&self, conn: &mut W, table: &Table) -> Result<Reply, DispatchError>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = build_frame(self.state.serializer.as_ref(), table, &self.state.options)?;

        conn.write_all(&frame)
            .await
            .map_err(DispatchError::Transport)?;
        conn.flush().await.map_err(DispatchError::Transport)?;

        tracing::debug!(
            "Sent frame: {} rows, {} bytes",
            table.row_count(),
            frame.len()
        );
        if let Some(ref metrics) = self.metrics {
            metrics.record_frame(frame.len());
        }

        Ok(Reply::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrowgate_core::{Column, SerializeError};
    use arrowgate_protocol::header;
    use serde_json::json;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Serializer emitting one byte per row plus one per column.
    struct FakeSerializer;

    impl Serializer for FakeSerializer {
        fn serialize(
            &self,
            table: &Table,
            _options: &SerializationOptions,
        ) -> Result<Vec<u8>, SerializeError> {
            let mut bytes = vec![b'r'; table.row_count()];
            bytes.extend(std::iter::repeat(b'c').take(table.num_columns()));
            Ok(bytes)
        }
    }

    /// A connection whose writes always fail.
    struct BrokenConn;

    impl AsyncWrite for BrokenConn {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer disconnected",
            )))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn served_table() -> Table {
        Table::sample(10)
    }

    fn dispatcher() -> ConnectionDispatcher {
        let state = ServerState::new(served_table(), SerializationOptions::default());
        ConnectionDispatcher::new(Arc::new(state))
    }

    fn fake_dispatcher() -> ConnectionDispatcher {
        let state = ServerState::new(served_table(), SerializationOptions::default())
            .with_serializer(Arc::new(FakeSerializer));
        ConnectionDispatcher::new(Arc::new(state))
    }

    fn expected_frame(d: &ConnectionDispatcher, table: &Table) -> Vec<u8> {
        let state = d.state();
        build_frame(state.serializer.as_ref(), table, &state.options)
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_get_data_writes_one_frame() {
        let d = dispatcher();
        let mut conn = Vec::new();

        let reply = d
            .handle(&mut conn, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap();

        assert_eq!(reply, Reply::Sent);
        assert_eq!(reply.into_value(), json!(0));
        assert_eq!(conn, expected_frame(&d, &served_table()));

        let announced = header::decode_slice(&conn[..8]).unwrap();
        assert_eq!(announced, (conn.len() - 8) as u64);
    }

    #[tokio::test]
    async fn test_frame_is_header_then_payload() {
        let d = fake_dispatcher();

        // 10 rows + 4 columns
        let mut expected = header::encode(14).to_vec();
        expected.extend_from_slice(b"rrrrrrrrrrcccc");
        let mut conn = tokio_test::io::Builder::new().write(&expected).build();

        let reply = d
            .handle(&mut conn, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap();
        assert!(reply.is_sent());
    }

    #[tokio::test]
    async fn test_write_error_is_transport() {
        let d = fake_dispatcher();
        let mut conn = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();

        let err = d
            .handle(&mut conn, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unrecognized_command_writes_nothing() {
        let d = dispatcher();
        for command in ["ping", "getarrowdata", "getArrowData ", ""] {
            let mut conn = Vec::new();
            let reply = d
                .handle(&mut conn, Inbound::command(command.to_string()))
                .await
                .unwrap();
            assert_eq!(reply, Reply::text("Unrecognized command"));
            assert!(conn.is_empty());
        }
    }

    #[tokio::test]
    async fn test_repeated_get_data_is_idempotent() {
        let d = dispatcher();
        let mut first = Vec::new();
        let mut second = Vec::new();

        d.handle(&mut first, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap();
        d.handle(&mut second, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_call_arity_check() {
        let d = dispatcher();
        let messages = [
            vec![],
            vec![json!("identity")],
            vec![json!("identity"), json!(1), json!(2)],
            vec![json!(1), json!(2), json!(3), json!(4)],
        ];
        for elements in messages {
            let mut conn = Vec::new();
            let reply = d.handle(&mut conn, Inbound::call(elements)).await.unwrap();
            assert_eq!(reply, Reply::text("Unsupported message format"));
            assert!(conn.is_empty());
        }
    }

    #[tokio::test]
    async fn test_identity_table_writes_frame() {
        let d = dispatcher();
        let argument = Table::new(vec![
            Column::int64("id", vec![1, 2, 3]),
            Column::utf8("name", vec!["a", "b", "c"]),
        ])
        .unwrap();
        let json_arg = Datum::table(argument.clone()).to_json().unwrap();

        let mut conn = Vec::new();
        let reply = d
            .handle(&mut conn, Inbound::call(vec![json!("identity"), json_arg]))
            .await
            .unwrap();

        assert_eq!(reply, Reply::Sent);
        assert_eq!(conn, expected_frame(&d, &argument));
    }

    #[tokio::test]
    async fn test_identity_scalar_returns_value() {
        let d = dispatcher();
        for scalar in [json!(42), json!("hello"), json!([1, 2]), json!(null)] {
            let mut conn = Vec::new();
            let reply = d
                .handle(
                    &mut conn,
                    Inbound::call(vec![json!("identity"), scalar.clone()]),
                )
                .await
                .unwrap();
            assert_eq!(reply, Reply::Value(scalar));
            assert!(conn.is_empty());
        }
    }

    #[tokio::test]
    async fn test_builtin_table_operations() {
        let d = fake_dispatcher();

        let mut conn = Vec::new();
        let reply = d
            .handle(&mut conn, Inbound::call(vec![json!("head"), json!(3)]))
            .await
            .unwrap();
        assert!(reply.is_sent());
        // 3 rows + 4 columns from the fake serializer
        assert_eq!(header::decode_slice(&conn).unwrap(), 7);

        let mut conn = Vec::new();
        let reply = d
            .handle(&mut conn, Inbound::call(vec![json!("table"), json!(null)]))
            .await
            .unwrap();
        assert!(reply.is_sent());
        assert_eq!(conn, expected_frame(&d, &served_table()));
    }

    #[tokio::test]
    async fn test_count_returns_scalar() {
        let d = dispatcher();
        let arg = Datum::table(Table::sample(6)).to_json().unwrap();
        let mut conn = Vec::new();
        let reply = d
            .handle(&mut conn, Inbound::call(vec![json!("count"), arg]))
            .await
            .unwrap();
        assert_eq!(reply, Reply::Value(json!(6)));
        assert!(conn.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_operation_propagates() {
        let d = dispatcher();
        let mut conn = Vec::new();
        let err = d
            .handle(&mut conn, Inbound::call(vec![json!("drop"), json!(1)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::NotFound(_))
        ));
        assert!(!err.is_fatal());
        assert!(conn.is_empty());
    }

    #[tokio::test]
    async fn test_non_string_operation_is_type_mismatch() {
        let d = dispatcher();
        let mut conn = Vec::new();
        let err = d
            .handle(&mut conn, Inbound::call(vec![json!(7), json!(1)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_serialization_failure_propagates() {
        let d = dispatcher();
        let empty = Datum::table(Table::empty()).to_json().unwrap();
        let mut conn = Vec::new();
        let err = d
            .handle(&mut conn, Inbound::call(vec![json!("identity"), empty]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Serialization(SerializeError::EmptySchema)
        ));
        assert!(conn.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_transport_error() {
        let d = dispatcher();
        let err = d
            .handle(&mut BrokenConn, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_frames_recorded_in_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let d = dispatcher().with_metrics(metrics.clone());
        let mut conn = Vec::new();

        d.handle(&mut conn, Inbound::command(GET_DATA_COMMAND))
            .await
            .unwrap();
        d.handle(&mut conn, Inbound::command("ping"))
            .await
            .unwrap();

        assert_eq!(metrics.frames_sent_total.get() as u64, 1);
    }
}
