/// Dispatcher tests
///
/// Request routing against a real registry and transaction manager, with
/// responses captured by an in-memory sink.
/// Run with: cargo test --test dispatcher_tests

use modestdb::server::Dispatcher;
use modestdb::{
    Request, Response, ResponseSink, ResponseType, SessionId, SessionRegistry, StorageEngine,
    TransactionManager,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(SessionId, Response)>>,
}

impl ResponseSink for RecordingSink {
    fn send(&self, session: SessionId, response: Response) {
        self.sent.lock().unwrap().push((session, response));
    }
}

impl RecordingSink {
    /// Waits until `session` has received `n` responses and returns them.
    async fn wait_for(&self, session: SessionId, n: usize) -> Vec<Response> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let received: Vec<Response> = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == session)
                .map(|(_, r)| r.clone())
                .collect();
            if received.len() >= n {
                return received;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "session {} got {} of {} responses",
                session,
                received.len(),
                n
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

struct Fixture {
    _root: TempDir,
    registry: Arc<SessionRegistry>,
    sink: Arc<RecordingSink>,
    dispatcher: Dispatcher,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let manager = Arc::new(TransactionManager::start(16));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            manager,
            sink.clone(),
            root.path().to_path_buf(),
            64,
        );
        Self {
            _root: root,
            registry,
            sink,
            dispatcher,
        }
    }

    async fn send(&self, session: SessionId, kind: ResponseType, data: &str) {
        self.dispatcher
            .handle(Request::new(session, Response::new(kind, data)))
            .await;
    }

    /// Sends a request and waits for the next response to `session`.
    async fn ask(&self, session: SessionId, kind: ResponseType, data: &str) -> Response {
        let before = self.sink.wait_for(session, 0).await.len();
        self.send(session, kind, data).await;
        self.sink.wait_for(session, before + 1).await.remove(before)
    }
}

#[tokio::test]
async fn test_keep_alive() {
    let fx = Fixture::new();
    let reply = fx.ask(1, ResponseType::KeepAlive, "").await;
    assert_eq!(reply, Response::new(ResponseType::KeepAlive, "Alive"));
}

#[tokio::test]
async fn test_insert_reports_data_inserted() {
    let fx = Fixture::new();
    assert_eq!(
        fx.ask(1, ResponseType::NewDatabase, "shop").await,
        Response::notification("Database Created shop")
    );
    assert_eq!(
        fx.ask(1, ResponseType::Query, "CREATE TABLE t (id INTEGER)").await,
        Response::notification("Table Created t")
    );
    assert_eq!(
        fx.ask(1, ResponseType::Query, "INSERT INTO t VALUES (1)").await,
        Response::notification("Data Inserted")
    );

    let reply = fx.ask(1, ResponseType::Query, "SELECT * FROM t").await;
    assert_eq!(reply.kind, ResponseType::Query);
    let json: serde_json::Value = serde_json::from_str(&reply.data).unwrap();
    assert_eq!(json, serde_json::json!({"Columns": ["id"], "Rows": [[1]]}));
}

#[tokio::test]
async fn test_multi_statement_query_answers_each_command() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "multi").await;
    fx.send(
        1,
        ResponseType::Query,
        "CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a'); \
         UPDATE t SET name = 'b' WHERE id = 1; DELETE FROM t WHERE id = 2",
    )
    .await;

    let replies = fx.sink.wait_for(1, 5).await;
    let messages: Vec<&str> = replies[1..].iter().map(|r| r.data.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Table Created t", "Data Inserted", "Data Updated", "Data Deleted"]
    );
}

#[tokio::test]
async fn test_execution_failure_reports_error() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "d").await;

    let reply = fx.ask(1, ResponseType::Query, "INSERT INTO missing VALUES (1)").await;
    assert_eq!(reply, Response::error("Table 'missing' not found"));
}

#[tokio::test]
async fn test_query_without_database() {
    let fx = Fixture::new();
    let reply = fx.ask(7, ResponseType::Query, "SELECT * FROM t").await;
    assert_eq!(reply, Response::error("No active database selected"));
}

#[tokio::test]
async fn test_parse_error_is_reported_once() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "d").await;

    let reply = fx.ask(1, ResponseType::Query, "SELEC nonsense").await;
    assert_eq!(reply.kind, ResponseType::Error);
    assert!(reply.data.starts_with("Parse error"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fx.sink.wait_for(1, 0).await.len(), 2);
}

#[tokio::test]
async fn test_load_database_pairs_session() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "shared").await;

    assert_eq!(
        fx.ask(2, ResponseType::LoadDatabase, " shared ").await,
        Response::notification("Database Loaded shared")
    );
    assert_eq!(fx.registry.get_pair(2).await.unwrap().name(), "shared");

    let reply = fx.ask(3, ResponseType::LoadDatabase, "nope").await;
    assert_eq!(reply.kind, ResponseType::Error);
}

#[tokio::test]
async fn test_new_table_is_refused() {
    let fx = Fixture::new();
    let reply = fx.ask(1, ResponseType::NewTable, "t").await;
    assert_eq!(reply.kind, ResponseType::Error);
    assert!(reply.data.contains("CREATE TABLE"));
}

#[tokio::test]
async fn test_find_table() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "d").await;
    fx.ask(1, ResponseType::Query, "CREATE TABLE people (id INTEGER NOT NULL, name TEXT)")
        .await;

    let reply = fx.ask(1, ResponseType::FindTable, "people").await;
    assert_eq!(reply.kind, ResponseType::FindTable);
    let json: serde_json::Value = serde_json::from_str(&reply.data).unwrap();
    assert_eq!(json["Name"], "people");
    assert_eq!(json["RowCount"], 0);
    assert_eq!(json["Columns"][0]["Name"], "id");
    assert_eq!(json["Columns"][0]["Nullable"], false);

    let missing = fx.ask(1, ResponseType::FindTable, "ghosts").await;
    assert_eq!(missing, Response::error("Table 'ghosts' not found"));
}

#[tokio::test]
async fn test_get_metadata_shape() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "b").await;
    fx.ask(2, ResponseType::NewDatabase, "a").await;
    fx.ask(2, ResponseType::Query, "CREATE TABLE t (id INTEGER)").await;

    let reply = fx.ask(3, ResponseType::GetMetadata, "").await;
    assert_eq!(reply.kind, ResponseType::GetMetadata);
    let json: serde_json::Value = serde_json::from_str(&reply.data).unwrap();
    let databases = json["Databases"].as_array().unwrap();
    assert_eq!(databases.len(), 2);
    assert_eq!(databases[0]["DB_Name"], "a");
    assert_eq!(databases[0]["Tables"][0]["Name"], "t");
    assert_eq!(databases[1]["Tables"], serde_json::json!([]));
}

#[tokio::test]
async fn test_show_transaction_lists_batches() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "d").await;
    fx.ask(1, ResponseType::Query, "CREATE TABLE t (id INTEGER)").await;

    let reply = fx.ask(1, ResponseType::ShowTransaction, "").await;
    assert_eq!(reply.kind, ResponseType::ShowTransaction);
    let json: serde_json::Value = serde_json::from_str(&reply.data).unwrap();
    let transactions = json["Transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["Database"], "d");
    assert_eq!(transactions[0]["Commands"], serde_json::json!(["CREATE TABLE t"]));
}

#[tokio::test]
async fn test_drop_db_refused_while_paired_then_allowed() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "gone").await;

    let refused = fx.ask(2, ResponseType::DropDb, "gone").await;
    assert_eq!(refused.kind, ResponseType::Error);
    assert!(refused.data.contains("in use"));

    fx.send(1, ResponseType::SessionExited, "").await;
    assert_eq!(
        fx.ask(2, ResponseType::DropDb, "gone").await,
        Response::notification("Database Dropped gone")
    );
    assert!(fx.registry.database_names().await.is_empty());
}

#[tokio::test]
async fn test_session_exited_unpairs_silently() {
    let fx = Fixture::new();
    fx.ask(1, ResponseType::NewDatabase, "d").await;

    fx.send(1, ResponseType::SessionExited, "").await;
    assert!(fx.registry.get_pair(1).await.is_err());
    assert_eq!(fx.sink.wait_for(1, 0).await.len(), 1);
}

#[tokio::test]
async fn test_exit_right_after_pairing_leaves_no_binding() {
    let root = TempDir::new().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::new(TransactionManager::start(16)),
        sink.clone(),
        root.path().to_path_buf(),
        64,
    ));
    let (tx, rx) = mpsc::unbounded_channel();
    let running = tokio::spawn(dispatcher.run(rx));

    // Each session pairs and disconnects back to back, the order a
    // client that hangs up right after NewDatabase produces
    let num_sessions = 100u64;
    for session in 1..=num_sessions {
        let create = Response::new(ResponseType::NewDatabase, format!("db{}", session));
        tx.send(Request::new(session, create)).unwrap();
        tx.send(Request::new(session, Response::new(ResponseType::SessionExited, "")))
            .unwrap();
    }
    drop(tx);
    running.await.unwrap();

    for session in 1..=num_sessions {
        let replies = sink.wait_for(session, 1).await;
        assert_eq!(
            replies[0],
            Response::notification(format!("Database Created db{}", session))
        );
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut still_paired = 0;
        for session in 1..=num_sessions {
            if registry.get_pair(session).await.is_ok() {
                still_paired += 1;
            }
        }
        if still_paired == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} exited sessions are still paired",
            still_paired
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(registry.database_names().await.len(), num_sessions as usize);
    registry.drop_database("db1").await.unwrap();
}

#[tokio::test]
async fn test_client_error_frames_are_ignored() {
    let fx = Fixture::new();
    fx.send(1, ResponseType::Error, "whatever").await;
    fx.send(1, ResponseType::Notification, "whatever").await;
    assert!(fx.sink.wait_for(1, 0).await.is_empty());
}
