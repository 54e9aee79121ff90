use crate::config::Config;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Form, Query, State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use peerfs_core::{
    AddNodeOperationRequest, CloneFileOperation, CloneFileOperationOutcome,
    CloneFileOperationRequest, ContentHash, DeleteFileOperation, DeleteFileOperationOutcome,
    DeleteFileOperationRequest, IngestFileOperation, IngestFileOperationOutcome,
    IngestFileOperationRequest, LocalNode, NodeMembershipOperation,
    NodeMembershipOperationOutcome, PeerfsError, QueryHashOperation, QueryHashOperationOutcome,
    QueryHashOperationRequest, RemoveNodeOperationRequest, Result,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub node: LocalNode,
    pub ingest: IngestFileOperation,
    pub clone_file: CloneFileOperation,
    pub delete: DeleteFileOperation,
    pub query_hash: QueryHashOperation,
    pub membership: NodeMembershipOperation,
}

impl ServerState {
    pub fn new(node: LocalNode) -> Self {
        Self {
            ingest: node.ingest_operation(),
            clone_file: node.clone_operation(),
            delete: node.delete_operation(),
            query_hash: node.query_hash_operation(),
            membership: node.membership_operation(),
            node,
        }
    }
}

/// File operations, selected by the `api_call` form field.
#[derive(Debug, Deserialize)]
#[serde(tag = "api_call", rename_all = "snake_case")]
pub enum FileApiCall {
    /// Ingest base64 encoded content at `filename`.
    Add { filename: String, content: String },
    /// Clone content already held locally under a new name.
    AddDup { filename: String, sha256sum: String },
    Delete { filename: String },
    /// Does any active file carry this hash?
    AddQuery { sha256sum: String },
}

/// Membership operations. The address is always the caller's own.
#[derive(Debug, Deserialize)]
#[serde(tag = "api_call", rename_all = "snake_case")]
pub enum NodeApiCall {
    AddNode,
    DeleteNode,
}

#[derive(Debug, Deserialize)]
struct PendingQuery {
    #[serde(default = "default_pending_limit")]
    limit: usize,
}

fn default_pending_limit() -> usize {
    100
}

pub const BODY_OK: &str = "OK";
pub const BODY_EXISTS: &str = "EXISTS";
pub const BODY_NOT_FOUND: &str = "NOT_FOUND";
pub const BODY_ALREADY_EXISTS: &str = "ALREADY_EXISTS";

pub async fn run_server(config: Config) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)?;
    let node = LocalNode::open(&config.data_dir, config.db_path.clone())?;
    let state = Arc::new(ServerState::new(node));

    let app = build_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn build_router(state: Arc<ServerState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/files", post(files_handler))
        .route("/files/pending", get(pending_files_handler))
        .route("/nodes", post(nodes_handler).get(list_nodes_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.node.registry().list_nodes() {
        Ok(nodes) => {
            let response = serde_json::json!({
                "status": "ok",
                "peers": nodes.len(),
            });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn files_handler(
    State(state): State<Arc<ServerState>>,
    form: std::result::Result<Form<FileApiCall>, FormRejection>,
) -> Response {
    let call = match form {
        Ok(Form(call)) => call,
        Err(rejection) => {
            tracing::debug!("Rejected file api call: {}", rejection);
            return text(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match dispatch_file_call(&state, call).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn dispatch_file_call(state: &ServerState, call: FileApiCall) -> Result<Response> {
    match call {
        FileApiCall::Add { filename, content } => {
            let body = decode_content(&content)?;
            let outcome = state
                .ingest
                .run(IngestFileOperationRequest {
                    path: filename,
                    body,
                })
                .await?;

            Ok(match outcome {
                IngestFileOperationOutcome::Created(_) => text(StatusCode::OK, BODY_OK),
                IngestFileOperationOutcome::AlreadyExists => {
                    text(StatusCode::CONFLICT, BODY_ALREADY_EXISTS)
                }
            })
        }
        FileApiCall::AddDup {
            filename,
            sha256sum,
        } => {
            let outcome = state
                .clone_file
                .run(CloneFileOperationRequest {
                    new_path: filename,
                    content_hash: ContentHash::parse(&sha256sum)?,
                })
                .await?;

            Ok(match outcome {
                CloneFileOperationOutcome::Cloned { .. } => text(StatusCode::OK, BODY_OK),
                CloneFileOperationOutcome::NotFound => text(StatusCode::NOT_FOUND, BODY_NOT_FOUND),
                CloneFileOperationOutcome::AlreadyExists => {
                    text(StatusCode::CONFLICT, BODY_ALREADY_EXISTS)
                }
            })
        }
        FileApiCall::Delete { filename } => {
            let outcome = state
                .delete
                .run(DeleteFileOperationRequest { path: filename })
                .await?;

            Ok(match outcome {
                DeleteFileOperationOutcome::Deleted(_) => text(StatusCode::OK, BODY_OK),
                DeleteFileOperationOutcome::NotFound => text(StatusCode::NOT_FOUND, BODY_NOT_FOUND),
            })
        }
        FileApiCall::AddQuery { sha256sum } => {
            let outcome = state
                .query_hash
                .run(QueryHashOperationRequest {
                    content_hash: ContentHash::parse(&sha256sum)?,
                })
                .await?;

            Ok(match outcome {
                QueryHashOperationOutcome::Exists => text(StatusCode::OK, BODY_EXISTS),
                QueryHashOperationOutcome::NotFound => text(StatusCode::NOT_FOUND, BODY_NOT_FOUND),
            })
        }
    }
}

async fn pending_files_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PendingQuery>,
) -> Response {
    match state.node.catalog().list_pending(query.limit) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn nodes_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    form: std::result::Result<Form<NodeApiCall>, FormRejection>,
) -> Response {
    let call = match form {
        Ok(Form(call)) => call,
        Err(rejection) => {
            tracing::debug!("Rejected node api call from {}: {}", remote, rejection);
            return text(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let address = remote.ip().to_canonical().to_string();
    let result = match call {
        NodeApiCall::AddNode => {
            state
                .membership
                .run_add(AddNodeOperationRequest { address })
                .await
        }
        NodeApiCall::DeleteNode => {
            state
                .membership
                .run_remove(RemoveNodeOperationRequest { address })
                .await
        }
    };

    match result {
        Ok(outcome) => text(StatusCode::OK, membership_message(&outcome)),
        Err(e) => error_response(&e),
    }
}

async fn list_nodes_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.node.registry().list_nodes() {
        Ok(nodes) => (StatusCode::OK, Json(nodes)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn membership_message(outcome: &NodeMembershipOperationOutcome) -> String {
    match outcome {
        NodeMembershipOperationOutcome::Added { address } => {
            format!("Node with IP {} added.\n", address)
        }
        NodeMembershipOperationOutcome::AlreadyRegistered { address } => {
            format!("Node with IP {} was already registered.\n", address)
        }
        NodeMembershipOperationOutcome::Removed { address } => {
            format!("Node with IP {} removed.\n", address)
        }
    }
}

/// Standard base64; line breaks some encoders insert are ignored.
fn decode_content(content: &str) -> Result<Bytes> {
    let compact: String = content
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();
    let decoded = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| PeerfsError::InvalidRequest(format!("content is not valid base64: {}", e)))?;
    Ok(Bytes::from(decoded))
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (status, body.into()).into_response()
}

fn error_status(error: &PeerfsError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(error: &PeerfsError) -> Response {
    let status = error_status(error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::debug!("Bad request: {}", error);
    }
    text(status, error.to_string())
}
