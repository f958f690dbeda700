//! HTTP surface: route validation and bridging the async request/response
//! bodies to the blocking pipeline running on an executor worker.

use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{info, warn};

use crate::encoder::JsonStream;
use crate::executor::Executor;
use crate::{pipeline, PipelineError, PreparedQuery};

/// Chunks buffered between the pipeline and the client before the pipeline
/// blocks.
const FRAME_BUFFER: usize = 16;

#[derive(Clone)]
pub struct AppState {
    executor: Arc<Executor>,
    help: Arc<str>,
}

impl AppState {
    pub fn new(executor: Executor, help: impl Into<Arc<str>>) -> Self {
        Self {
            executor: Arc::new(executor),
            help: help.into(),
        }
    }
}

/// `POST <path>` runs the query; anything else is answered with the help text.
///
/// `path` is compared literally against the request path, so characters such
/// as `:` or `*` carry no routing meaning.
pub fn router(path: &str, state: AppState) -> Router {
    let path: Arc<str> = path.into();
    Router::new()
        .fallback(
            move |State(state): State<AppState>, method: Method, uri: Uri, body: Body| {
                let path = path.clone();
                async move { dispatch(&path, state, method, uri, body).await }
            },
        )
        .with_state(state)
}

pub async fn serve(addr: std::net::SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn dispatch(path: &str, state: AppState, method: Method, uri: Uri, body: Body) -> Response {
    if uri.path() != path {
        return (StatusCode::NOT_FOUND, state.help.to_string()).into_response();
    }
    if method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, state.help.to_string()).into_response();
    }
    run_query(state, body).await
}

/// What the pipeline sends back to the request task.
enum Frame {
    Chunk(Bytes),
    /// A failure before anything was sent; becomes a clean 500.
    Failed(PipelineError),
}

/// Blocking writer that hands each flushed buffer to the request task.
struct ChannelWriter {
    tx: mpsc::Sender<Frame>,
    buf: Vec<u8>,
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        self.tx
            .blocking_send(Frame::Chunk(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

/// Runs on an executor worker.
fn answer<R: io::Read>(
    query: &mut PreparedQuery<'_>,
    body: R,
    tx: mpsc::Sender<Frame>,
    help: &str,
) {
    let mut stream = JsonStream::new(ChannelWriter {
        tx: tx.clone(),
        buf: Vec::new(),
    });
    match pipeline::stream_envelope(query, body, &mut stream) {
        Ok(lines) => info!(lines, "request completed"),
        Err(err) if stream.committed() => {
            warn!(%err, lines = stream.lines(), "request aborted mid-stream");
            if let Err(e) = stream.append_diagnostic(&format!("\n{err}\n\n{help}")) {
                warn!(%e, "could not append diagnostic to response");
            }
        }
        Err(err) => {
            warn!(%err, "request failed");
            let _ = tx.blocking_send(Frame::Failed(err));
        }
    }
}

async fn run_query(state: AppState, body: Body) -> Response {
    let (tx, mut rx) = mpsc::channel(FRAME_BUFFER);
    let body = SyncIoBridge::new(StreamReader::new(
        body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other)),
    ));
    let help = state.help.clone();
    let submitted = state
        .executor
        .submit(move |query| answer(query, body, tx, &help));
    if let Err(e) = submitted {
        return internal_error(&e, &state.help);
    }

    match rx.recv().await {
        Some(Frame::Chunk(first)) => {
            // `answer` only sends `Failed` before the first chunk.
            let rest = futures_util::stream::unfold(rx, |mut rx| async move {
                match rx.recv().await {
                    Some(Frame::Chunk(chunk)) => Some((Ok::<_, io::Error>(chunk), rx)),
                    Some(Frame::Failed(_)) | None => None,
                }
            });
            let body =
                futures_util::stream::once(async move { Ok::<_, io::Error>(first) }).chain(rest);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                Body::from_stream(body),
            )
                .into_response()
        }
        Some(Frame::Failed(err)) => internal_error(&err, &state.help),
        None => internal_error(&"Query worker stopped before answering.", &state.help),
    }
}

fn internal_error(err: &dyn std::fmt::Display, help: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err}\n\n{help}")).into_response()
}
