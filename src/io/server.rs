//! HTTP boundary for import batches
//!
//! Routes:
//! - `POST /api/import` - JSON import request in, `text/event-stream` progress out
//! - `GET /health` - liveness
//!
//! Each import runs in its own task feeding a bounded channel. The response body
//! ends when the task closes its sink. If the caller disconnects, the next
//! progress write fails and the batch stops.

use crate::io::progress::ChannelSink;
use crate::services::importer::{ImportRequest, Importer};
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Buffered progress lines per request before the batch waits on the caller
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

type Body = UnsyncBoxBody<Bytes, Infallible>;

fn full_body(body: impl Into<Bytes>) -> Body {
    Full::new(body.into()).boxed_unsync()
}

fn response(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    let body = serde_json::json!({ "error": message }).to_string();
    response(status, "application/json", full_body(body))
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<Incoming>,
    importer: Arc<Importer>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::POST, "/api/import") => Ok(handle_import(req, importer).await),
        (&Method::GET, "/health") => {
            Ok(response(StatusCode::OK, "text/plain; charset=utf-8", full_body("ok")))
        }
        _ => Ok(response(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", full_body("Not Found"))),
    }
}

async fn handle_import(req: Request<Incoming>, importer: Arc<Importer>) -> Response<Body> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "import_body_read_failed");
            return json_error(StatusCode::BAD_REQUEST, "failed to read request body");
        }
    };

    let request: ImportRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "import_request_invalid_json");
            return json_error(StatusCode::BAD_REQUEST, &format!("invalid request body: {}", e));
        }
    };

    info!(
        records = %request.records.len(),
        environment = ?request.environment,
        "import_request_received"
    );

    let (tx, mut rx) = mpsc::channel::<Bytes>(PROGRESS_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        importer.run(request, ChannelSink::new(tx)).await;
    });

    let frames = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<_, Infallible>(Frame::data(chunk));
        }
    };

    let mut stream_response =
        response(StatusCode::OK, "text/event-stream", StreamBody::new(frames).boxed_unsync());
    stream_response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    stream_response
}

/// Bind the configured address and serve until shutdown
pub async fn start_server(importer: Arc<Importer>, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let config = importer.config();
    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.port()).parse()?;
    let listener = TcpListener::bind(addr).await?;
    serve(listener, importer, shutdown).await
}

/// Accept loop over an already bound listener
pub async fn serve(
    listener: TcpListener,
    importer: Arc<Importer>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "import_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let io = TokioIo::new(stream);
                        let importer = importer.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let importer = importer.clone();
                                async move { handle_request(req, importer).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, peer = %peer, "import_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "import_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("import_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
