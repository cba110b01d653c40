//! HTTP transport: accept loop and per-request dispatch.

use crate::config::ServerConfig;
use crate::request::MockRequest;
use crate::router::Router;
use crate::sequence::Outcome;
use crate::sink::HttpSink;
use crate::template::TemplateEngine;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot::Sender;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot bind to socket addr {0}: {1}")]
    SocketBind(SocketAddr, std::io::Error),
    #[error("cannot obtain local address: {0}")]
    LocalSocketAddr(std::io::Error),
    #[error("cannot send bound address to caller: {0}")]
    PublishSocketAddr(SocketAddr),
    #[error("cannot buffer request body: {0}")]
    Buffer(hyper::Error),
    #[error("cannot construct response: {0}")]
    Http(#[from] http::Error),
    #[error("connection error: {0}")]
    Connection(Box<dyn std::error::Error + Send + Sync>),
}

/// The mock server: a dispatch table plus the listening loop.
pub struct MockServer {
    port: u16,
    inner: Arc<Inner>,
}

struct Inner {
    router: Router,
    request_id_header: String,
}

impl MockServer {
    /// Build a server from configuration. The route table is fixed from
    /// here on; sequencer state is created exactly once.
    pub fn new(config: ServerConfig, port: u16) -> Self {
        let engine = Arc::new(TemplateEngine::new());
        let router = Router::new(config.routes, engine);

        info!(routes = router.len(), "mock server initialized");

        Self {
            port,
            inner: Arc::new(Inner {
                router,
                request_id_header: config.request_id_header,
            }),
        }
    }

    /// Serve until the shutdown future resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        self.start_with_signals(None, shutdown).await
    }

    /// Serve until the shutdown future resolves, optionally publishing the
    /// bound address (useful with port 0).
    pub async fn start_with_signals<F>(
        self,
        socket_addr_sender: Option<Sender<SocketAddr>>,
        shutdown: F,
    ) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::SocketBind(addr, e))?;
        let local_addr = listener.local_addr().map_err(Error::LocalSocketAddr)?;

        if let Some(sender) = socket_addr_sender {
            sender.send(local_addr).map_err(Error::PublishSocketAddr)?;
        }

        info!("Listening on http://{}", local_addr);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            let inner = Arc::clone(&self.inner);
                            tokio::spawn(async move {
                                if let Err(err) = serve_connection(inner, stream, remote_addr).await {
                                    error!(error = %err, "connection failed");
                                }
                            });
                        }
                        Err(err) => {
                            error!(error = %err, "TCP accept failed");
                        }
                    }
                }
                _ = &mut shutdown => {
                    break;
                }
            }
        }

        info!("graceful shutdown");
        Ok(())
    }
}

async fn serve_connection(
    inner: Arc<Inner>,
    stream: TcpStream,
    remote_addr: SocketAddr,
) -> Result<(), Error> {
    let service = service_fn(move |req: Request<Incoming>| {
        let inner = Arc::clone(&inner);
        async move { inner.service(req, remote_addr).await }
    });

    ServerBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
        .map_err(Error::Connection)
}

impl Inner {
    async fn service(
        self: Arc<Self>,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, Error> {
        let start = Instant::now();

        let (parts, body) = req.into_parts();
        let body = body.collect().await.map_err(Error::Buffer)?.to_bytes();
        let request = MockRequest::from_parts(&parts, body);

        debug!(method = %request.method, path = %request.path, "request started");

        let (response, bytes_written) = match self.router.lookup(&request.path) {
            Some(sequencer) => {
                let mut sink = HttpSink::new();
                match sequencer.handle(&request, &mut sink).await {
                    Outcome::Selected { bytes_written, .. } => {
                        (sink.into_response(), bytes_written)
                    }
                    // An exhausted script answers exactly like an unknown route
                    Outcome::Exhausted => (not_found()?, 0),
                }
            }
            None => (not_found()?, 0),
        };

        let request_id = parts
            .headers
            .get(self.request_id_header.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let user_agent = parts
            .headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        info!(
            http_method = %parts.method,
            uri = %parts.uri,
            remote_addr = %remote_addr,
            user_agent,
            request_id,
            resp_status = response.status().as_u16(),
            resp_byte_length = bytes_written,
            resp_elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "request complete"
        );

        Ok(response)
    }
}

fn not_found() -> Result<Response<Full<Bytes>>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::new()))?)
}
