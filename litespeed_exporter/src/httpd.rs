//! The telemetry endpoint.
//!
//! Every `GET` of the telemetry path runs one collection cycle on the blocking
//! pool and answers with that cycle's Prometheus text rendering. Any other
//! request gets a 404.

use std::{convert::Infallible, fmt, future::Future, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{CONTENT_TYPE, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, pin, task::JoinSet};
use tracing::{debug, error, info};

use crate::collector::Collector;

/// Content type of the Prometheus text exposition format.
pub const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4";

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Server`]
pub enum Error {
    /// Wrapper for [`std::io::Error`].
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

struct State {
    telemetry_path: String,
    collector: Arc<Collector>,
}

/// HTTP server exposing the collected metrics.
pub struct Server {
    listener: TcpListener,
    state: Arc<State>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("telemetry_path", &self.state.telemetry_path)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Bind a new [`Server`] to `addr`. Metrics are served under
    /// `telemetry_path` and collected by `collector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        telemetry_path: impl Into<String>,
        collector: Arc<Collector>,
    ) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(State {
                telemetry_path: telemetry_path.into(),
                collector,
            }),
        })
    }

    /// The address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is no longer valid.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut join_set = JoinSet::new();

        pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping accept loop.");
                    break;
                }

                incoming = self.listener.accept() => {
                    let (stream, addr) = match incoming {
                        Ok(sa) => sa,
                        Err(e) => {
                            error!("Error accepting connection: {e}");
                            continue;
                        }
                    };
                    debug!("Accepted connection from {addr}");

                    let state = Arc::clone(&self.state);
                    join_set.spawn(async move {
                        let service = service_fn(move |req| respond(Arc::clone(&state), req));
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            error!("Error serving {addr}: {e}");
                        }
                    });
                }
            }
        }

        drop(self.listener);
        // Idle keep-alive connections would otherwise hold shutdown open.
        join_set.shutdown().await;
    }
}

async fn respond(
    state: Arc<State>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET || req.uri().path() != state.telemetry_path {
        let mut response = Response::new(Full::new(Bytes::from_static(b"404 page not found\n")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return Ok(response);
    }

    let collector = Arc::clone(&state.collector);
    let rendered = match tokio::task::spawn_blocking(move || collector.collect()).await {
        Ok(rendered) => rendered,
        Err(err) => {
            error!("Collection cycle did not complete: {err}");
            let mut response = Response::new(Full::new(Bytes::from_static(
                b"collection cycle failed\n",
            )));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return Ok(response);
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(rendered)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT));
    Ok(response)
}
