//! HTTP listener and per-request dispatch into the pipeline.

use crate::config::Config;
use crate::directive::{self, CC_OVERRIDE_KEY};
use crate::pipeline;
use crate::registry::Registry;
use crate::serve::OriginBody;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub struct Server {
    registry: Registry,
    marker: char,
    directive_header: String,
    cache_control_header: String,
    listen: SocketAddr,
}

impl Server {
    pub fn new(config: Config, registry: Registry) -> anyhow::Result<Self> {
        let marker = config.marker()?;
        let listen = format!("{}:{}", config.listen.host, config.listen.port).parse()?;
        Ok(Server {
            registry,
            marker,
            directive_header: config.engine.directive_header.to_ascii_lowercase(),
            cache_control_header: config.engine.cache_control_header.to_ascii_lowercase(),
            listen,
        })
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener. Split out so tests
    /// can bind an ephemeral port first.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("listening on http://{}", listener.local_addr()?);
        let server = Arc::new(self);
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle_request(req).await }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("error serving connection from {remote_addr}: {err}");
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<OriginBody>, Infallible> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        debug!("{method} {uri}");

        let directive_values: Vec<&str> = req
            .headers()
            .get_all(self.directive_header.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let mut map = directive::extract(
            uri.path(),
            uri.query(),
            &directive_values,
            self.marker,
        );
        // The override header is verbatim; no marker extraction.
        if let Some(cc) = req
            .headers()
            .get(self.cache_control_header.as_str())
            .and_then(|v| v.to_str().ok())
        {
            map.insert(CC_OVERRIDE_KEY, cc);
        }
        debug!("extracted {} directives", map.len());

        Ok(pipeline::run(&method, req.headers(), map, &self.registry).await)
    }
}
