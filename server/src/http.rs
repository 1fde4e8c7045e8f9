//! Http service
//!
//! Wires the eight endpoints from spec.md §6 onto warp filters. Structured
//! the same way as the teacher's service: a `Service`/`Builder` pair, a
//! `with_*` combinator per piece of injected state, and a single
//! `handle_rejection` recover layer.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use cluster::NodeState;
use log::{error, info};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use tokio::sync::oneshot::{self, Receiver, Sender};
use warp::{
    reject,
    reply::{self, Reply},
    Filter,
};

use crate::context::AppContext;
use crate::error::handle_rejection;
use crate::handlers;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse bind address {addr}: {source}"))]
    ParseBindAddr {
        addr: String,
        source: std::net::AddrParseError,
        backtrace: Backtrace,
    },
    #[snafu(display("service already started.\nBacktrace:\n{backtrace}"))]
    AlreadyStarted { backtrace: Backtrace },
    #[snafu(display("missing context to build service.\nBacktrace:\n{backtrace}"))]
    MissingContext { backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

impl reject::Reject for Error {}

/// Http service: owns the warp server task and its graceful-shutdown
/// channel.
pub struct Service {
    ctx: AppContext,
    bind_addr: String,
    tx: Sender<()>,
    rx: Option<Receiver<()>>,
}

impl Service {
    pub async fn start(&mut self) -> Result<()> {
        let addr: SocketAddr = self.bind_addr.parse().context(ParseBindAddrSnafu {
            addr: self.bind_addr.clone(),
        })?;
        let rx = self.rx.take().context(AlreadyStartedSnafu)?;

        info!("HTTP server listening on {addr}");

        let routes = self.routes().recover(handle_rejection);
        let (_addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(addr, async {
                rx.await.ok();
            });

        tokio::spawn(server);

        Ok(())
    }

    pub fn stop(self) {
        if self.tx.send(()).is_err() {
            error!("failed to send http service stop message");
        }
    }

    fn routes(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        self.home()
            .or(self.ping())
            .or(self.put_data())
            .or(self.get_data_one())
            .or(self.get_data_all())
            .or(self.put_view())
            .or(self.converge())
            .or(self.accept_key())
            .with(warp::log("causalkv_http"))
    }

    // GET /
    fn home(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path::end()
            .and(warp::get())
            .map(|| to_reply(handlers::handle_home()))
    }

    // GET /ping
    fn ping(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("ping")
            .and(warp::get())
            .and(self.with_ctx())
            .map(|ctx: AppContext| to_reply(handlers::handle_ping(&ctx)))
    }

    // PUT /data/{key}
    fn put_data(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("data" / String)
            .and(warp::put())
            .and(self.with_ctx())
            .and(warp::body::bytes())
            .and_then(|key, ctx: AppContext, body| async move {
                handlers::handle_put(&ctx, key, body)
                    .await
                    .map(to_reply)
                    .map_err(|e| reject::custom(e))
            })
    }

    // GET /data/{key}
    fn get_data_one(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("data" / String)
            .and(warp::get())
            .and(self.with_ctx())
            .and(warp::body::bytes())
            .and(warp::header::optional::<String>("X-Causal-Metadata"))
            .and_then(|key, ctx: AppContext, body, header_md| async move {
                handlers::handle_get(&ctx, key, body, header_md)
                    .await
                    .map(to_reply)
                    .map_err(|e| reject::custom(e))
            })
    }

    // GET /data
    fn get_data_all(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("data")
            .and(warp::get())
            .and(self.with_ctx())
            .and(warp::body::bytes())
            .and(warp::header::optional::<String>("X-Causal-Metadata"))
            .and_then(|ctx: AppContext, body, header_md| async move {
                handlers::handle_list(&ctx, body, header_md)
                    .await
                    .map(to_reply)
                    .map_err(|e| reject::custom(e))
            })
    }

    // PUT /view
    fn put_view(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("view")
            .and(warp::put())
            .and(self.with_ctx())
            .and(warp::body::bytes())
            .and_then(|ctx: AppContext, body| async move {
                handlers::handle_put_view(&ctx, body)
                    .await
                    .map(to_reply)
                    .map_err(|e| reject::custom(e))
            })
    }

    // POST /internal/converge
    fn converge(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("internal" / "converge")
            .and(warp::post())
            .and(self.with_ctx())
            .and(warp::body::bytes())
            .and_then(|ctx: AppContext, body| async move {
                handlers::handle_converge(&ctx, body)
                    .await
                    .map(to_reply)
                    .map_err(|e| reject::custom(e))
            })
    }

    // POST /internal/acceptKey
    fn accept_key(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path!("internal" / "acceptKey")
            .and(warp::post())
            .and(self.with_ctx())
            .and(warp::body::bytes())
            .and_then(|ctx: AppContext, body| async move {
                handlers::handle_accept_key(&ctx, body)
                    .await
                    .map(to_reply)
                    .map_err(|e| reject::custom(e))
            })
    }

    fn with_ctx(&self) -> impl Filter<Extract = (AppContext,), Error = Infallible> + Clone {
        let ctx = self.ctx.clone();
        warp::any().map(move || ctx.clone())
    }
}

fn to_reply(resp: handlers::HandlerResponse) -> reply::Response {
    reply::with_status(reply::json(&resp.body), resp.status).into_response()
}

/// Service builder.
pub struct Builder {
    bind_addr: Option<String>,
    state: Option<Arc<NodeState>>,
    peer: Option<cluster::PeerClient>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            bind_addr: None,
            state: None,
            peer: None,
        }
    }

    pub fn bind_addr(mut self, bind_addr: String) -> Self {
        self.bind_addr = Some(bind_addr);
        self
    }

    pub fn state(mut self, state: Arc<NodeState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn peer(mut self, peer: cluster::PeerClient) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn build(self) -> Result<Service> {
        let state = self.state.context(MissingContextSnafu)?;
        let peer = self.peer.context(MissingContextSnafu)?;
        let bind_addr = self.bind_addr.context(MissingContextSnafu)?;

        let (tx, rx) = oneshot::channel();
        Ok(Service {
            ctx: AppContext::new(state, peer),
            bind_addr,
            tx,
            rx: Some(rx),
        })
    }
}
