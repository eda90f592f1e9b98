//! Prometheus metrics and the `/metrics` + `/healthz` HTTP server.
//!
//! Only the leader manager (the Validation controller) binds `/metrics`;
//! both managers share the `/healthz` listener. Disabled entirely when the
//! `metrics` feature is off.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use owo_colors::OwoColorize;
use tokio::net::TcpListener;

use crate::util::colors::FG1;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;
#[cfg(feature = "metrics")]
use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};

#[cfg(feature = "metrics")]
lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

/// Per-controller reconcile counters and timing histograms, registered
/// under a controller-specific subsystem name (e.g. `"plugins"`,
/// `"mutate"`, `"validate"`) so the same metric names don't collide across
/// the three reconcilers sharing a process.
#[cfg(feature = "metrics")]
#[derive(Clone)]
pub struct ControllerMetrics {
    pub reconcile_counter: IntCounterVec,
    pub read_histogram: HistogramVec,
    pub write_histogram: HistogramVec,
    pub action_counter: IntCounterVec,
}

#[cfg(feature = "metrics")]
impl ControllerMetrics {
    pub fn new(subsystem: &str) -> Self {
        let reconcile_counter = IntCounterVec::new(
            Opts::new("reconcile_total", "Total reconciliations")
                .namespace("krangd")
                .subsystem(subsystem),
            &["name", "namespace"],
        )
        .unwrap();
        let read_histogram = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "reconcile_read_seconds",
                "Time spent determining the next action",
            )
            .namespace("krangd")
            .subsystem(subsystem),
            &["name", "namespace", "action"],
        )
        .unwrap();
        let write_histogram = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "reconcile_write_seconds",
                "Time spent applying the chosen action",
            )
            .namespace("krangd")
            .subsystem(subsystem),
            &["name", "namespace", "action"],
        )
        .unwrap();
        let action_counter = IntCounterVec::new(
            Opts::new("reconcile_actions_total", "Actions taken per reconcile")
                .namespace("krangd")
                .subsystem(subsystem),
            &["name", "namespace", "action"],
        )
        .unwrap();

        REGISTRY
            .register(Box::new(reconcile_counter.clone()))
            .ok();
        REGISTRY.register(Box::new(read_histogram.clone())).ok();
        REGISTRY.register(Box::new(write_histogram.clone())).ok();
        REGISTRY.register(Box::new(action_counter.clone())).ok();

        Self {
            reconcile_counter,
            read_histogram,
            write_histogram,
            action_counter,
        }
    }
}

async fn handle(
    req: Request<hyper::body::Incoming>,
    with_metrics: bool,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = match req.uri().path() {
        #[cfg(feature = "metrics")]
        "/metrics" if with_metrics => {
            use prometheus::Encoder;
            let encoder = prometheus::TextEncoder::new();
            let mut buf = Vec::new();
            encoder.encode(&REGISTRY.gather(), &mut buf).ok();
            buf
        }
        "/healthz" => b"ok".to_vec(),
        _ => {
            return Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::new()))
                .unwrap());
        }
    };
    Ok(Response::new(Full::new(Bytes::from(body))))
}

/// Serves `/healthz` on every manager, and `/metrics` additionally when
/// `with_metrics` is set (leader process only).
pub async fn run_server(addr: &str, with_metrics: bool) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    println!(
        "{} {} {}",
        "📈".color(FG1),
        format!("serving health probe on {addr}").color(FG1),
        if with_metrics { "(+ /metrics)" } else { "" }
    );
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(move |req| async move { handle(req, with_metrics).await }),
                )
                .await
            {
                eprintln!("metrics/health connection error: {err}");
            }
        });
    }
}
