//! A thin hyper-based runtime harness standing in for "the intercepting
//! proxy runtime" (spec.md §1 lists it as out of scope, "described only by
//! the interface the core uses"). Its only job: translate inbound hyper
//! requests into the normalized model, call the Dispatcher's request hook,
//! and either serve a synthesized response or perform the real upstream call
//! and feed the live reply back through the response hook.
//!
//! Grounded in the teacher's `admin_api/server.rs` (bind-and-accept loop,
//! one `http1` connection per task) and `imposter/manager.rs` (per-connection
//! `service_fn`).

use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::http::{Headers, Request, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response as HyperResponse};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub struct RuntimeHarness {
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
}

impl RuntimeHarness {
    pub fn new(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Self {
        Self { addr, dispatcher }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("mockrelay listening on http://{}", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let dispatcher = Arc::clone(&self.dispatcher);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move { handle(req, dispatcher).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection error: {e}");
                }
            });
        }
    }
}

async fn handle(
    req: HyperRequest<Incoming>,
    dispatcher: Arc<Dispatcher>,
) -> Result<HyperResponse<Full<Bytes>>, hyper::Error> {
    let request = to_normalized_request(req).await?;

    let response = match dispatcher.request_hook(&request) {
        DispatchResult::Respond(response) => response,
        DispatchResult::PassThrough { owner } => match forward_upstream(&request).await {
            Ok(live_response) => {
                dispatcher.response_hook(&owner, &request, &live_response);
                live_response
            }
            Err(e) => {
                error!("upstream pass-through call failed: {e}");
                let mut headers = Headers::new();
                headers.set("Content-Type", "text/plain; charset=utf-8".to_string());
                Response::new(
                    502,
                    None,
                    Some(crate::http::request::Body::Text(format!("upstream error: {e}"))),
                    headers,
                    None,
                    None,
                )
            }
        },
    };

    Ok(to_hyper_response(response))
}

async fn to_normalized_request(req: HyperRequest<Incoming>) -> Result<Request, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body_bytes = body.collect().await?.to_bytes();

    let header_fields: Vec<(Vec<u8>, Vec<u8>)> = parts
        .headers
        .iter()
        .map(|(name, value)| (name.as_str().as_bytes().to_vec(), value.as_bytes().to_vec()))
        .collect();

    let url = absolute_url(&parts);

    Ok(Request::from_raw_parts(
        url,
        parts.method.as_str(),
        body_bytes.to_vec(),
        &header_fields,
        Some(format!("{:?}", parts.version)),
    ))
}

fn absolute_url(parts: &hyper::http::request::Parts) -> String {
    if let Some(host) = parts.headers.get(hyper::header::HOST).and_then(|h| h.to_str().ok()) {
        format!("http://{host}{}", parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"))
    } else {
        parts.uri.to_string()
    }
}

fn to_hyper_response(response: Response) -> HyperResponse<Full<Bytes>> {
    let mut builder = HyperResponse::builder().status(response.status_code);
    for (name, values) in response.headers.iter() {
        for value in values {
            builder = builder.header(name, value);
        }
    }
    builder
        .body(Full::new(Bytes::from(response.body_bytes().to_vec())))
        .expect("constructing response from normalized parts never fails")
}

/// Perform the real pass-through call to the live upstream (spec.md §4.7,
/// "let the flow pass through") and normalize its reply so the response hook
/// can record it.
async fn forward_upstream(request: &Request) -> Result<Response, reqwest::Error> {
    let client = reqwest::Client::new();
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let mut builder = client.request(method, &request.url).body(request.body_bytes().to_vec());
    for (name, values) in request.headers.iter() {
        for value in values {
            builder = builder.header(name, value);
        }
    }

    let upstream_response = builder.send().await?;
    let status = upstream_response.status().as_u16();

    let mut headers = Headers::new();
    for (name, value) in upstream_response.headers().iter() {
        if let Ok(value) = value.to_str() {
            headers.append(name.as_str(), value.to_string());
        }
    }

    let body = upstream_response.bytes().await?;
    Ok(Response::new(
        status,
        None,
        Some(crate::http::request::Body::Bytes(body.to_vec())),
        headers,
        None,
        None,
    ))
}
