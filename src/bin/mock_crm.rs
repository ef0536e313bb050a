//! Mock CRM HTTP Server
//!
//! Simulates the CRM REST API for local end-to-end runs.
//!
//! Endpoints:
//! - POST /contacts          - create; 409 with an error.list body if the email exists
//! - POST /contacts/search   - exact email match, `{"data": [...]}`
//! - PUT  /contacts/{id}     - partial update of name/phone
//! - POST /events            - record an event; unknown emails get 404
//!
//! Behavior:
//! 1. Listens on configurable port (default 8090)
//! 2. Requires a bearer token on every request (any value)
//! 3. With --fail-every N, every Nth event submission answers 500
//!
//! Usage:
//!   cargo run --bin mock_crm -- --port 8090 --fail-every 5
//!   then point `[crm] base_url` at http://localhost:8090

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "mock_crm")]
#[command(about = "Mock CRM REST API for local simulation")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8090")]
    port: u16,

    /// Fail every Nth event submission with a 500 (0 = never)
    #[arg(long, default_value = "0")]
    fail_every: usize,

    /// Artificial latency added to every response (ms)
    #[arg(long, default_value = "0")]
    latency_ms: u64,
}

#[derive(Debug, Clone)]
struct Contact {
    id: String,
    email: String,
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Default)]
struct Store {
    contacts: HashMap<String, Contact>,
    events: Vec<Value>,
    event_requests: usize,
    request_counter: u64,
}

impl Store {
    fn next_request_id(&mut self) -> String {
        self.request_counter += 1;
        format!("mock-{:06}", self.request_counter)
    }

    fn find_by_id(&mut self, id: &str) -> Option<&mut Contact> {
        self.contacts.values_mut().find(|c| c.id == id)
    }
}

struct MockState {
    store: Mutex<Store>,
    fail_every: usize,
    latency: Duration,
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_list(status: StatusCode, request_id: &str, code: &str, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        json!({
            "type": "error.list",
            "request_id": request_id,
            "errors": [{"code": code, "message": message}]
        }),
    )
}

fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<MockState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if !state.latency.is_zero() {
        tokio::time::sleep(state.latency).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));

    let body: Value = match req.into_body().collect().await {
        Ok(collected) => serde_json::from_slice(&collected.to_bytes()).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    };

    let mut store = state.store.lock();
    let request_id = store.next_request_id();

    if !authorized {
        println!("[MOCK] {} {} -> 401", method, path);
        return Ok(error_list(StatusCode::UNAUTHORIZED, &request_id, "unauthorized", "Access Token Invalid"));
    }

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/contacts") => {
            let Some(email) = str_field(&body, "email") else {
                return Ok(error_list(StatusCode::BAD_REQUEST, &request_id, "parameter_not_found", "email is required"));
            };
            if store.contacts.contains_key(&email) {
                println!("[MOCK] contact exists: {}", email);
                error_list(
                    StatusCode::CONFLICT,
                    &request_id,
                    "conflict",
                    "A contact matching those details already exists",
                )
            } else {
                let contact = Contact {
                    id: format!("contact-{}", store.contacts.len() + 1),
                    email: email.clone(),
                    name: str_field(&body, "name"),
                    phone: str_field(&body, "phone"),
                };
                println!("[MOCK] contact created: {} ({})", email, contact.id);
                let response = json!({"type": "contact", "id": contact.id, "email": contact.email});
                store.contacts.insert(email, contact);
                json_response(StatusCode::OK, response)
            }
        }
        (&Method::POST, "/contacts/search") => {
            let value = body.pointer("/query/value").and_then(Value::as_str).unwrap_or_default();
            let data: Vec<Value> = store
                .contacts
                .get(value)
                .map(|c| json!({"type": "contact", "id": c.id, "email": c.email, "name": c.name, "phone": c.phone}))
                .into_iter()
                .collect();
            json_response(StatusCode::OK, json!({"type": "list", "data": data, "total_count": data.len()}))
        }
        (&Method::PUT, p) if p.starts_with("/contacts/") => {
            let id = &p["/contacts/".len()..];
            let name = str_field(&body, "name");
            let phone = str_field(&body, "phone");
            match store.find_by_id(id) {
                Some(contact) => {
                    if name.is_some() {
                        contact.name = name;
                    }
                    if phone.is_some() {
                        contact.phone = phone;
                    }
                    println!("[MOCK] contact updated: {}", contact.email);
                    json_response(StatusCode::OK, json!({"type": "contact", "id": contact.id}))
                }
                None => error_list(StatusCode::NOT_FOUND, &request_id, "not_found", "Contact Not Found"),
            }
        }
        (&Method::POST, "/events") => {
            store.event_requests += 1;
            let email = str_field(&body, "email").unwrap_or_default();
            let event_name = str_field(&body, "event_name").unwrap_or_default();

            if state.fail_every > 0 && store.event_requests % state.fail_every == 0 {
                println!("[MOCK] event #{} injected failure: {} {}", store.event_requests, event_name, email);
                error_list(StatusCode::INTERNAL_SERVER_ERROR, &request_id, "server_error", "Injected failure")
            } else if !store.contacts.contains_key(&email) {
                error_list(StatusCode::NOT_FOUND, &request_id, "not_found", "User Not Found")
            } else {
                store.events.push(body);
                println!("[MOCK] event recorded: {} {} ({} stored)", event_name, email, store.events.len());
                json_response(StatusCode::ACCEPTED, json!({}))
            }
        }
        _ => error_list(StatusCode::NOT_FOUND, &request_id, "not_found", "Resource Not Found"),
    };

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                  Mock CRM REST API                       ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║ Port:            {:>5}                                   ║", args.port);
    println!("║ Fail every:      {:>5} events                            ║", args.fail_every);
    println!("║ Latency:         {:>5} ms                                ║", args.latency_ms);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let state = Arc::new(MockState {
        store: Mutex::new(Store::default()),
        fail_every: args.fail_every,
        latency: Duration::from_millis(args.latency_ms),
    });

    let listener = TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    println!("[MOCK] Listening on http://0.0.0.0:{}", args.port);

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                eprintln!("[MOCK] Connection error from {}: {}", peer, e);
            }
        });
    }
}
