//! JSON-lines bridge between a hosting runtime and the controller.
//!
//! Each stdin line is one host event; an optional numeric `id` is echoed on
//! the matching output line. Broadcasts to the bridge's own session are
//! written as they happen, without an id.
//!
//! ```text
//! -> {"id":1,"event":"install"}
//! -> {"id":2,"event":"fetch","url":"./","mode":"navigate"}
//! -> {"id":3,"event":"message","data":{"type":"GET_CACHE_NAME"}}
//! <- {"id":1,"kind":"installed","report":{...},"activation":{...}}
//! <- {"kind":"broadcast","data":{"type":"SW_ACTIVATED","version":"app-cache-v1718000000000"}}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use shellcache_core::header::{HeaderValue, ACCEPT};
use shellcache_core::{
    ActivationReport, CacheController, ClientMessage, ControllerEvent, Destination,
    InstallReport, MessageReply, Method, Request, RequestMode, Response, ResponseSource,
    RouteOutcome, Settings, Url,
};

/// Output lines queued for stdout
const OUTPUT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum HostEvent {
    Install,
    Activate,
    Fetch(FetchEvent),
    Message { data: ClientMessage },
}

#[derive(Debug, Deserialize)]
pub struct FetchEvent {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    mode: RequestMode,
    #[serde(default)]
    destination: Destination,
    #[serde(default)]
    accept: Option<String>,
}

impl FetchEvent {
    fn to_request(&self, settings: &Settings) -> Result<Request> {
        let url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(_) => settings.resolve(&self.url)?,
        };
        let method = match self.method {
            Some(ref method) => Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid method {:?}", method))?,
            None => Method::GET,
        };

        let mut request = Request::new(method, url)
            .with_mode(self.mode)
            .with_destination(self.destination);
        if let Some(ref accept) = self.accept {
            let value = HeaderValue::from_str(accept).context("Invalid Accept header")?;
            request = request.with_header(ACCEPT, value);
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostOutput {
    Installed {
        report: InstallReport,
        #[serde(skip_serializing_if = "Option::is_none")]
        activation: Option<ActivationReport>,
    },
    Activated {
        report: Option<ActivationReport>,
    },
    Response {
        status: u16,
        source: ResponseSource,
        content_type: Option<String>,
        body: String,
        body_len: usize,
    },
    Passthrough,
    NetworkError {
        error: String,
    },
    Reply {
        data: Option<MessageReply>,
    },
    Broadcast {
        data: ControllerEvent,
    },
    Error {
        error: String,
    },
}

impl HostOutput {
    fn response(response: Response, source: ResponseSource) -> Self {
        Self::Response {
            status: response.status,
            source,
            content_type: response.content_type().map(str::to_string),
            body: response.text().into_owned(),
            body_len: response.body.len(),
        }
    }

    fn error(error: impl std::fmt::Display) -> Self {
        Self::Error {
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OutputLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(flatten)]
    output: HostOutput,
}

#[derive(Debug, Default, Deserialize)]
struct EventId {
    #[serde(default)]
    id: Option<u64>,
}

/// Split one input line into its id and event
fn parse_line(line: &str) -> (Option<u64>, Result<HostEvent>) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return (None, Err(anyhow::Error::new(e).context("Invalid JSON"))),
    };
    let id = serde_json::from_value::<EventId>(value.clone())
        .unwrap_or_default()
        .id;
    let event = serde_json::from_value(value).context("Unknown host event");
    (id, event)
}

/// Run one host event through the controller
pub async fn dispatch(controller: &CacheController, event: HostEvent) -> HostOutput {
    match event {
        HostEvent::Install => {
            let report = controller.handle_install().await;
            let activation = if controller.settings().skip_waiting {
                match controller.handle_activate().await {
                    Ok(activation) => activation,
                    Err(e) => return HostOutput::error(e),
                }
            } else {
                None
            };
            HostOutput::Installed { report, activation }
        }
        HostEvent::Activate => match controller.handle_activate().await {
            Ok(report) => HostOutput::Activated { report },
            Err(e) => HostOutput::error(e),
        },
        HostEvent::Fetch(fetch) => {
            let request = match fetch.to_request(controller.settings()) {
                Ok(request) => request,
                Err(e) => return HostOutput::error(format!("{:#}", e)),
            };
            match controller.handle_fetch(&request).await {
                Ok(RouteOutcome::Passthrough) => HostOutput::Passthrough,
                Ok(RouteOutcome::Respond { response, source }) => {
                    HostOutput::response(response, source)
                }
                Err(e) => HostOutput::NetworkError {
                    error: e.to_string(),
                },
            }
        }
        HostEvent::Message { data } => HostOutput::Reply {
            data: controller.handle_message(data).await,
        },
    }
}

pub async fn run_bridge(controller: &CacheController) -> Result<()> {
    controller.resume().await?;
    let (out_tx, mut out_rx) = mpsc::channel::<OutputLine>(OUTPUT_BUFFER_SIZE);

    // Single writer so lines never interleave
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            let mut json = match serde_json::to_vec(&line) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize bridge output");
                    continue;
                }
            };
            json.push(b'\n');
            if let Err(e) = stdout.write_all(&json).await {
                warn!(error = %e, "Failed to write bridge output");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let session = controller.clients().connect().await;
    let session_id = session.id;
    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        let mut events = session.events;
        while let Some(event) = events.recv().await {
            let line = OutputLine {
                id: None,
                output: HostOutput::Broadcast { data: event },
            };
            if forward_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    while let Some(line) = lines.next_line().await.context("Failed to read host event")? {
        if line.trim().is_empty() {
            continue;
        }
        let (id, event) = parse_line(&line);
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %format!("{:#}", e), "Rejected host event");
                let _ = out_tx
                    .send(OutputLine {
                        id,
                        output: HostOutput::error(format!("{:#}", e)),
                    })
                    .await;
                continue;
            }
        };

        let controller = controller.clone();
        let tx = out_tx.clone();
        tasks.spawn(async move {
            let output = dispatch(&controller, event).await;
            let _ = tx.send(OutputLine { id, output }).await;
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Host event task failed");
        }
    }
    controller.wait_background().await;

    // Closing the session ends the forwarder, dropping the last sender
    controller.clients().disconnect(session_id).await;
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}
