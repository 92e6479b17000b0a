//! One function per subcommand.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::debug;

use shellcache_core::header::ACCEPT;
use shellcache_core::{
    ClientMessage, ClientSession, ControllerEvent, MessageReply, Request, RouteOutcome, Url,
};

use crate::Host;

/// Print events the controller broadcast while a command ran
fn print_events(host: &Host, session: &mut ClientSession) {
    for event in session.drain() {
        eprintln!("{}", describe_event(host, &event));
    }
}

fn describe_event(host: &Host, event: &ControllerEvent) -> String {
    match event {
        ControllerEvent::SwActivated { version } => {
            host.t("events.activated", &[("version", version)])
        }
        ControllerEvent::UpdateAvailable { url: Some(url), .. } => {
            host.t("events.update_available", &[("url", url)])
        }
        ControllerEvent::UpdateAvailable { url: None, .. } => {
            host.t("events.update_available_all", &[])
        }
        ControllerEvent::UpdateCheckStarted { .. } => host.t("events.check_started", &[]),
        ControllerEvent::NoUpdates { .. } => host.t("events.no_updates", &[]),
        ControllerEvent::UpdateCheckFailed { error, .. } => {
            host.t("events.check_failed", &[("error", error)])
        }
    }
}

/// Resolve an absolute URL, or a path relative to the configured scope
fn resolve_url(host: &Host, input: &str) -> Result<Url> {
    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(_) => Ok(host.controller.settings().resolve(input)?),
    }
}

pub async fn install(host: &Host) -> Result<()> {
    let controller = &host.controller;
    let mut session = controller.clients().connect().await;

    let report = controller.handle_install().await;
    let stored = report.stored.to_string();
    let total = report.total.to_string();
    println!(
        "{}",
        host.t(
            "install.settled",
            &[("version", &report.version), ("stored", &stored), ("total", &total)],
        )
    );
    if let Some(ref error) = report.setup_error {
        println!("{}", host.t("install.setup_failed", &[("error", error)]));
    }
    for failure in &report.failed {
        println!(
            "{}",
            host.t(
                "install.failed_resource",
                &[("url", &failure.url), ("reason", &failure.reason)],
            )
        );
    }

    if !controller.settings().skip_waiting {
        println!("{}", host.t("install.waiting", &[("version", &report.version)]));
        return Ok(());
    }

    match controller.handle_activate().await? {
        Some(activation) => {
            let evicted = activation.evicted.len().to_string();
            println!(
                "{}",
                host.t(
                    "activate.done",
                    &[("version", &activation.version), ("evicted", &evicted)],
                )
            );
            for version in &activation.eviction_failures {
                println!("{}", host.t("activate.eviction_failed", &[("version", version)]));
            }
        }
        None => println!("{}", host.t("activate.nothing_waiting", &[])),
    }
    print_events(host, &mut session);
    Ok(())
}

pub async fn get(host: &Host, input: &str, navigate: bool, accept: Option<&str>) -> Result<()> {
    let controller = &host.controller;
    controller.resume().await?;
    let mut session = controller.clients().connect().await;

    let url = resolve_url(host, input)?;
    let mut request = if navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    };
    if let Some(accept) = accept {
        request = request.with_header(
            ACCEPT,
            accept.parse().context("Invalid Accept header")?,
        );
    }

    let outcome = controller
        .handle_fetch(&request)
        .await
        .with_context(|| format!("Request for {} failed", request.url))?;
    match outcome {
        RouteOutcome::Passthrough => eprintln!("{}", host.t("fetch.passthrough", &[])),
        RouteOutcome::Respond { response, source } => {
            let status = response.status.to_string();
            let source = format!("{:?}", source).to_lowercase();
            eprintln!(
                "{}",
                host.t("fetch.served", &[("status", &status), ("source", &source)])
            );
            std::io::stdout()
                .write_all(&response.body)
                .context("Failed to write response body")?;
        }
    }

    controller.wait_background().await;
    print_events(host, &mut session);
    Ok(())
}

pub async fn check(host: &Host) -> Result<()> {
    let controller = &host.controller;
    controller.resume().await?;
    let mut session = controller.clients().connect().await;

    // Failures are reported through the UPDATE_CHECK_FAILED event
    if let Err(e) = controller.check_for_updates().await {
        debug!(error = %e, "Update check did not run");
    }
    print_events(host, &mut session);
    Ok(())
}

pub async fn status(host: &Host) -> Result<()> {
    let controller = &host.controller;
    controller.resume().await?;

    match controller.handle_message(ClientMessage::GetCacheName).await {
        Some(MessageReply::CacheName {
            cache_name: Some(name),
            exists,
            ready,
        }) => {
            let exists = exists.to_string();
            let ready = ready.to_string();
            println!(
                "{}",
                host.t(
                    "status.current",
                    &[("name", &name), ("exists", &exists), ("ready", &ready)],
                )
            );
        }
        _ => println!("{}", host.t("status.none", &[])),
    }
    Ok(())
}

pub async fn stats(host: &Host) -> Result<()> {
    let controller = &host.controller;
    controller.resume().await?;

    let Some(MessageReply::CacheStats {
        cache_name: Some(name),
        count,
        ..
    }) = controller.handle_message(ClientMessage::GetCacheStats).await
    else {
        println!("{}", host.t("status.none", &[]));
        return Ok(());
    };

    let count = count.to_string();
    println!("{}", host.t("stats.summary", &[("name", &name), ("count", &count)]));
    for entry in controller.cache_entries().await? {
        let size = entry.response.body.len().to_string();
        let age = entry.age_display();
        println!(
            "{}",
            host.t("stats.entry", &[("url", &entry.url), ("size", &size), ("age", &age)])
        );
    }
    Ok(())
}

pub async fn message(host: &Host, json: &str) -> Result<()> {
    let message: ClientMessage =
        serde_json::from_str(json).context("Invalid control message")?;
    let controller = &host.controller;
    controller.resume().await?;
    let mut session = controller.clients().connect().await;

    if let Some(reply) = controller.handle_message(message).await {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    }
    controller.wait_background().await;
    for event in session.drain() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
