// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Huddle client daemon
//!
//! Restores the stored session, keeps its tokens fresh in the background
//! and logs the upcoming events until interrupted.

use huddle::{config::Config, models::EventFilters, models::EventStatus, HuddleClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        api_url = %config.api_base_url,
        mocks = config.use_mock_services,
        persistent = config.storage_dir.is_some(),
        "Starting Huddle client"
    );

    let client = HuddleClient::build(config).await?;
    let mut session_events = client.session.subscribe();

    let authenticated = client.session.handle_app_startup().await;
    tracing::info!(authenticated, "Session restored");

    let filters = EventFilters {
        status: Some(EventStatus::Upcoming),
        ..Default::default()
    };
    match client.events.list_events(&filters).await {
        Ok(events) => {
            tracing::info!(count = events.len(), "Upcoming events loaded");
            for event in &events {
                tracing::info!(
                    event_id = %event.id,
                    title = %event.title,
                    starts_at = %huddle::time_utils::format_utc_rfc3339(event.starts_at),
                    spots_left = event.capacity.saturating_sub(event.participant_count),
                    "Upcoming event"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, code = e.code(), "Failed to load events"),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = session_events.recv() => match event {
                Ok(event) => tracing::info!(?event, "Session event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    client.session.token_manager().stop_background_refresh();
    tracing::info!("Shutting down");
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("huddle=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
