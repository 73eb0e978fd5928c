//! Standalone CLI for watching a live event session
//!
//! Run with: cargo run --features cli --bin live-cli

use live_event_viewer::{LiveEventSession, SessionPhase, Settings, ViewState};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,live_event_viewer=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let settings = Settings::from_env();
    info!(
        config_url = %settings.config_url,
        presence_url = %settings.presence_url,
        signaling_url = %settings.signaling_url,
        "Starting live event session"
    );

    let started = std::time::Instant::now();
    let session = LiveEventSession::connect(settings);
    let mut view = session.view();
    let mut last = view.borrow().clone();
    let mut stats_interval = tokio::time::interval(std::time::Duration::from_secs(5));
    let mut changes_last_interval = 0u64;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    warn!("Session ended");
                    break;
                }
                let current = view.borrow_and_update().clone();
                log_changes(&last, &current);
                last = current;
                changes_last_interval += 1;
            }
            _ = stats_interval.tick() => {
                info!(
                    uptime = format!("{}s", started.elapsed().as_secs()),
                    status = ?last.status.map(|s| s.as_str()),
                    countdown = ?last.countdown.map(|c| c.to_string()),
                    viewers = last.presence.viewer_count,
                    messages = last.presence.messages.len(),
                    presentation = ?last.presentation.as_ref().map(|p| p.name()),
                    "/5s" = changes_last_interval,
                    "stats"
                );
                changes_last_interval = 0;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn log_changes(prev: &ViewState, next: &ViewState) {
    if prev.phase != next.phase {
        match &next.phase {
            SessionPhase::Loading => info!("Loading event"),
            SessionPhase::NoEvent(reason) => warn!(reason = %reason, "No event scheduled"),
            SessionPhase::Ready => info!(
                event_id = ?next.config.as_ref().map(|c| c.id.as_str()),
                username = %next.username,
                "Event loaded"
            ),
        }
    }
    if prev.status != next.status {
        info!(status = ?next.status.map(|s| s.as_str()), "Status changed");
    }
    if prev.presentation != next.presentation {
        info!(presentation = ?next.presentation, "Presentation changed");
    }
    if prev.presence.viewer_count != next.presence.viewer_count {
        info!(viewers = next.presence.viewer_count, "Viewer count");
    }
    if let Some(msg) = next.presence.messages.back() {
        if prev.presence.messages.back() != Some(msg) {
            info!(author = %msg.author, text = %msg.text, "Chat");
        }
    }
    if prev.warning != next.warning {
        if let Some(w) = &next.warning {
            warn!(warning = %w, "Peer advisory");
        }
    }
}
