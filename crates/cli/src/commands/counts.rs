//! Badge count commands.

use tracing::{info, warn};

use basket_sync::{DomainOutcome, RefreshReport, SessionOracle, TriggerSource};
use basket_sync_core::Domain;

use super::Context;

/// Refresh once and print both counts.
///
/// # Errors
///
/// Returns an error if no session is stored. Failed queries are reported but
/// are not errors: the count is shown as last known.
pub async fn show(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    require_session(context)?;

    let report = context.sync.refresh().await;
    log_report(&report);

    let counts = context.sync.read();
    info!(
        cart = counts.cart_count,
        wishlist = counts.wishlist_count,
        "Badge counts"
    );
    Ok(())
}

/// Run the synchronizer and log every count change until Ctrl-C.
///
/// Logins, logouts and mutations from other `bsync` processes on the same
/// session file trigger a refresh within a second.
///
/// # Errors
///
/// Returns an error if no session is stored or the signal handler cannot be
/// installed.
pub async fn watch(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    require_session(context)?;

    let mut changes = context.sync.subscribe();
    let mut failures = context.sync.subscribe_failures();
    let handle = context.sync.start();
    let other_processes = context
        .other_processes()
        .spawn(context.sync.notifier().clone());
    info!(
        refresh_interval_secs = context.config.refresh_interval.as_secs(),
        "Watching counts, press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *changes.borrow_and_update();
                info!(
                    cart = snapshot.counters.cart_count,
                    wishlist = snapshot.counters.wishlist_count,
                    cart_freshness = ?snapshot.cart,
                    wishlist_freshness = ?snapshot.wishlist,
                    "Counts changed"
                );
            }
            Ok(failure) = failures.recv() => {
                warn!(domain = %failure.domain, error = %failure.error, "Refresh failed");
            }
        }
    }

    other_processes.abort();
    handle.shutdown();
    Ok(())
}

fn require_session(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    if context.session.is_authenticated() {
        Ok(())
    } else {
        Err("not signed in; run `bsync login` first".into())
    }
}

fn log_report(report: &RefreshReport) {
    for domain in Domain::ALL {
        match report.get(domain) {
            DomainOutcome::Applied(count) => info!(domain = %domain, count, "Confirmed"),
            DomainOutcome::Failed => warn!(domain = %domain, "Refresh failed, showing last known count"),
            DomainOutcome::SignedOut => warn!(domain = %domain, "Session ended"),
            DomainOutcome::Discarded | DomainOutcome::Closed => {}
        }
    }
}
