//! Session management commands.

use tracing::info;

use basket_sync::{Credentials, SessionOracle, UserRecord};
use basket_sync_core::UserId;

use super::Context;

/// Persist a signed-in session.
///
/// # Errors
///
/// Returns an error if the session file cannot be written.
pub fn login(
    context: &Context,
    token: String,
    user_id: String,
    name: Option<String>,
    phone: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if token.trim().is_empty() {
        return Err("token cannot be empty".into());
    }

    let user = UserRecord {
        id: UserId::new(user_id),
        name,
        phone,
    };
    context.session.login(Credentials::new(token, user))?;

    info!(
        api_url = %context.config.api_url,
        "Signed in; run `bsync counts` to fetch badge counts"
    );
    Ok(())
}

/// Clear the persisted session.
///
/// # Errors
///
/// Returns an error if the session file cannot be removed.
pub fn logout(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    if !context.session.is_authenticated() {
        info!("No active session");
        return Ok(());
    }
    context.session.logout()?;
    info!("Signed out");
    Ok(())
}
