//! Browser-based federated sign-in.

use super::auth::print_state;
use super::{Client, Globals};
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use identity_bridge::CallbackListener;
use tracing::{info, warn};
use url::Url;

/// Sign in through the identity provider's hosted page.
///
/// A loopback listener receives the redirect, the session is handed to the
/// local provider, and the command waits for the reconciler to settle.
pub async fn federated_login(
    globals: &Globals,
    sign_in_url: &str,
    no_browser: bool,
    format: &OutputFormat,
) -> Result<()> {
    let client = Client::start(globals)?;
    client.settled().await?;

    let listener =
        CallbackListener::bind(client.config.callback_port, client.config.callback_timeout())
            .await?;
    let redirect = listener.callback_url()?;

    let mut url = Url::parse(sign_in_url).context("invalid sign-in URL")?;
    url.query_pairs_mut().append_pair("redirect_uri", &redirect);

    if no_browser {
        println!("Open this URL to sign in:\n\n  {}\n", url);
    } else {
        println!("Opening browser for sign-in...");
        if let Err(e) = open::that(url.as_str()) {
            warn!(error = %e, "Failed to open browser");
            println!("Open this URL to sign in:\n\n  {}\n", url);
        }
    }
    println!("Waiting for sign-in (listening on {})...", redirect);

    let session = listener.wait_for_session().await?;
    info!(uid = %session.uid, "Received federated session");

    let mut rx = client.context.subscribe();
    rx.mark_unchanged();
    client.provider.sign_in(session);

    // First change is the reconciler picking up the new session.
    rx.changed()
        .await
        .context("auth reconciler stopped unexpectedly")?;
    let state = rx
        .wait_for(|state| !state.is_loading())
        .await
        .context("auth reconciler stopped unexpectedly")?
        .clone();

    if !state.is_authenticated() {
        anyhow::bail!("Federated sign-in was not accepted");
    }
    print_state(&state, format);
    Ok(())
}
