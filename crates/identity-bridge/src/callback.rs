//! Loopback listener for browser-based sign-in.
//!
//! The browser flow ends with a redirect to
//! `http://localhost:<port>/callback?id_token=…&uid=…` (or `?error=…`).
//! The listener answers that one request with a small HTML page and hands
//! back the resulting [`FederatedSession`].

use crate::{FederatedSession, ProviderError, ProviderResult};
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

/// Lifetime assumed when the callback omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound on an `expires_in` taken from the callback.
const MAX_EXPIRES_IN_SECS: i64 = 86_400;

/// Request line plus headers; anything longer is cut off.
const MAX_REQUEST_HEAD_BYTES: u64 = 16 * 1024;

/// A bound callback listener, ready for one sign-in redirect.
pub struct CallbackListener {
    listener: TcpListener,
    timeout: Duration,
}

impl CallbackListener {
    /// Bind on `127.0.0.1:port`. Port 0 picks a free port.
    pub async fn bind(port: u16, timeout: Duration) -> ProviderResult<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ProviderError::Callback(format!("failed to bind to {}: {}", addr, e))
        })?;
        Ok(Self { listener, timeout })
    }

    pub fn local_addr(&self) -> ProviderResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The redirect target to hand to the browser flow.
    pub fn callback_url(&self) -> ProviderResult<String> {
        Ok(format!(
            "http://localhost:{}/callback",
            self.local_addr()?.port()
        ))
    }

    /// Wait for the callback and turn it into a session.
    ///
    /// Requests for other paths are answered with 404 and ignored.
    pub async fn wait_for_session(self) -> ProviderResult<FederatedSession> {
        info!(addr = ?self.listener.local_addr().ok(), "Waiting for sign-in callback");

        match tokio::time::timeout(self.timeout, accept_callback(&self.listener)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Sign-in callback timed out");
                Err(ProviderError::Timeout)
            }
        }
    }
}

async fn accept_callback(listener: &TcpListener) -> ProviderResult<FederatedSession> {
    loop {
        let (socket, peer) = listener.accept().await?;
        debug!(peer = %peer, "Callback connection");
        match handle_connection(socket).await {
            Ok(Some(outcome)) => return outcome,
            Ok(None) => {}
            Err(e) => warn!(peer = %peer, error = %e, "Error handling callback connection"),
        }
    }
}

/// `Ok(None)` when the request was not the callback.
async fn handle_connection(
    mut socket: TcpStream,
) -> ProviderResult<Option<ProviderResult<FederatedSession>>> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_HEAD_BYTES));
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers so the socket closes cleanly.
    let mut header_line = String::new();
    loop {
        header_line.clear();
        let read = reader.read_line(&mut header_line).await?;
        if read == 0 || header_line.trim().is_empty() {
            break;
        }
    }

    let Some(target) = request_line
        .strip_prefix("GET ")
        .and_then(|rest| rest.split_whitespace().next())
    else {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    };

    let params = match parse_callback_target(target) {
        Some(params) => params,
        None => {
            send_response(&mut writer, 404, "Not Found", "Not Found").await?;
            return Ok(None);
        }
    };

    let outcome = session_from_params(&params);
    let page = match &outcome {
        Ok(_) => success_page(),
        Err(e) => error_page(&e.to_string()),
    };
    send_response(&mut writer, 200, "OK", &page).await?;

    Ok(Some(outcome))
}

/// Query parameters of a `/callback` request target, decoded.
fn parse_callback_target(target: &str) -> Option<HashMap<String, String>> {
    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;
    if url.path() != "/callback" {
        return None;
    }
    Some(url.query_pairs().into_owned().collect())
}

fn session_from_params(params: &HashMap<String, String>) -> ProviderResult<FederatedSession> {
    if let Some(error) = params.get("error") {
        return Err(ProviderError::Callback(error.clone()));
    }

    let (Some(id_token), Some(uid)) = (
        params.get("id_token").filter(|v| !v.is_empty()),
        params.get("uid").filter(|v| !v.is_empty()),
    ) else {
        return Err(ProviderError::Callback(
            "missing required parameters".to_string(),
        ));
    };

    let expires_in = params
        .get("expires_in")
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
        .clamp(0, MAX_EXPIRES_IN_SECS);

    let mut session =
        FederatedSession::new(uid.clone(), id_token.clone(), ChronoDuration::seconds(expires_in));
    let optional = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
    session.display_name = optional("name");
    session.email = optional("email");
    session.photo_url = optional("photo_url");
    Ok(session)
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> ProviderResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>authsync - Signed in</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1 style="color: #22c55e;">Signed in</h1>
<p>You can close this window and return to the terminal.</p>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>authsync - Sign-in failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1 style="color: #ef4444;">Sign-in failed</h1>
<p>{}</p>
<p style="color: #888;">You can close this window and try again.</p>
</body>
</html>"#,
        escape_html(error)
    )
}

fn escape_html(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}
