//! Authentication commands.

use super::{Client, Globals};
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use auth_reconciler::{AuthState, Verification};
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

fn require(value: Option<String>, label: &str) -> Result<String> {
    let value = match value {
        Some(value) => value,
        None => prompt(label)?,
    };
    if value.is_empty() {
        anyhow::bail!("{} is required", label);
    }
    Ok(value)
}

fn require_password(value: Option<String>) -> Result<String> {
    let password = match value {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

pub(crate) fn print_state(state: &AuthState, format: &OutputFormat) {
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "state": state,
            "snapshot": state.snapshot(),
        })),
        OutputFormat::Text => match state {
            AuthState::Loading => println!("Auth:     resolving"),
            AuthState::Anonymous => println!("Auth:     not logged in"),
            AuthState::Authenticated { user, verification } => {
                println!("Auth:     logged in");
                output::print_row("User ID", &user.id);
                output::print_row("Name", &user.name);
                output::print_row("Email", &user.email);
                if let Some(avatar) = &user.avatar_url {
                    output::print_row("Avatar", avatar);
                }
                if *verification == Verification::ProviderClaims {
                    output::print_row("Verified", "no (backend unreachable)");
                }
            }
        },
    }
}

/// Show the reconciled authentication state.
pub async fn status(globals: &Globals, format: &OutputFormat) -> Result<()> {
    let client = Client::start(globals)?;
    let state = client.settled().await?;
    print_state(&state, format);
    Ok(())
}

/// Login with email and password.
pub async fn login(
    globals: &Globals,
    email: Option<String>,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let client = Client::start(globals)?;

    if let AuthState::Authenticated { user, .. } = client.settled().await? {
        output::print_success(&format!("Already logged in as {}", user.email), format);
        return Ok(());
    }

    let email = require(email, "Email")?;
    let password = require_password(password)?;

    let user = client
        .context
        .login(&email, &password)
        .await
        .context("Login failed")?;
    output::print_success(&format!("Logged in as {}", user.email), format);
    Ok(())
}

/// Create an account. Does not log in.
pub async fn register(
    globals: &Globals,
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let client = Client::start(globals)?;

    let name = require(name, "Name")?;
    let email = require(email, "Email")?;
    let password = require_password(password)?;

    client
        .context
        .register(&name, &email, &password)
        .await
        .context("Registration failed")?;
    output::print_success(
        &format!("Account created for {}. Log in with 'authctl login'.", email),
        format,
    );
    Ok(())
}

/// Logout and clear the stored credential.
pub async fn logout(globals: &Globals, format: &OutputFormat) -> Result<()> {
    let client = Client::start(globals)?;
    client.settled().await?;
    client.context.logout().await?;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Fetch the signed-in user's profile from the backend.
pub async fn profile(globals: &Globals, format: &OutputFormat) -> Result<()> {
    let client = Client::start(globals)?;
    if !client.settled().await?.is_authenticated() {
        anyhow::bail!("Not logged in. Run 'authctl login' first.");
    }

    let user = client.api.get_profile().await?;
    match format {
        OutputFormat::Json => output::print_json(&user),
        OutputFormat::Text => {
            output::print_row("User ID", &user.id);
            output::print_row("Name", &user.name);
            output::print_row("Email", &user.email);
        }
    }
    Ok(())
}

/// Print every state change until interrupted.
pub async fn watch(globals: &Globals, format: &OutputFormat) -> Result<()> {
    let client = Client::start(globals)?;
    let mut rx = client.context.subscribe();

    let initial = rx.borrow_and_update().clone();
    print_state(&initial, format);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state, format);
            }
        }
    }
    Ok(())
}
