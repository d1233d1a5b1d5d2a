use crate::config::Settings;
use crate::session::TokenStore;
use anyhow::{Context as AnyhowContext, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use console::style;
use serde::Deserialize;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const CALLBACK_PORT: u16 = 9876;
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

const SERVER_DRAIN: Duration = Duration::from_secs(2);

/// What the browser handed back to the callback listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    Token(String),
    Denied {
        error: String,
        description: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Single-use slot: the first complete callback takes the sender.
type Handoff = Arc<Mutex<Option<oneshot::Sender<LoginResult>>>>;

pub fn callback_url(port: u16) -> String {
    format!("http://localhost:{port}/callback")
}

/// `<backend>/api/cli-auth?callback=<callback>`, with the callback URL-encoded.
pub fn authorize_url(backend_url: &str, callback: &str) -> Result<reqwest::Url> {
    let raw = format!("{}/api/cli-auth", backend_url.trim_end_matches('/'));
    let mut url = reqwest::Url::parse(&raw).with_context(|| format!("invalid backend URL {raw}"))?;
    url.query_pairs_mut().append_pair("callback", callback);
    Ok(url)
}

/// Serves `/callback` on `listener` until one login result arrives or `timeout` passes.
///
/// Returns `Ok(None)` on timeout. The listener is shut down either way.
pub async fn wait_for_callback(
    listener: TcpListener,
    timeout: Duration,
) -> Result<Option<LoginResult>> {
    let (result_tx, result_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handoff: Handoff = Arc::new(Mutex::new(Some(result_tx)));
    let app = Router::new()
        .route("/callback", get(handle_callback))
        .with_state(handoff);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let received = tokio::time::timeout(timeout, result_rx).await;
    let _ = stop_tx.send(());
    match tokio::time::timeout(SERVER_DRAIN, server).await {
        Ok(Ok(Err(err))) => log::warn!("Callback listener error: {err}"),
        Ok(Err(err)) => log::warn!("Callback listener task failed: {err}"),
        Err(_) => log::debug!("Callback listener did not drain in time"),
        Ok(Ok(Ok(()))) => {}
    }

    match received {
        Ok(Ok(result)) => Ok(Some(result)),
        Ok(Err(_)) => anyhow::bail!("callback listener stopped before a login result arrived"),
        Err(_) => Ok(None),
    }
}

async fn handle_callback(
    State(handoff): State<Handoff>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let token = params.token.filter(|t| !t.trim().is_empty());
    let result = match (token, params.error) {
        (Some(token), _) => LoginResult::Token(token.trim().to_string()),
        (None, Some(error)) => LoginResult::Denied {
            error,
            description: params.error_description,
        },
        (None, None) => {
            log::warn!("Callback request without token or error");
            return (
                StatusCode::BAD_REQUEST,
                Html(page("Authentication failed", "Missing token.")),
            );
        }
    };

    let (status, body) = match &result {
        LoginResult::Token(_) => (
            StatusCode::OK,
            page(
                "Authentication successful",
                "You can close this window and return to your terminal.",
            ),
        ),
        LoginResult::Denied { error, description } => (
            StatusCode::OK,
            page(
                "Authentication failed",
                description.as_deref().unwrap_or(error.as_str()),
            ),
        ),
    };

    let sender = handoff.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
            (status, Html(body))
        }
        None => (
            StatusCode::CONFLICT,
            Html(page("Already handled", "This login attempt has already completed.")),
        ),
    }
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>CodeRisk</title></head>\
         <body style=\"font-family: sans-serif; text-align: center; padding: 48px;\">\
         <h1>{}</h1><p>{}</p></body></html>",
        escape_html(title),
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Best-effort: the URL is always printed as well.
fn open_browser(url: &str) {
    let mut cmd = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        std::process::Command::new("xdg-open")
    };
    cmd.arg(url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    if let Err(err) = cmd.spawn() {
        log::warn!("Could not open a browser: {err}");
    }
}

/// Runs one browser handshake on `listener`, replacing any stored token on success.
///
/// Returns whether a token was saved.
async fn login_with(
    store: &TokenStore,
    listener: TcpListener,
    url: &reqwest::Url,
    timeout: Duration,
    open: fn(&str),
) -> Result<bool> {
    println!("Opening browser for authentication...");
    println!("If the browser does not open, visit:\n  {url}\n");
    open(url.as_str());
    println!("Waiting for authentication (timeout: {}s)...", timeout.as_secs());

    match wait_for_callback(listener, timeout).await? {
        Some(LoginResult::Token(token)) => {
            store.save(&token)?;
            println!("{}", style("Successfully authenticated!").green().bold());
            println!("Token saved to {}", store.path().display());
            Ok(true)
        }
        Some(LoginResult::Denied { error, description }) => {
            log::error!("Login denied: {error}");
            let reason = description.unwrap_or(error);
            println!("{} {reason}", style("Authentication failed:").red().bold());
            Ok(false)
        }
        None => {
            log::warn!("Login timed out");
            println!(
                "{}",
                style("Authentication timed out. Run 'crisk login' to try again.").red()
            );
            Ok(false)
        }
    }
}

pub async fn run_login(settings: &Settings) -> Result<ExitCode> {
    let store = TokenStore::new(settings.token_path());
    if store.load().is_some() {
        log::info!("Existing token at {} will be replaced", store.path().display());
        println!("Already logged in. Signing in again replaces the stored token.");
    }

    let listener = TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
        .await
        .with_context(|| format!("port {CALLBACK_PORT} is unavailable for the login callback"))?;
    let url = authorize_url(&settings.backend_url, &callback_url(CALLBACK_PORT))?;
    log::info!("Starting browser login against {}", settings.backend_url);

    if login_with(&store, listener, &url, LOGIN_TIMEOUT, open_browser).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
