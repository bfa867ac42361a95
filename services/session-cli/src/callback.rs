//! Local callback listener for `login --listen`
//!
//! Serves the callback path on the configured origin until one provider
//! redirect has been handled, then shuts down. Requests without `code` or
//! `error` (browser prefetches, reloads) are answered but do not end the wait.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use session_auth::LoginFlow;
use session_auth::constants::CALLBACK_PATH;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

#[derive(Clone)]
struct CallbackState {
    flow: LoginFlow,
    origin: Url,
    done: Arc<Mutex<Option<oneshot::Sender<bool>>>>,
}

impl CallbackState {
    fn finish(&self, signed_in: bool) {
        let sender = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(signed_in);
        }
    }
}

/// Socket address the origin URL points at.
pub fn listen_addr(origin: &Url) -> Result<SocketAddr> {
    let addrs = origin
        .socket_addrs(|| None)
        .map_err(|e| Error::Listener(format!("cannot resolve origin {origin}: {e}")))?;
    addrs
        .into_iter()
        .next()
        .ok_or_else(|| Error::Listener(format!("origin {origin} has no address")))
}

fn router(state: CallbackState) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(callback_handler))
        .with_state(state)
}

/// Bind the origin's address and wait for one callback.
///
/// Returns whether the login completed. The listener is gone when this returns.
pub async fn await_callback(flow: LoginFlow, timeout: Duration) -> Result<bool> {
    let origin = Url::parse(&flow.config().origin)
        .map_err(|e| Error::Listener(format!("invalid origin: {e}")))?;
    let addr = listen_addr(&origin)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Listener(format!("bind {addr}: {e}")))?;
    info!(%addr, path = CALLBACK_PATH, "waiting for login callback");

    serve_once(listener, flow, origin, timeout).await
}

async fn serve_once(
    listener: TcpListener,
    flow: LoginFlow,
    origin: Url,
    timeout: Duration,
) -> Result<bool> {
    let (tx, rx) = oneshot::channel();
    let state = CallbackState {
        flow,
        origin,
        done: Arc::new(Mutex::new(Some(tx))),
    };

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(timeout, rx).await;
    let _ = stop_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "callback listener error"),
        Err(e) => warn!(error = %e, "callback listener task failed"),
    }

    match outcome {
        Ok(Ok(signed_in)) => Ok(signed_in),
        Ok(Err(_)) => Ok(false),
        Err(_) => Err(Error::CallbackTimeout(timeout.as_secs())),
    }
}

async fn callback_handler(
    State(state): State<CallbackState>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let callback_url = match state.origin.join(&uri.to_string()) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "unparseable callback request");
            return (StatusCode::BAD_REQUEST, "bad callback URL").into_response();
        }
    };

    let param = |name: &str| {
        callback_url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        warn!(%error, "provider returned an error");
        state.finish(false);
        return (
            StatusCode::BAD_REQUEST,
            Html(format!("<p>Sign-in failed: {}</p>", escape(&error))),
        )
            .into_response();
    }
    if param("code").is_none_or(|c| c.is_empty()) {
        return (StatusCode::BAD_REQUEST, "missing code").into_response();
    }

    let signed_in = state.flow.complete_login(&callback_url).await;
    state.finish(signed_in);
    if signed_in {
        Html("<p>Signed in. You can close this tab.</p>").into_response()
    } else {
        (
            StatusCode::BAD_GATEWAY,
            Html("<p>Sign-in failed. Check the terminal for details.</p>"),
        )
            .into_response()
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
