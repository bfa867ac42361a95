//! Shared helpers for unit tests.

use std::sync::{Arc, Mutex};

use session_auth::{KeyValueStore, MemoryStore, Session};
use tokio::net::TcpListener;

use crate::client::ApiClient;
use crate::notice::{Notice, NoticeSink};

/// An axum app served on an ephemeral local port, stopped on drop.
pub struct MockServer {
    pub url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start(app: axum::Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{addr}"),
            handle,
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Sink that keeps every notice for assertions.
#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NoticeSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Client against `base` whose session store starts with `entries`.
pub fn client_with(
    base: &str,
    entries: &[(&str, &str)],
) -> (ApiClient, Arc<MemoryStore>, Arc<RecordingSink>) {
    let store = Arc::new(MemoryStore::new());
    store.set_all(entries).unwrap();
    let sink = Arc::new(RecordingSink::default());
    let client = ApiClient::new(
        reqwest::Client::new(),
        base,
        Session::new(store.clone()),
        sink.clone(),
    );
    (client, store, sink)
}
