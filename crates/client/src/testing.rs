//! Scripted origins for tests.
//!
//! [`ScriptedUpstream`] answers each GET from a per-host queue of outcomes,
//! falling back to a per-host default once the queue is empty. Every call is
//! logged with the (possibly paused) tokio clock so backoff can be asserted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::fetch::{FetchError, FetchResponse, Upstream};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Outcome {
    Respond { status: StatusCode, headers: HeaderMap, body: Bytes },
    Fail(FetchError),
}

impl Outcome {
    /// Empty-bodied response with `status`.
    pub fn status(status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Outcome::Respond { status, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// JSON response.
    pub fn json(status: u16, body: &'static str) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Outcome::Respond { status, headers, body: Bytes::from_static(body.as_bytes()) }
    }

    /// Connection failure.
    pub fn network() -> Self {
        Outcome::Fail(FetchError::Network("connection refused".to_string()))
    }
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Outcome>>,
    defaults: HashMap<String, Outcome>,
    calls: Vec<(Url, Instant)>,
}

/// An [`Upstream`] that replays scripted outcomes.
pub struct ScriptedUpstream {
    script: Mutex<Script>,
    gate: watch::Sender<bool>,
}

impl Default for ScriptedUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self { script: Mutex::new(Script::default()), gate }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue an outcome for the next call to `host`.
    pub fn push(&self, host: &str, outcome: Outcome) {
        self.script().queued.entry(host.to_string()).or_default().push_back(outcome);
    }

    /// Outcome for `host` once its queue is empty.
    pub fn set_default(&self, host: &str, outcome: Outcome) {
        self.script().defaults.insert(host.to_string(), outcome);
    }

    /// Make calls wait until [`release`](Self::release). Calls are logged before waiting.
    pub fn hold(&self) {
        self.gate.send_replace(true);
    }

    pub fn release(&self) {
        self.gate.send_replace(false);
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<Url> {
        self.script().calls.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Clock readings of each call.
    pub fn call_times(&self) -> Vec<Instant> {
        self.script().calls.iter().map(|(_, at)| *at).collect()
    }

    pub fn call_count(&self) -> usize {
        self.script().calls.len()
    }

    pub fn calls_to(&self, host: &str) -> usize {
        self.script().calls.iter().filter(|(url, _)| url.host_str() == Some(host)).count()
    }

    fn next_outcome(&self, url: &Url) -> Outcome {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut script = self.script();
        script.calls.push((url.clone(), Instant::now()));

        if let Some(outcome) = script.queued.get_mut(&host).and_then(VecDeque::pop_front) {
            return outcome;
        }
        script
            .defaults
            .get(&host)
            .cloned()
            .unwrap_or_else(|| Outcome::Fail(FetchError::Network(format!("no scripted outcome for {host}"))))
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let outcome = self.next_outcome(url);

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|held| !held).await.is_err() {
            return Err(FetchError::Network("scripted upstream dropped".to_string()));
        }

        match outcome {
            Outcome::Respond { status, headers, body } => {
                Ok(FetchResponse { url: url.clone(), status, headers, bytes: body, fetch_ms: 0 })
            }
            Outcome::Fail(e) => Err(e),
        }
    }
}
