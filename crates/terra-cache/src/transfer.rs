use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use terra_core::{Environment, ExecutionSide, FetchKey};
use tracing::trace;

/// Values handed from a server-side render to the client, keyed by fetch key.
///
/// Each value is the JSON text of one resolved fetch. The whole payload
/// serializes to a flat JSON object so the templating layer can embed it in
/// the initial page as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferPayload(BTreeMap<String, String>);

impl TransferPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &FetchKey, value: impl Into<String>) {
        self.0.insert(key.as_str().to_string(), value.into());
    }

    pub fn get(&self, key: &FetchKey) -> Option<&str> {
        self.0.get(key.as_str()).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn entries(&self) -> Vec<(FetchKey, String)> {
        self.0
            .iter()
            .filter_map(|(key, value)| Some((FetchKey::new(key.as_str()).ok()?, value.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Environment of a server-side render: collects the outgoing payload.
#[derive(Debug, Default)]
pub struct ServerEnvironment {
    payload: Mutex<TransferPayload>,
}

impl ServerEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn payload(&self) -> TransferPayload {
        self.payload.lock().clone()
    }
}

impl Environment for ServerEnvironment {
    fn side(&self) -> ExecutionSide {
        ExecutionSide::Server
    }

    fn read_transfer(&self, _key: &FetchKey) -> Option<String> {
        None
    }

    fn write_transfer(&self, key: &FetchKey, payload: String) {
        trace!(key = %key, bytes = payload.len(), "recording transfer value");
        self.payload.lock().insert(key, payload);
    }

    fn recorded_transfers(&self) -> Vec<(FetchKey, String)> {
        self.payload.lock().entries()
    }
}

/// Environment of a client session, reading a payload produced by a server.
#[derive(Debug, Clone, Default)]
pub struct ClientEnvironment {
    payload: TransferPayload,
}

impl ClientEnvironment {
    pub fn new(payload: TransferPayload) -> Self {
        Self { payload }
    }

    /// A client session that was not server-rendered.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        TransferPayload::from_json(json).map(Self::new)
    }
}

impl Environment for ClientEnvironment {
    fn side(&self) -> ExecutionSide {
        ExecutionSide::Client
    }

    fn read_transfer(&self, key: &FetchKey) -> Option<String> {
        self.payload.get(key).map(str::to_string)
    }

    fn write_transfer(&self, _key: &FetchKey, _payload: String) {}
}
