use crate::key::FetchKey;

/// Which side of a render the current execution is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionSide {
    /// Rendering for a client; successful fetches are recorded for transfer.
    Server,
    /// Running in a client session that may adopt transferred values.
    Client,
}

/// The execution context a fetch runs in.
///
/// The fetch logic itself is context-agnostic: it asks the environment which
/// side it is on and reads or writes the transfer channel through it.
pub trait Environment: Send + Sync + 'static {
    fn side(&self) -> ExecutionSide;

    fn is_server_side(&self) -> bool {
        self.side() == ExecutionSide::Server
    }

    /// Returns the serialized value transferred for `key`, if any.
    fn read_transfer(&self, key: &FetchKey) -> Option<String>;

    /// Records a serialized value for `key` in the outgoing transfer payload.
    ///
    /// Client environments ignore writes.
    fn write_transfer(&self, key: &FetchKey, payload: String);

    /// Every `(key, serialized value)` pair recorded so far, in key order.
    fn recorded_transfers(&self) -> Vec<(FetchKey, String)> {
        Vec::new()
    }
}
