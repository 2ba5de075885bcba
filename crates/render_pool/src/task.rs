//! Render tasks and pending-result handles

use bytes::Bytes;
use contracts::{ContractError, RenderRequest};
use tokio::sync::oneshot;

/// One queued rendering job. Owned by the pool from submit until a worker
/// resolves it or shutdown fails it.
pub(crate) struct RenderTask {
    pub id: u64,
    pub request: RenderRequest,
    reply: oneshot::Sender<Result<Bytes, ContractError>>,
}

impl RenderTask {
    pub fn new(id: u64, request: RenderRequest) -> (Self, RenderHandle) {
        let (reply, rx) = oneshot::channel();
        (Self { id, request, reply }, RenderHandle { id, rx })
    }

    /// Resolve the task exactly once. A vanished caller is not an error.
    pub fn complete(self, result: Result<Bytes, ContractError>) {
        let _ = self.reply.send(result);
    }
}

/// Pending-result handle returned by `submit`, resolved exactly once.
pub struct RenderHandle {
    id: u64,
    rx: oneshot::Receiver<Result<Bytes, ContractError>>,
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl RenderHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Await the task outcome. A dropped reply (worker torn down during
    /// shutdown) surfaces as `PoolShutdown`.
    pub async fn await_result(self) -> Result<Bytes, ContractError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(ContractError::PoolShutdown),
        }
    }
}
