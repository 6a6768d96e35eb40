use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

/// Runs SDK futures to completion behind a synchronous port.
#[derive(Clone)]
pub enum BlockingBridge {
    /// A runtime owned by a synchronous caller such as the provisioning CLI.
    Owned(Arc<Runtime>),
    /// The runtime the current task already runs on. Requires the
    /// multi-threaded scheduler.
    Ambient,
}

impl BlockingBridge {
    pub fn owned() -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread().enable_all().build()?;
        Ok(Self::Owned(Arc::new(runtime)))
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match self {
            Self::Owned(runtime) => runtime.block_on(future),
            Self::Ambient => {
                tokio::task::block_in_place(|| Handle::current().block_on(future))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_bridge_runs_futures_from_sync_code() {
        let bridge = BlockingBridge::owned().expect("runtime should build");
        assert_eq!(bridge.block_on(async { 40 + 2 }), 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ambient_bridge_reuses_current_runtime() {
        let bridge = BlockingBridge::Ambient;
        assert_eq!(bridge.block_on(async { "ok" }), "ok");
    }
}
