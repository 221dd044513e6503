//! ABOUTME: The dedicated multi-thread runtime backing `Isolation::DedicatedRuntime`
//! ABOUTME: Lazily started once per process, shared by every breaker that asks for it

use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Handle, Runtime};

static DEDICATED_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn handle() -> Handle {
    DEDICATED_RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("orbit-breaker-isolated")
                .enable_all()
                .build()
                .expect("failed to start dedicated circuit breaker runtime")
        })
        .handle()
        .clone()
}

/// Runs `fut` to completion on the dedicated runtime, blocking the current
/// task until it resolves. Spawning rather than calling `block_on` directly
/// lets the dedicated runtime's own scheduler manage the future even when
/// invoked from within another Tokio runtime's task.
pub(crate) async fn run_on_dedicated_runtime<Fut, T>(fut: Fut) -> anyhow::Result<T>
where
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    handle()
        .spawn(fut)
        .await
        .unwrap_or_else(|e| Err(anyhow::anyhow!("dedicated runtime task panicked: {e}")))
}
