//! fuser calls into `Filesystem` on its own threads and expects an answer
//! before returning; `KvFs` is async. Every `do_*` call parks its thread on
//! one shared tokio runtime until the store round-trip finishes.

use std::future::Future;
use std::sync::OnceLock;

use kvfs_core::{FsError, FsResult};
use tokio::runtime::{Builder, Runtime};

const WORKERS: usize = 4;

/// Built at most once; a build failure is kept so later callers see it too.
static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();

fn build() -> Result<Runtime, String> {
    Builder::new_multi_thread()
        .worker_threads(WORKERS)
        .thread_name("kvfs-fuse-worker")
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
}

/// Start the store runtime. Safe to call repeatedly; only the first call
/// builds anything.
pub fn init_runtime() -> FsResult<&'static Runtime> {
    RUNTIME
        .get_or_init(build)
        .as_ref()
        .map_err(|e| FsError::Io(format!("cannot start kvfs store runtime: {}", e)))
}

/// The store runtime, once [`init_runtime`] has run.
pub fn runtime() -> FsResult<&'static Runtime> {
    match RUNTIME.get() {
        Some(Ok(rt)) => Ok(rt),
        Some(Err(e)) => Err(FsError::Io(format!("kvfs store runtime is unusable: {}", e))),
        None => Err(FsError::Io("kvfs store runtime was never started".to_string())),
    }
}

/// Drive `future` to completion from a FUSE thread.
///
/// Panics inside tokio if called from a runtime worker.
pub fn block_on<F, T>(future: F) -> FsResult<T>
where
    F: Future<Output = T>,
{
    Ok(runtime()?.block_on(future))
}

/// [`block_on`] for futures that already yield an `FsResult`.
pub fn run<F, T>(future: F) -> FsResult<T>
where
    F: Future<Output = FsResult<T>>,
{
    block_on(future)?
}
