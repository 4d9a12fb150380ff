//! Ambient request context
//!
//! Makes a [`RequestContext`] visible to every function in a logical call
//! chain without threading it through signatures. The context is stored in
//! a tokio task-local, so it follows the future across `.await` points but
//! not into other tasks; use [`in_current_context`] when spawning.
//!
//! Outside any scope the accessors return the "no context" defaults: no
//! user, a freshly generated request id and source `SYSTEM`. Nothing in
//! this module fails or panics.
//!
//! # Example
//!
//! ```
//! use govspine_core::context::{current_user_id, run_with_context};
//! use govspine_core::domain::{RequestContext, UserId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let user = UserId::new();
//! let seen = run_with_context(RequestContext::new(Some(user)), async {
//!     current_user_id()
//! })
//! .await;
//! assert_eq!(seen, Some(user));
//! assert_eq!(current_user_id(), None);
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::domain::{RequestContext, RequestId, RequestSource, UserId};

tokio::task_local! {
    static CURRENT: Arc<RequestContext>;
}

/// Runs `fut` with `ctx` as the ambient context.
///
/// A nested call shadows the outer context for the duration of the inner
/// future; the outer one is visible again once it completes.
pub async fn run_with_context<F>(ctx: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(Arc::new(ctx), fut).await
}

/// Synchronous form of [`run_with_context`]
pub fn run_with_context_sync<R>(ctx: RequestContext, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(Arc::new(ctx), f)
}

/// Runs `fut` inside an already shared context
pub async fn run_with_shared_context<F>(ctx: Arc<RequestContext>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// The active context, if any
pub fn current_context() -> Option<Arc<RequestContext>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// The acting user of the active context
pub fn current_user_id() -> Option<UserId> {
    CURRENT.try_with(|ctx| ctx.user_id()).ok().flatten()
}

/// The active request id, or a fresh one when there is no context
pub fn request_id() -> RequestId {
    CURRENT
        .try_with(|ctx| ctx.request_id())
        .unwrap_or_else(|_| RequestId::new())
}

/// The active request source, `SYSTEM` when there is no context
pub fn request_source() -> RequestSource {
    CURRENT
        .try_with(|ctx| ctx.source())
        .unwrap_or(RequestSource::System)
}

/// Captures the active context so `fut` sees it when polled on another task.
///
/// Without an active context the future runs unscoped.
pub fn in_current_context<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let ctx = current_context();
    async move {
        match ctx {
            Some(ctx) => CURRENT.scope(ctx, fut).await,
            None => fut.await,
        }
    }
}
