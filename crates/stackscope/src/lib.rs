//! Call-chain-scoped implicit bindings.
//!
//! A value established with [`with_binding`] is visible to everything the
//! wrapped continuation calls, directly or indirectly, without being passed
//! as a parameter, and the binding reverts when the continuation returns.
//! No per-call storage is allocated: the binding's 64-bit identifier is
//! encoded into the shape of the call stack by a chain of relay call frames
//! and recovered at lookup time by walking the live stack (see `relay` and
//! `decode`).
//!
//! Bindings are scoped to one call chain. A thread spawned inside the
//! continuation has its own stack and does not inherit the caller's binding.
//!
//! ```
//! use std::sync::Arc;
//!
//! stackscope::with_binding("alpha", || {
//!     let v: Arc<&str> = stackscope::binding().unwrap();
//!     assert_eq!(*v, "alpha");
//! });
//! assert!(stackscope::binding::<&str>().is_none());
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

mod decode;
mod relay;
mod store;

pub use decode::table_self_check;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Identifiers are unique among all currently active scopes; monotonic
/// assignment makes reuse tracking unnecessary. Exhausting 64 bits is not a
/// practical concern.
fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// Removes the store entry on every exit path from the continuation,
/// including unwinds, so no binding outlives its scope.
struct Cleanup(u64);

impl Drop for Cleanup {
    fn drop(&mut self) {
        store::global().delete(self.0);
    }
}

/// Runs `f` with `value` bound for its dynamic extent.
///
/// Calls to [`binding`] or [`binding_any`] made anywhere inside `f`, through
/// any number of intervening ordinary calls, see `value` unless a nested
/// `with_binding` is active, in which case the innermost one wins.
pub fn with_binding<T, R, F>(value: T, f: F) -> R
where
    T: Any + Send + Sync,
    F: FnOnce() -> R,
{
    let id = next_id();
    store::global().store(id, Arc::new(value));
    let _cleanup = Cleanup(id);

    let mut result = None;
    let mut f = Some(f);
    relay::encode(id, &mut || {
        let f = f.take().expect("continuation runs once");
        result = Some(f());
    });
    result.expect("continuation ran")
}

/// Returns the innermost currently bound value, downcast to `T`.
///
/// `None` when no scope encloses the caller on this call chain, or when the
/// innermost bound value is not a `T`.
pub fn binding<T: Any + Send + Sync>() -> Option<Arc<T>> {
    binding_any().and_then(|value| value.downcast::<T>().ok())
}

/// Returns the innermost currently bound value without downcasting.
pub fn binding_any() -> Option<Arc<dyn Any + Send + Sync>> {
    let id = decode::decode()?;
    store::global().load(id)
}
