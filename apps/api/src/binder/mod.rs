// Binder API: the session layer that calls the page allocator.
// Plans are applied to the local list first; the selection store is a mirror written behind.

pub mod handlers;
pub mod session;
pub mod store;
