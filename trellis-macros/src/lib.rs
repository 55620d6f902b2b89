//! Procedural macros for Trellis.

use proc_macro::TokenStream;

mod middleware;

/// Turn an `async fn(ctx: &mut C, next: Next<'_, C>) -> Result<(), E>` into a
/// unit struct implementing `trellis::Middleware<C>`.
///
/// The struct takes the function's name unless `name = "..."` is given.
/// `E` must convert into `trellis::BoxError`.
#[proc_macro_attribute]
pub fn middleware(attr: TokenStream, item: TokenStream) -> TokenStream {
    middleware::middleware_impl(attr, item)
}
