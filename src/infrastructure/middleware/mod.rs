// ViewerContext Middleware - resolves the caller once per request
// Handlers only ever see the resulting ViewerContext

pub mod viewer_context_extractor;
pub mod viewer_context_middleware;

pub use viewer_context_extractor::Vc;
pub use viewer_context_middleware::*;
