pub mod edge;
mod middleware;
pub mod origin;

use axum::http::{HeaderMap, header};

pub use edge::{EdgeState, build_edge_router};
pub use middleware::ResponseTrace;
pub use origin::{OriginState, build_origin_router};

/// Every `Cookie` header of the request folded into one `a=b; c=d` string.
///
/// HTTP/2 clients may split cookies across several header fields.
pub(crate) fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let joined = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}
