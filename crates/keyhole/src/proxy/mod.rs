mod classifier;
mod credential;
mod error;
mod forward;
mod headers;
mod relay;
mod server;
mod upstream;

pub use classifier::{BYPASS_BODY, Route, classify, normalize_path};
pub use credential::Credential;
pub use error::{ProxyError, create_error_response};
pub use forward::{ForwardTimeouts, Forwarder, OutboundRequest};
pub use headers::{
    FORWARDED_CONTENT_TYPE, HOP_BY_HOP_HEADERS, RelayHeaders, is_hop_by_hop, outbound_headers,
    relayed_response_headers,
};
pub use relay::{request_body, spawn_response_relay};
pub use server::{AppState, ProxyServer, bypass_response, create_router};
pub use upstream::UpstreamOrigin;
