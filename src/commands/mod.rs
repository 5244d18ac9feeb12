pub mod config;
pub mod diff;
pub mod register;
pub mod sync;

use crate::Context;
use reconcile::RequestContext;
use topoclient::HttpTopoClient;

/// Topology client for the configured server
pub fn topo_client(ctx: &Context) -> HttpTopoClient {
    let topo = &ctx.config.topo;
    HttpTopoClient::new(&topo.endpoint)
        .with_user(&topo.user)
        .with_supplier_account(&topo.supplier_account)
}

/// Fresh request context bounded by the configured timeout
pub fn request_context(ctx: &Context) -> RequestContext {
    let request = RequestContext::generate();
    match ctx.config.topo.timeout() {
        Some(timeout) => request.with_timeout(timeout),
        None => request,
    }
}

/// Drop repeated ids, keeping first occurrences in order
pub fn distinct(ids: &[i64]) -> Vec<i64> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}
