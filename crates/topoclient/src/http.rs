//! HTTP topology client.
//!
//! [`HttpTopoClient`] talks to the topology server's `/api/v3` REST API
//! with a blocking `ureq` agent. Each request carries the caller's request
//! id and identity headers, and is bounded by whatever time is left on the
//! request context's deadline.
//!
//! Requests run on a helper thread while the caller watches its context, so
//! cancelling the context releases the caller immediately. The abandoned
//! request finishes or times out in the background and its reply is dropped.

use crate::envelope::{Envelope, map_ureq_error};
use reconcile::{
    ApiResponse, CreateModule, Error, RequestContext, Result, ServiceTemplate, SetDiff,
    TopoClient, UpdateModule,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Body, RequestBuilder};

/// Header carrying the request id across services.
pub const REQUEST_ID_HEADER: &str = "Cc_Request_Id";
/// Header naming the operator on whose behalf the request is made.
pub const USER_HEADER: &str = "BK_User";
/// Header selecting the tenant.
pub const SUPPLIER_ACCOUNT_HEADER: &str = "HTTP_BLUEKING_SUPPLIER_ACCOUNT";

/// How often a caller waiting on a request looks at its context.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

const API_PREFIX: &str = "/api/v3";

/// Topology server client over HTTP.
///
/// # Example
///
/// ```no_run
/// use reconcile::{BackendWorker, RequestContext, SetInst};
/// use topoclient::HttpTopoClient;
///
/// let client = HttpTopoClient::new("http://127.0.0.1:8080")
///     .with_user("admin")
///     .with_supplier_account("0");
///
/// let ctx = RequestContext::generate();
/// let diffs = client.diff_with_instances(&ctx, 2, 5, &[10]).unwrap();
///
/// let worker = BackendWorker::new(client);
/// for set_diff in &diffs {
///     worker.apply_all(&ctx, &set_diff.set_detail, &set_diff.module_diffs).unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTopoClient {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Server base URL, without the API prefix.
    endpoint: String,
    user: String,
    supplier_account: String,
}

#[derive(Debug, Serialize)]
struct SetIdsRequest<'a> {
    bk_set_ids: &'a [i64],
}

#[derive(Debug)]
enum Method {
    Get,
    Delete,
    Post(serde_json::Value),
    Put(serde_json::Value),
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::Post(_) => "POST",
            Self::Put(_) => "PUT",
        }
    }
}

/// A request with everything it needs owned, so it can leave the caller's thread.
struct Outbound {
    agent: ureq::Agent,
    url: String,
    rid: String,
    user: String,
    supplier_account: String,
    timeout: Option<Duration>,
    method: Method,
}

impl Outbound {
    /// Attach identity headers and bound the request by the context deadline.
    fn prepare<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        let request = request
            .header(REQUEST_ID_HEADER, &self.rid)
            .header(USER_HEADER, &self.user)
            .header(SUPPLIER_ACCOUNT_HEADER, &self.supplier_account)
            .header("Accept", "application/json");

        match self.timeout {
            Some(remaining) => request.config().timeout_global(Some(remaining)).build(),
            None => request,
        }
    }

    fn send(&self) -> std::result::Result<Response<Body>, ureq::Error> {
        match &self.method {
            Method::Get => self.prepare(self.agent.get(&self.url)).call(),
            Method::Delete => self.prepare(self.agent.delete(&self.url)).call(),
            Method::Post(body) => self.prepare(self.agent.post(&self.url)).send_json(body),
            Method::Put(body) => self.prepare(self.agent.put(&self.url)).send_json(body),
        }
    }
}

impl HttpTopoClient {
    /// Create a client for the server at `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(true)
            .build();
        Self {
            agent: config.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            user: "admin".to_string(),
            supplier_account: "0".to_string(),
        }
    }

    /// Set the operator sent in the user header.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the tenant sent in the supplier account header.
    #[must_use]
    pub fn with_supplier_account(mut self, supplier_account: impl Into<String>) -> Self {
        self.supplier_account = supplier_account.into();
        self
    }

    /// Get the server base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.endpoint, API_PREFIX, path)
    }

    fn service_template_path(template_id: i64) -> String {
        format!("/find/proc/service_template/{template_id}")
    }

    fn set_modules_path(biz_id: i64, set_id: i64) -> String {
        format!("/module/{biz_id}/{set_id}")
    }

    fn module_path(biz_id: i64, set_id: i64, module_id: i64) -> String {
        format!("/module/{biz_id}/{set_id}/{module_id}")
    }

    fn diff_path(biz_id: i64, set_template_id: i64) -> String {
        format!(
            "/findmany/topo/set_template/{set_template_id}/bk_biz_id/{biz_id}/diff_with_instances"
        )
    }

    fn sync_path(biz_id: i64, set_template_id: i64) -> String {
        format!(
            "/updatemany/topo/set_template/{set_template_id}/sync_to_instances/bk_biz_id/{biz_id}"
        )
    }

    fn get<T>(&self, ctx: &RequestContext, path: &str) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ctx, Method::Get, path)
    }

    fn delete<T>(&self, ctx: &RequestContext, path: &str) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ctx, Method::Delete, path)
    }

    fn post<T>(&self, ctx: &RequestContext, path: &str, body: &impl Serialize) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ctx, Method::Post(serde_json::to_value(body)?), path)
    }

    fn put<T>(&self, ctx: &RequestContext, path: &str, body: &impl Serialize) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ctx, Method::Put(serde_json::to_value(body)?), path)
    }

    /// Send one request and wait for its envelope, giving up as soon as
    /// `ctx` is cancelled or its deadline passes.
    fn execute<T>(&self, ctx: &RequestContext, method: Method, path: &str) -> Result<Envelope<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        ctx.check()?;
        let outbound = Outbound {
            agent: self.agent.clone(),
            url: self.url(path),
            rid: ctx.rid().to_string(),
            user: self.user.clone(),
            supplier_account: self.supplier_account.clone(),
            timeout: ctx.remaining(),
            method,
        };
        log::debug!("{} {}, rid: {}", outbound.method.as_str(), outbound.url, ctx.rid());

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("topoclient-request".to_string())
            .spawn(move || {
                let reply = outbound
                    .send()
                    .and_then(|mut r| r.body_mut().read_json::<Envelope<T>>());
                // Nobody is listening once the caller gave up.
                let _ = tx.send(reply);
            })
            .map_err(|e| Error::transport(format!("could not start request: {e}"), None))?;

        loop {
            match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(reply) => return reply.map_err(|e| map_ureq_error(ctx, e)),
                Err(RecvTimeoutError::Timeout) => ctx.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::transport("request ended without a reply", None));
                }
            }
        }
    }

    // =========================================================================
    // Set template operations
    // =========================================================================

    /// Fetch the module diffs between a set template and some of its sets.
    pub fn diff_with_instances(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_template_id: i64,
        set_ids: &[i64],
    ) -> Result<Vec<SetDiff>> {
        let envelope: Envelope<Vec<SetDiff>> = self.post(
            ctx,
            &Self::diff_path(biz_id, set_template_id),
            &SetIdsRequest { bk_set_ids: set_ids },
        )?;
        envelope.into_data()
    }

    /// Ask the server to sync sets to their template on its own.
    ///
    /// The server runs the sync asynchronously; success only means the
    /// task was accepted.
    pub fn sync_to_instances(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_template_id: i64,
        set_ids: &[i64],
    ) -> Result<()> {
        let envelope: Envelope<serde_json::Value> = self.post(
            ctx,
            &Self::sync_path(biz_id, set_template_id),
            &SetIdsRequest { bk_set_ids: set_ids },
        )?;
        envelope.status().into_result()
    }
}

impl TopoClient for HttpTopoClient {
    fn read_service_template(
        &self,
        ctx: &RequestContext,
        template_id: i64,
    ) -> Result<ServiceTemplate> {
        let envelope: Envelope<ServiceTemplate> =
            self.get(ctx, &Self::service_template_path(template_id))?;
        envelope.into_data()
    }

    fn create_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        payload: &CreateModule,
    ) -> Result<ApiResponse> {
        let envelope: Envelope<serde_json::Value> =
            self.post(ctx, &Self::set_modules_path(biz_id, set_id), payload)?;
        Ok(envelope.status())
    }

    fn update_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
        payload: &UpdateModule,
    ) -> Result<ApiResponse> {
        let envelope: Envelope<serde_json::Value> =
            self.put(ctx, &Self::module_path(biz_id, set_id, module_id), payload)?;
        Ok(envelope.status())
    }

    fn delete_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
    ) -> Result<ApiResponse> {
        let envelope: Envelope<serde_json::Value> =
            self.delete(ctx, &Self::module_path(biz_id, set_id, module_id))?;
        Ok(envelope.status())
    }
}
