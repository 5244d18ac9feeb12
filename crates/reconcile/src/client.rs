//! Remote topology client capability
//!
//! The worker only talks to the topology server through [`TopoClient`], so
//! it can run against the HTTP client in production and against
//! [`MockClient`] in tests.
//!
//! # Testing
//!
//! ```
//! use reconcile::client::{Call, MockClient, TopoClient};
//! use reconcile::{RequestContext, ServiceTemplate};
//!
//! let mock = MockClient::new();
//! mock.add_template(ServiceTemplate {
//!     id: 9,
//!     name: "web".to_string(),
//!     service_category_id: 3,
//! });
//!
//! let ctx = RequestContext::new("rid-1");
//! let template = mock.read_service_template(&ctx, 9).unwrap();
//! assert_eq!(template.service_category_id, 3);
//! assert_eq!(mock.calls(), vec![Call::ReadServiceTemplate { template_id: 9 }]);
//! ```

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::types::{ApiResponse, CreateModule, ServiceTemplate, UpdateModule};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Operations the worker needs from the topology server.
///
/// Mutations return the server's [`ApiResponse`] as-is: an `Ok` only means
/// the transport worked, and the caller must still check
/// [`ApiResponse::is_success`].
pub trait TopoClient: Send + Sync {
    /// Look up a service template.
    ///
    /// A failed lookup, whether transport or application level, is an `Err`.
    fn read_service_template(&self, ctx: &RequestContext, template_id: i64)
    -> Result<ServiceTemplate>;

    /// Create a module under a set.
    fn create_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        payload: &CreateModule,
    ) -> Result<ApiResponse>;

    /// Update a module's attributes.
    fn update_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
        payload: &UpdateModule,
    ) -> Result<ApiResponse>;

    /// Delete a module from a set.
    fn delete_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
    ) -> Result<ApiResponse>;
}

impl<T: TopoClient + ?Sized> TopoClient for Arc<T> {
    fn read_service_template(
        &self,
        ctx: &RequestContext,
        template_id: i64,
    ) -> Result<ServiceTemplate> {
        (**self).read_service_template(ctx, template_id)
    }

    fn create_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        payload: &CreateModule,
    ) -> Result<ApiResponse> {
        (**self).create_module(ctx, biz_id, set_id, payload)
    }

    fn update_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
        payload: &UpdateModule,
    ) -> Result<ApiResponse> {
        (**self).update_module(ctx, biz_id, set_id, module_id, payload)
    }

    fn delete_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
    ) -> Result<ApiResponse> {
        (**self).delete_module(ctx, biz_id, set_id, module_id)
    }
}

/// A remote call recorded by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadServiceTemplate {
        template_id: i64,
    },
    CreateModule {
        biz_id: i64,
        set_id: i64,
        payload: CreateModule,
    },
    UpdateModule {
        biz_id: i64,
        set_id: i64,
        module_id: i64,
        payload: UpdateModule,
    },
    DeleteModule {
        biz_id: i64,
        set_id: i64,
        module_id: i64,
    },
}

/// Scripted reply for a mocked remote call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Transport succeeded with this envelope.
    Response(ApiResponse),
    /// Transport failed with this message.
    Transport(String),
    /// The caller's context gets cancelled while the call is in flight.
    CancelInFlight,
    /// The caller's context gets cancelled, then the server still answers.
    CancelThenRespond(ApiResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    templates: HashMap<i64, ServiceTemplate>,
    replies: HashMap<(Op, i64), Reply>,
}

/// In-memory topology client for testing without network access.
///
/// Every call is recorded. Mutations succeed unless a reply was scripted
/// for their target: the service template id for creations, the module id
/// for updates and deletions. Template reads fail with a remote error for
/// unknown templates.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    /// Create a new mock where every mutation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a service template resolvable.
    pub fn add_template(&self, template: ServiceTemplate) {
        let mut state = self.state.lock().unwrap();
        state.templates.insert(template.id, template);
    }

    /// Script the reply for reading a service template.
    pub fn reply_read(&self, template_id: i64, reply: Reply) {
        self.script(Op::Read, template_id, reply);
    }

    /// Script the reply for creating a module from a service template.
    pub fn reply_create(&self, service_template_id: i64, reply: Reply) {
        self.script(Op::Create, service_template_id, reply);
    }

    /// Script the reply for updating a module.
    pub fn reply_update(&self, module_id: i64, reply: Reply) {
        self.script(Op::Update, module_id, reply);
    }

    /// Script the reply for deleting a module.
    pub fn reply_delete(&self, module_id: i64, reply: Reply) {
        self.script(Op::Delete, module_id, reply);
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn script(&self, op: Op, key: i64, reply: Reply) {
        let mut state = self.state.lock().unwrap();
        state.replies.insert((op, key), reply);
    }

    fn record(&self, call: Call, op: Op, key: i64) -> Option<Reply> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.replies.get(&(op, key)).cloned()
    }

    fn respond(ctx: &RequestContext, reply: Option<Reply>) -> Result<ApiResponse> {
        match reply {
            None => Ok(ApiResponse::ok()),
            Some(Reply::Response(resp)) => Ok(resp),
            Some(Reply::Transport(message)) => Err(Error::transport(message, None)),
            Some(Reply::CancelInFlight) => {
                ctx.cancel();
                Err(Error::transport("connection aborted", None))
            }
            Some(Reply::CancelThenRespond(resp)) => {
                ctx.cancel();
                Ok(resp)
            }
        }
    }
}

impl TopoClient for MockClient {
    fn read_service_template(
        &self,
        ctx: &RequestContext,
        template_id: i64,
    ) -> Result<ServiceTemplate> {
        let reply = self.record(Call::ReadServiceTemplate { template_id }, Op::Read, template_id);
        if reply.is_some() {
            Self::respond(ctx, reply)?.into_result()?;
        }

        let state = self.state.lock().unwrap();
        state
            .templates
            .get(&template_id)
            .cloned()
            .ok_or_else(|| Error::remote(1101031, format!("service template {template_id} not found")))
    }

    fn create_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        payload: &CreateModule,
    ) -> Result<ApiResponse> {
        let call = Call::CreateModule {
            biz_id,
            set_id,
            payload: payload.clone(),
        };
        let reply = self.record(call, Op::Create, payload.service_template_id);
        Self::respond(ctx, reply)
    }

    fn update_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
        payload: &UpdateModule,
    ) -> Result<ApiResponse> {
        let call = Call::UpdateModule {
            biz_id,
            set_id,
            module_id,
            payload: payload.clone(),
        };
        let reply = self.record(call, Op::Update, module_id);
        Self::respond(ctx, reply)
    }

    fn delete_module(
        &self,
        ctx: &RequestContext,
        biz_id: i64,
        set_id: i64,
        module_id: i64,
    ) -> Result<ApiResponse> {
        let call = Call::DeleteModule {
            biz_id,
            set_id,
            module_id,
        };
        let reply = self.record(call, Op::Delete, module_id);
        Self::respond(ctx, reply)
    }
}
