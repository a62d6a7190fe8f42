//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Per-service channels and typed stubs."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rig_proto::proto::checkout_service_client::CheckoutServiceClient;
use rig_proto::proto::inventory_service_client::InventoryServiceClient;
use rig_proto::proto::server_control_service_client::ServerControlServiceClient;
use tonic::transport::{Channel, Endpoint};

use crate::plan::{endpoint_uri, ClientPlan, ClientTarget};
use crate::ClientError;

/// Channel and stubs for one registered service.
#[derive(Debug, Clone)]
pub struct ServiceStub {
    target: ClientTarget,
    channel: Channel,
}

impl ServiceStub {
    /// Lazily connected stub; nothing is dialed until the first call.
    pub fn lazy(host: &str, target: ClientTarget) -> Result<Self, ClientError> {
        let endpoint = Endpoint::from_shared(endpoint_uri(host, target.port)).map_err(|err| {
            ClientError::Endpoint {
                service: target.name.clone(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self {
            target,
            channel: endpoint.connect_lazy(),
        })
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Catalog key of the served implementation.
    pub fn implementation(&self) -> &str {
        &self.target.implementation
    }

    /// Port the service listens on.
    pub fn port(&self) -> u16 {
        self.target.port
    }

    /// Control stub used for termination.
    pub fn control(&self) -> ServerControlServiceClient<Channel> {
        ServerControlServiceClient::new(self.channel.clone())
    }

    /// Typed checkout stub.
    pub fn checkout(&self) -> CheckoutServiceClient<Channel> {
        CheckoutServiceClient::new(self.channel.clone())
    }

    /// Typed inventory stub.
    pub fn inventory(&self) -> InventoryServiceClient<Channel> {
        InventoryServiceClient::new(self.channel.clone())
    }
}

/// Every stub in scope for a routine, in registration order.
#[derive(Debug, Clone)]
pub struct StubSet {
    stubs: Vec<ServiceStub>,
    call_timeout: Duration,
}

impl StubSet {
    /// One lazily connected stub per plan target.
    pub fn from_plan(plan: &ClientPlan) -> Result<Self, ClientError> {
        let stubs = plan
            .targets
            .iter()
            .cloned()
            .map(|target| ServiceStub::lazy(&plan.connect_host, target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            stubs,
            call_timeout: plan.call_timeout,
        })
    }

    /// All stubs.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceStub> {
        self.stubs.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.stubs.len()
    }

    /// Stubs serving `implementation`.
    pub fn by_implementation<'a>(
        &'a self,
        implementation: &'a str,
    ) -> impl Iterator<Item = &'a ServiceStub> + 'a {
        self.stubs
            .iter()
            .filter(move |stub| stub.implementation() == implementation)
    }

    /// Await an RPC under the plan's call timeout, flattening transport status into an error.
    pub async fn call<T, F>(&self, label: &str, rpc: F) -> Result<T>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        match tokio::time::timeout(self.call_timeout, rpc).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(anyhow!(
                "{label} failed: {:?}: {}",
                status.code(),
                status.message()
            )),
            Err(_) => Err(anyhow!(
                "{label} timed out after {} ms",
                self.call_timeout.as_millis()
            )),
        }
    }
}
