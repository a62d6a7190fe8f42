//! ---
//! rig_section: "04-client"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Test routines executed by the driver."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rig_proto::proto::{Address, CartItem, CreditCardInfo, PlaceOrderRequest, StockRequest};

use crate::stubs::{ServiceStub, StubSet};

/// Logic exercising one or more registered services.
///
/// Errors are reported by the driver and never skip the terminate step.
#[async_trait]
pub trait TestRoutine: Send + Sync {
    /// One-line summary shown by `rigctl catalog`.
    fn description(&self) -> &'static str;

    /// Run against every stub in scope.
    async fn run(&self, stubs: &StubSet) -> Result<()>;
}

/// Routines a driver binary can execute, keyed by name.
#[derive(Clone, Default)]
pub struct RoutineCatalog {
    routines: BTreeMap<String, Arc<dyn TestRoutine>>,
}

impl RoutineCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog shipped with the `rig-driver` binary.
    pub fn builtin() -> Self {
        Self::new()
            .with("place-order", PlaceOrder)
            .with("check-stock", CheckStock)
            .with("smoke", Smoke)
    }

    /// Register `routine` under `name`, replacing any previous entry.
    pub fn with(mut self, name: impl Into<String>, routine: impl TestRoutine + 'static) -> Self {
        self.routines.insert(name.into(), Arc::new(routine));
        self
    }

    /// Routine registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TestRoutine>> {
        self.routines.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    /// `(name, description)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.routines
            .iter()
            .map(|(name, routine)| (name.as_str(), routine.description()))
    }
}

impl fmt::Debug for RoutineCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routines.keys()).finish()
    }
}

/// Demo order sent by the checkout routines.
pub fn sample_order() -> PlaceOrderRequest {
    PlaceOrderRequest {
        user_id: "123".into(),
        user_currency: "USD".into(),
        address: Some(Address {
            street_address: "123 Main Street".into(),
            city: "Berkeley".into(),
            state: "CA".into(),
            country: "USA".into(),
            zip_code: 94704,
        }),
        email: "user@example.com".into(),
        credit_card: Some(CreditCardInfo {
            credit_card_number: "1111-2222-3333-4444".into(),
            credit_card_cvv: 123,
            credit_card_expiration_year: 2030,
            credit_card_expiration_month: 9,
        }),
        items: vec![CartItem {
            product_id: "OLJCESPC7Z".into(),
            quantity: 1,
        }],
    }
}

async fn place_order(stubs: &StubSet, stub: &ServiceStub) -> Result<()> {
    let mut client = stub.checkout();
    let response = stubs
        .call("PlaceOrder", client.place_order(sample_order()))
        .await
        .with_context(|| format!("service {}", stub.name()))?;
    let Some(order) = response.order else {
        bail!("service {} returned an order response without a result", stub.name());
    };
    println!("[{}] Order ID: {}", stub.name(), order.order_id);
    println!("[{}] Shipping Tracking ID: {}", stub.name(), order.shipping_tracking_id);
    println!("[{}] Shipping Cost (USD): {:.2}", stub.name(), order.shipping_cost);
    if let Some(address) = &order.shipping_address {
        println!(
            "[{}] Shipping Address: {}, {}, {} {}",
            stub.name(),
            address.street_address,
            address.city,
            address.state,
            address.zip_code
        );
    }
    for item in &order.items {
        if let Some(cart) = &item.item {
            println!(
                "[{}] Product ID: {}, Quantity: {}, Cost (USD): {:.2}",
                stub.name(),
                cart.product_id,
                cart.quantity,
                item.cost
            );
        }
    }
    Ok(())
}

async fn check_stock(stubs: &StubSet, stub: &ServiceStub) -> Result<()> {
    let mut client = stub.inventory();
    let response = stubs
        .call(
            "CheckStock",
            client.check_stock(StockRequest {
                product_id: "OLJCESPC7Z".into(),
            }),
        )
        .await
        .with_context(|| format!("service {}", stub.name()))?;
    println!(
        "[{}] Product ID: {}, Available: {}",
        stub.name(),
        response.product_id,
        response.available
    );
    Ok(())
}

/// Places the demo order on every checkout service.
#[derive(Debug, Clone, Copy)]
pub struct PlaceOrder;

#[async_trait]
impl TestRoutine for PlaceOrder {
    fn description(&self) -> &'static str {
        "place the demo order on every checkout service"
    }

    async fn run(&self, stubs: &StubSet) -> Result<()> {
        let mut called = 0;
        for stub in stubs.by_implementation("checkout") {
            place_order(stubs, stub).await?;
            called += 1;
        }
        if called == 0 {
            bail!("no registered service implements checkout");
        }
        Ok(())
    }
}

/// Looks up demo stock on every inventory service.
#[derive(Debug, Clone, Copy)]
pub struct CheckStock;

#[async_trait]
impl TestRoutine for CheckStock {
    fn description(&self) -> &'static str {
        "look up demo stock on every inventory service"
    }

    async fn run(&self, stubs: &StubSet) -> Result<()> {
        let mut called = 0;
        for stub in stubs.by_implementation("inventory") {
            check_stock(stubs, stub).await?;
            called += 1;
        }
        if called == 0 {
            bail!("no registered service implements inventory");
        }
        Ok(())
    }
}

/// One call per registered service; any error response fails the routine.
#[derive(Debug, Clone, Copy)]
pub struct Smoke;

#[async_trait]
impl TestRoutine for Smoke {
    fn description(&self) -> &'static str {
        "call every registered service once and require non-error responses"
    }

    async fn run(&self, stubs: &StubSet) -> Result<()> {
        for stub in stubs.iter() {
            match stub.implementation() {
                "checkout" => place_order(stubs, stub).await?,
                "inventory" => check_stock(stubs, stub).await?,
                other => bail!(
                    "no smoke call known for service {} (implementation {other})",
                    stub.name()
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_routines_are_listed_sorted() {
        let catalog = RoutineCatalog::builtin();
        let names: Vec<_> = catalog.entries().map(|(name, _)| name).collect();
        assert_eq!(names, ["check-stock", "place-order", "smoke"]);
        assert!(catalog.contains("smoke"));
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn sample_order_is_well_formed() {
        let order = sample_order();
        assert!(!order.user_id.is_empty());
        assert!(order.email.contains('@'));
        assert_eq!(order.address.unwrap().zip_code, 94704);
    }
}
