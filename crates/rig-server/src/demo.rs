//! ---
//! rig_section: "03-server"
//! rig_subsection: "module"
//! rig_type: "source"
//! rig_scope: "code"
//! rig_description: "Demo business handlers served by the builtin catalog."
//! rig_version: "v0.1.0"
//! rig_owner: "tbd"
//! ---
//! Minimal storefront handlers used to exercise the rig. They validate just
//! enough input to make error paths observable.

use std::collections::HashMap;

use rig_proto::proto::checkout_service_server::{CheckoutService, CheckoutServiceServer};
use rig_proto::proto::inventory_service_server::{InventoryService, InventoryServiceServer};
use rig_proto::proto::{
    OrderItem, OrderResult, PlaceOrderRequest, PlaceOrderResponse, StockRequest, StockResponse,
};
use tonic::transport::server::Router;
use tonic::{Request, Response, Status};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::ServiceFactory;

const UNIT_PRICE_USD: f64 = 9.99;
const FLAT_SHIPPING_USD: f64 = 8.99;

/// Catalog entry for [`CheckoutSvc`].
#[derive(Debug, Clone, Copy)]
pub struct CheckoutFactory;

impl ServiceFactory for CheckoutFactory {
    fn contract(&self) -> &'static str {
        "rig.v1.CheckoutService"
    }

    fn register(&self, router: Router) -> Router {
        router.add_service(CheckoutServiceServer::new(CheckoutSvc))
    }
}

/// Catalog entry for [`InventorySvc`].
#[derive(Debug, Clone, Copy)]
pub struct InventoryFactory;

impl ServiceFactory for InventoryFactory {
    fn contract(&self) -> &'static str {
        "rig.v1.InventoryService"
    }

    fn register(&self, router: Router) -> Router {
        router.add_service(InventoryServiceServer::new(InventorySvc::seeded()))
    }
}

/// Accepts every well-formed order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutSvc;

#[tonic::async_trait]
impl CheckoutService for CheckoutSvc {
    async fn place_order(
        &self,
        request: Request<PlaceOrderRequest>,
    ) -> Result<Response<PlaceOrderResponse>, Status> {
        let order = request.into_inner();
        if order.user_id.trim().is_empty() {
            return Err(Status::invalid_argument("user_id is required"));
        }
        if !order.email.contains('@') {
            return Err(Status::invalid_argument("email is malformed"));
        }

        let items: Vec<OrderItem> = order
            .items
            .into_iter()
            .map(|item| OrderItem {
                cost: f64::from(item.quantity) * UNIT_PRICE_USD,
                item: Some(item),
            })
            .collect();
        let shipping_cost = if items.is_empty() { 0.0 } else { FLAT_SHIPPING_USD };
        let order_id = Uuid::new_v4().to_string();
        debug!(%order_id, user = %order.user_id, items = items.len(), "order placed");

        Ok(Response::new(PlaceOrderResponse {
            order: Some(OrderResult {
                order_id,
                shipping_tracking_id: Uuid::new_v4().simple().to_string(),
                shipping_cost,
                shipping_address: order.address,
                items,
                status: "success".to_owned(),
            }),
        }))
    }
}

/// Fixed in-memory stock table.
#[derive(Debug, Clone, Default)]
pub struct InventorySvc {
    stock: HashMap<String, i32>,
}

impl InventorySvc {
    /// Table with a handful of demo products.
    pub fn seeded() -> Self {
        let stock = [("OLJCESPC7Z", 12), ("66VCHSJNUP", 0), ("1YMWWN1N4O", 40)]
            .into_iter()
            .map(|(id, count)| (id.to_owned(), count))
            .collect();
        Self { stock }
    }
}

#[tonic::async_trait]
impl InventoryService for InventorySvc {
    async fn check_stock(
        &self,
        request: Request<StockRequest>,
    ) -> Result<Response<StockResponse>, Status> {
        let product_id = request.into_inner().product_id;
        match self.stock.get(&product_id) {
            Some(available) => Ok(Response::new(StockResponse {
                available: *available,
                product_id,
            })),
            None => Err(Status::not_found(format!("unknown product '{product_id}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rig_proto::proto::{Address, CartItem};

    use super::*;

    fn order() -> PlaceOrderRequest {
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
            credit_card: None,
            items: vec![CartItem {
                product_id: "OLJCESPC7Z".into(),
                quantity: 2,
            }],
        }
    }

    #[tokio::test]
    async fn checkout_prices_items_and_echoes_address() {
        let response = CheckoutSvc
            .place_order(Request::new(order()))
            .await
            .unwrap()
            .into_inner();
        let result = response.order.expect("order result");
        assert_eq!(result.status, "success");
        assert_eq!(result.items.len(), 1);
        assert!((result.items[0].cost - 19.98).abs() < 1e-9);
        assert_eq!(result.shipping_cost, FLAT_SHIPPING_USD);
        assert_eq!(result.shipping_address.unwrap().city, "Berkeley");
    }

    #[tokio::test]
    async fn checkout_rejects_anonymous_orders() {
        let mut request = order();
        request.user_id.clear();
        let status = CheckoutSvc
            .place_order(Request::new(request))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn inventory_reports_known_and_unknown_products() {
        let svc = InventorySvc::seeded();
        let known = svc
            .check_stock(Request::new(StockRequest {
                product_id: "1YMWWN1N4O".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(known.available, 40);

        let missing = svc
            .check_stock(Request::new(StockRequest {
                product_id: "nope".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), tonic::Code::NotFound);
    }
}
