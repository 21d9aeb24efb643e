use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, PaymentPasswordRequest, RegisterRequest},
        orders::{
            CreateOrderRequest, CreatedOrders, OrderList, ProcessReturnRequest, ReturnDecision,
            ReturnRequest,
        },
        payments::{
            ConfirmPaymentRequest, CreatePaymentRequest, PaymentList, TimeoutOutcomeView,
            TimeoutStatus,
        },
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    error::ErrorCode,
    models::{Order, PartyInfo, Payment, Refund, User},
    response::{ApiResponse, ErrorResponse, Meta},
    routes::{auth, health, orders, params, payment_timeouts, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::payment_password,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::ship_order,
        orders::confirm_receipt,
        orders::apply_for_return,
        orders::process_return,
        payments::create_payment,
        payments::list_payments,
        payments::get_payment_by_orders,
        payments::get_payment,
        payments::confirm_payment,
        payments::cancel_payment,
        payment_timeouts::timeout_status,
        payment_timeouts::expire_payment
    ),
    components(
        schemas(
            User,
            Order,
            PartyInfo,
            Payment,
            Refund,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            ErrorCode,
            ErrorResponse,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            PaymentPasswordRequest,
            CreateOrderRequest,
            CreatedOrders,
            ReturnRequest,
            ProcessReturnRequest,
            ReturnDecision,
            OrderList,
            CreatePaymentRequest,
            ConfirmPaymentRequest,
            PaymentList,
            TimeoutStatus,
            TimeoutOutcomeView,
            params::Pagination,
            params::OrderListQuery,
            params::OrderParty,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CreatedOrders>,
            ApiResponse<ReturnDecision>,
            ApiResponse<Payment>,
            ApiResponse<PaymentList>,
            ApiResponse<TimeoutStatus>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication and payment password"),
        (name = "Orders", description = "Trade order lifecycle"),
        (name = "Payments", description = "Payment lifecycle"),
        (name = "Admin", description = "Payment timeout administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_lifecycle_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/orders/{id}/process-return"));
        assert!(paths.contains_key("/api/payments/{payment_id}/confirm"));
        assert!(paths.contains_key("/api/payment-timeouts/status"));
    }
}
