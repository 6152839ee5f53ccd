//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a few lines go into a helper function below
//! the route, so that this module stays easy to scan.
//!
//! Every handler is async and awaits its database and gateway calls. Nothing in here may block the worker thread.
use actix_web::{get, web, HttpMessage, HttpRequest, HttpResponse, Responder};
use booking_engine::{
    db_types::OrderId,
    traits::{BookingDatabase, PaymentGatewayClient, Pagination},
    OrderFlowApi,
    RewardsApi,
    WebhookApi,
};
use log::*;
use serde_json::{Map, Value};

use crate::{
    auth::AuthenticatedUser,
    data_objects::{
        callback_from_params,
        CalculateParams,
        CallbackAck,
        OrderListParams,
        PageParams,
        PlaceOrderRequest,
        RedeemRequest,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payment callback  ----------------------------------------------
route!(payment_callback => Get "/payment/callback" impl BookingDatabase);
/// The gateway redirects the customer here once a payment link completes, with the payment details in the query
/// string.
///
/// The callback is always acknowledged with a 200, even when it could not be matched to an order. What happened is
/// recorded in the webhook audit log.
pub async fn payment_callback<B: BookingDatabase>(req: HttpRequest, api: web::Data<WebhookApi<B>>) -> HttpResponse {
    debug!("💻️ GET payment callback");
    let params = web::Query::<Map<String, Value>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_else(|e| {
            warn!("💻️ Could not parse the payment callback query string. {e}");
            unparsed(req.query_string())
        });
    acknowledge_callback(params, api.as_ref()).await
}

route!(payment_notification => Post "/payment/callback" impl BookingDatabase);
/// Server-to-server callbacks arrive as a form or a JSON body. They are handled exactly like the redirect callback.
pub async fn payment_notification<B: BookingDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B>>,
) -> HttpResponse {
    debug!("💻️ POST payment callback ({} bytes, {})", body.len(), req.content_type());
    let params = parse_callback_body(req.content_type(), &body);
    acknowledge_callback(params, api.as_ref()).await
}

fn parse_callback_body(content_type: &str, body: &[u8]) -> Map<String, Value> {
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        return Map::new();
    }
    let parsed = if content_type.starts_with("application/json") {
        serde_json::from_slice::<Map<String, Value>>(body).map_err(|e| e.to_string())
    } else {
        web::Query::<Map<String, Value>>::from_query(&text).map(web::Query::into_inner).map_err(|e| e.to_string())
    };
    parsed.unwrap_or_else(|e| {
        warn!("💻️ Could not parse the payment callback body. {e}");
        unparsed(&text)
    })
}

fn unparsed(body: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("unparsed".to_string(), Value::String(body.to_string()));
    params
}

async fn acknowledge_callback<B: BookingDatabase>(params: Map<String, Value>, api: &WebhookApi<B>) -> HttpResponse {
    let callback = callback_from_params(params);
    let ack = match api.process_callback(callback).await {
        Ok((event, outcome)) => CallbackAck::new(event.id, &outcome),
        Err(e) => {
            error!("💻️ A payment callback could not be recorded. {e}");
            CallbackAck::unrecorded()
        },
    };
    HttpResponse::Ok().json(ack)
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl BookingDatabase, PaymentGatewayClient);
/// Books one or more workshops for the signed-in user and returns the order, including its payment link.
///
/// Posting the same booking again while its payment link is still usable returns the same order.
pub async fn place_order<B, G>(
    user: AuthenticatedUser,
    body: web::Json<PlaceOrderRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: BookingDatabase,
    G: PaymentGatewayClient,
{
    let request = body.into_inner().into_booking(user.as_str());
    debug!("💻️ POST order for {} ({:?}, {})", user.user_id, request.workshop_ids, request.amount);
    let order = api.place_order(request).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(list_orders => Get "/orders" impl BookingDatabase, PaymentGatewayClient);
pub async fn list_orders<B, G>(
    user: AuthenticatedUser,
    query: web::Query<OrderListParams>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: BookingDatabase,
    G: PaymentGatewayClient,
{
    let status = query.status()?;
    let pagination = query.pagination();
    debug!("💻️ GET orders for {} (status {status:?}, page {})", user.user_id, pagination.page);
    let orders = api.list_orders(user.as_str(), status, pagination).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(active_order => Get "/orders/active/{workshop_id}" impl BookingDatabase, PaymentGatewayClient);
/// The user's open order for a workshop. A lapsed order is expired on the way, and is not returned.
pub async fn active_order<B, G>(
    user: AuthenticatedUser,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: BookingDatabase,
    G: PaymentGatewayClient,
{
    let workshop_id = path.into_inner();
    debug!("💻️ GET active order for {} on workshop {workshop_id}", user.user_id);
    let order = api
        .get_active_order(user.as_str(), &workshop_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No active order for workshop {workshop_id}")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl BookingDatabase, PaymentGatewayClient);
pub async fn order_by_id<B, G>(
    user: AuthenticatedUser,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: BookingDatabase,
    G: PaymentGatewayClient,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for {}", user.user_id);
    let order = api
        .get_order_for_user(user.as_str(), &order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Rewards  ----------------------------------------------------
route!(wallet => Get "/rewards/wallet" impl BookingDatabase);
/// The signed-in user's wallet. The wallet is created on first use.
pub async fn wallet<B: BookingDatabase>(
    user: AuthenticatedUser,
    api: web::Data<RewardsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET wallet for {}", user.user_id);
    let wallet = api.get_wallet(user.as_str()).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

route!(transactions => Get "/rewards/transactions" impl BookingDatabase);
/// The signed-in user's ledger, newest first.
pub async fn transactions<B: BookingDatabase>(
    user: AuthenticatedUser,
    query: web::Query<PageParams>,
    api: web::Data<RewardsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let pagination = Pagination::from(&query.into_inner());
    debug!("💻️ GET reward transactions for {} (page {})", user.user_id, pagination.page);
    let txs = api.list_transactions(user.as_str(), pagination).await?;
    Ok(HttpResponse::Ok().json(txs))
}

route!(calculate => Get "/rewards/calculate" impl BookingDatabase);
/// How many points the user may put towards a booking of the given amount, and what discount that buys.
pub async fn calculate<B: BookingDatabase>(
    user: AuthenticatedUser,
    query: web::Query<CalculateParams>,
    api: web::Data<RewardsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let amount = query.amount;
    debug!("💻️ GET redemption quote for {} on {amount}", user.user_id);
    if !amount.is_positive() {
        return Err(ServerError::InvalidRequest("The booking amount must be positive".to_string()));
    }
    let quote = api.calculate_redemption(user.as_str(), amount).await?;
    Ok(HttpResponse::Ok().json(quote))
}

route!(redeem => Post "/rewards/redeem" impl BookingDatabase, PaymentGatewayClient);
/// Reserves points against one of the user's open orders. The order's payment link is reissued for the discounted
/// amount. The response carries the reservation id and the updated order.
pub async fn redeem<B, G>(
    user: AuthenticatedUser,
    body: web::Json<RedeemRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: BookingDatabase,
    G: PaymentGatewayClient,
{
    let RedeemRequest { order_id, points } = body.into_inner();
    debug!("💻️ POST redeem {points} on order {order_id} for {}", user.user_id);
    let redeemed = api.redeem_points(user.as_str(), &order_id, points).await?;
    Ok(HttpResponse::Ok().json(redeemed))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn callback_bodies_are_parsed_by_content_type() {
        let form = parse_callback_body(
            "application/x-www-form-urlencoded",
            b"razorpay_payment_link_reference_id=ord_1&razorpay_payment_link_status=paid",
        );
        assert_eq!(form["razorpay_payment_link_reference_id"], "ord_1");
        let json = parse_callback_body("application/json", br#"{"payment_link_status":"paid","amount":100}"#);
        assert_eq!(json["payment_link_status"], "paid");
        assert_eq!(json["amount"], 100);
        let broken = parse_callback_body("application/json", b"{not json");
        assert_eq!(broken["unparsed"], "{not json");
        assert!(parse_callback_body("text/plain", b"  ").is_empty());
    }
}
