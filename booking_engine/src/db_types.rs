use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
use wb_common::{Paise, Points, DEFAULT_CURRENCY_CODE};

/// The reference id prefix the gateway uses for a payment that covers several sibling orders.
pub const BUNDLE_REFERENCE_PREFIX: &str = "BUNDLE_";

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order id. Ids combine the creation time with 64 random bits, so they are unique without
    /// consulting the database.
    pub fn random() -> Self {
        let nonce: u64 = rand::random();
        Self(format!("ord_{}{nonce:016x}", Utc::now().format("%y%m%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created and is waiting on the payment gateway.
    Created,
    /// The gateway reported a successful payment.
    Paid,
    /// The gateway reported a status we could not interpret as success, cancellation or expiry.
    Failed,
    /// The payment link was cancelled, either by the gateway or because the booking was superseded.
    Cancelled,
    /// The payment window lapsed without a payment.
    Expired,
}

impl OrderStatusType {
    /// Every status other than `Created` is final. Nothing may move an order out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Created)
    }

    /// Maps the gateway's payment link vocabulary onto order statuses.
    ///
    /// | Gateway status          | Order status |
    /// |-------------------------|--------------|
    /// | `paid`                  | `Paid`       |
    /// | `created`, `attempted`  | `Created`    |
    /// | `cancelled`             | `Cancelled`  |
    /// | `expired`               | `Expired`    |
    /// | anything else           | `Failed`     |
    pub fn from_gateway_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "paid" => Self::Paid,
            "created" | "attempted" => Self::Created,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Failed,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "created"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Failed => write!(f, "failed"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
            OrderStatusType::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    OrderReference     ---------------------------------------------------------
/// What a gateway reference id points at: one of our orders, or every order in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderReference {
    Single(OrderId),
    Bundle(String),
}

impl OrderReference {
    pub fn parse(reference_id: &str) -> Option<Self> {
        let reference_id = reference_id.trim();
        if reference_id.is_empty() {
            return None;
        }
        match reference_id.strip_prefix(BUNDLE_REFERENCE_PREFIX) {
            Some(bundle_id) if !bundle_id.is_empty() => Some(Self::Bundle(bundle_id.to_string())),
            Some(_) => None,
            None => Some(Self::Single(OrderId::from(reference_id))),
        }
    }

    pub fn for_bundle(bundle_id: &str) -> String {
        format!("{BUNDLE_REFERENCE_PREFIX}{bundle_id}")
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    pub workshop_ids: Json<Vec<String>>,
    pub amount: Paise,
    pub currency: String,
    pub status: OrderStatusType,
    pub bundle_id: Option<String>,
    pub payment_link_id: Option<String>,
    pub payment_link_url: Option<String>,
    pub payment_link_expire_at: Option<DateTime<Utc>>,
    pub gateway_metadata: Json<Value>,
    pub points_redeemed: Option<Points>,
    pub final_amount_paid: Option<Paise>,
    pub rewards_generated: bool,
    pub cashback_amount: Option<Points>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn includes_workshop(&self, workshop_id: &str) -> bool {
        self.workshop_ids.iter().any(|w| w == workshop_id)
    }

    /// True if the order has a payment link whose expiry lies before `now`.
    pub fn link_has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.payment_link_expire_at.map(|t| t < now).unwrap_or(false)
    }

    /// The amount the customer is asked to pay: the discounted amount if a redemption was applied, else the gross
    /// amount.
    pub fn payable_amount(&self) -> Paise {
        self.final_amount_paid.unwrap_or(self.amount)
    }

    /// The amount cashback is calculated on. Falls back to the gross amount when the recorded final amount is
    /// missing, zero or negative.
    pub fn cashback_basis(&self) -> Paise {
        match self.final_amount_paid {
            Some(paid) if paid.is_positive() => paid,
            _ => self.amount,
        }
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderValidationError {
    #[error("Order amount must be positive, but was {0}")]
    NonPositiveAmount(Paise),
    #[error("An order must include at least one workshop")]
    NoWorkshops,
    #[error("A user id is required")]
    MissingUser,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: String,
    pub workshop_ids: Vec<String>,
    pub amount: Paise,
    pub currency: String,
    pub bundle_id: Option<String>,
}

impl NewOrder {
    pub fn new(user_id: &str, workshop_ids: Vec<String>, amount: Paise) -> Result<Self, OrderValidationError> {
        if user_id.trim().is_empty() {
            return Err(OrderValidationError::MissingUser);
        }
        let workshop_ids = workshop_ids.into_iter().filter(|w| !w.trim().is_empty()).collect::<Vec<_>>();
        if workshop_ids.is_empty() {
            return Err(OrderValidationError::NoWorkshops);
        }
        if !amount.is_positive() {
            return Err(OrderValidationError::NonPositiveAmount(amount));
        }
        Ok(Self {
            order_id: OrderId::random(),
            user_id: user_id.to_string(),
            workshop_ids,
            amount,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            bundle_id: None,
        })
    }

    pub fn with_bundle_id(mut self, bundle_id: String) -> Self {
        self.bundle_id = Some(bundle_id);
        self
    }

    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = currency;
        self
    }
}

//--------------------------------------      PaymentLink      ---------------------------------------------------------
/// A hosted payment page issued by the gateway for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub link_id: String,
    pub url: String,
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw: Value,
}

//--------------------------------------   Reward enumerations  -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Credit,
    Debit,
}

impl Display for TransactionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Debit => write!(f, "debit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardSource {
    WelcomeBonus,
    Cashback,
    Redemption,
    Referral,
    Admin,
    Refund,
}

impl RewardSource {
    /// Cashback is matched on (user, reference, source, direction) alone when checking for duplicates. All other
    /// sources also require the amounts to match.
    pub fn dedupes_on_reference_only(&self) -> bool {
        matches!(self, Self::Cashback)
    }
}

impl Display for RewardSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WelcomeBonus => write!(f, "welcome_bonus"),
            Self::Cashback => write!(f, "cashback"),
            Self::Redemption => write!(f, "redemption"),
            Self::Referral => write!(f, "referral"),
            Self::Admin => write!(f, "admin"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

impl FromStr for RewardSource {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "welcome_bonus" => Ok(Self::WelcomeBonus),
            "cashback" => Ok(Self::Cashback),
            "redemption" => Ok(Self::Redemption),
            "referral" => Ok(Self::Referral),
            "admin" => Ok(Self::Admin),
            "refund" => Ok(Self::Refund),
            s => Err(ConversionError(format!("Invalid reward source: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------     RewardWallet      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RewardWallet {
    pub user_id: String,
    pub total_balance: Points,
    pub available_balance: Points,
    pub lifetime_earned: Points,
    pub lifetime_redeemed: Points,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RewardWallet {
    /// `available == earned - redeemed`. Holds whenever no ledger write is in flight.
    pub fn is_balanced(&self) -> bool {
        self.available_balance == self.lifetime_earned - self.lifetime_redeemed &&
            self.total_balance >= self.available_balance
    }
}

//--------------------------------------   RewardTransaction   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RewardTransaction {
    pub id: i64,
    pub user_id: String,
    pub direction: TransactionDirection,
    pub amount: Points,
    pub source: RewardSource,
    pub status: TransactionStatus,
    pub description: String,
    pub reference_id: Option<String>,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewRewardTransaction {
    pub user_id: String,
    pub direction: TransactionDirection,
    pub amount: Points,
    pub source: RewardSource,
    pub description: String,
    pub reference_id: Option<String>,
    pub metadata: Value,
}

impl NewRewardTransaction {
    pub fn credit(user_id: &str, amount: Points, source: RewardSource, description: &str) -> Self {
        Self::new(user_id, TransactionDirection::Credit, amount, source, description)
    }

    pub fn debit(user_id: &str, amount: Points, source: RewardSource, description: &str) -> Self {
        Self::new(user_id, TransactionDirection::Debit, amount, source, description)
    }

    fn new(user_id: &str, direction: TransactionDirection, amount: Points, source: RewardSource, desc: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            direction,
            amount,
            source,
            description: desc.to_string(),
            reference_id: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_reference(mut self, reference_id: &str) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

//--------------------------------------      Redemption       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl Display for RedemptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Redemption {
    pub id: i64,
    pub user_id: String,
    pub order_id: OrderId,
    pub workshop_id: String,
    pub points_reserved: Points,
    pub discount_amount: Paise,
    pub original_amount: Paise,
    pub final_amount: Paise,
    pub status: RedemptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRedemption {
    pub user_id: String,
    pub order_id: OrderId,
    pub workshop_id: String,
    pub points_reserved: Points,
    pub discount_amount: Paise,
    pub original_amount: Paise,
    pub final_amount: Paise,
}

//--------------------------------------     WebhookEvent      ---------------------------------------------------------
/// The audit record of one inbound gateway callback.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub payment_id: Option<String>,
    pub payment_link_id: Option<String>,
    pub reference_id: Option<String>,
    pub gateway_status: Option<String>,
    pub signature: Option<String>,
    pub raw_request: Json<Value>,
    pub processed: bool,
    pub order_updated: bool,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// The fields a gateway callback may carry. Every field is optional, since we must audit malformed callbacks too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayCallback {
    pub payment_id: Option<String>,
    pub payment_link_id: Option<String>,
    pub payment_link_reference_id: Option<String>,
    pub payment_link_status: Option<String>,
    pub signature: Option<String>,
    /// Snapshot of the request as received, kept verbatim for the audit log.
    #[serde(default)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub processed: bool,
    pub order_updated: bool,
    pub error: Option<String>,
}
