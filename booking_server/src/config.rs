use std::{env, fmt::Display, str::FromStr, time::Duration};

use booking_engine::{
    booking_api::order_flow_api::DEFAULT_LINK_EXPIRY_MINUTES,
    helpers::RewardsConfig,
    workers::{DEFAULT_BATCH_SIZE, DEFAULT_EXPIRY_MIN_SPACING},
};
use log::*;
use wb_common::{parse_boolean_flag, parse_number, Paise, Points, Secret};

const DEFAULT_WB_HOST: &str = "127.0.0.1";
const DEFAULT_WB_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/wb_store.db";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.razorpay.com/v1";
const DEFAULT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CASHBACK_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub rewards: RewardsConfig,
    /// How long a payment link stays valid, in minutes.
    pub link_expiry_minutes: i64,
    pub workers: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WB_HOST.to_string(),
            port: DEFAULT_WB_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            rewards: RewardsConfig::default(),
            link_expiry_minutes: DEFAULT_LINK_EXPIRY_MINUTES,
            workers: WorkerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WB_HOST").ok().unwrap_or_else(|| DEFAULT_WB_HOST.into());
        let port = env_or_default("WB_PORT", DEFAULT_WB_PORT);
        let database_url = env::var("WB_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ WB_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let link_expiry_minutes = positive_or_default(
            "WB_ORDER_LINK_EXPIRY_MINUTES",
            env_or_default("WB_ORDER_LINK_EXPIRY_MINUTES", DEFAULT_LINK_EXPIRY_MINUTES),
            DEFAULT_LINK_EXPIRY_MINUTES,
        );
        Self {
            host,
            port,
            database_url,
            gateway: GatewayConfig::from_env_or_default(),
            rewards: rewards_config_from_env(),
            link_expiry_minutes,
            workers: WorkerConfig::from_env_or_default(),
        }
    }
}

//-------------------------------------------------  GatewayConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the gateway's REST API, without a trailing slash.
    pub base_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// Where the gateway sends the customer (and the callback parameters) once the payment completes.
    pub callback_url: Option<String>,
    /// Whether the gateway should send the payment link to the customer by SMS and email as well.
    pub notify_customer: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_BASE_URL.to_string(),
            key_id: String::default(),
            key_secret: Secret::default(),
            callback_url: None,
            notify_customer: false,
        }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("WB_GATEWAY_BASE_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string());
        let key_id = env::var("WB_GATEWAY_KEY_ID").ok().unwrap_or_else(|| {
            error!("🪛️ WB_GATEWAY_KEY_ID is not set. Payment links cannot be issued until it is.");
            String::default()
        });
        let key_secret = env::var("WB_GATEWAY_KEY_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ WB_GATEWAY_KEY_SECRET is not set. Payment links cannot be issued until it is.");
            String::default()
        });
        let callback_url = env::var("WB_GATEWAY_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        if callback_url.is_none() {
            warn!("🪛️ WB_GATEWAY_CALLBACK_URL is not set. Customers will not be redirected back after paying.");
        }
        let notify_customer = parse_boolean_flag(env::var("WB_GATEWAY_NOTIFY_CUSTOMER").ok(), false);
        Self { base_url, key_id, key_secret: Secret::new(key_secret), callback_url, notify_customer }
    }

    pub fn is_configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.reveal().is_empty()
    }
}

//-------------------------------------------------  Rewards  ----------------------------------------------------------
fn rewards_config_from_env() -> RewardsConfig {
    let defaults = RewardsConfig::default();
    let cashback_percentage = env_or_default("WB_CASHBACK_PERCENTAGE", defaults.cashback_percentage);
    let redemption_cap_percentage = env_or_default("WB_REDEMPTION_CAP_PERCENTAGE", defaults.redemption_cap_percentage);
    let default_cap_rupees = defaults.redemption_cap_per_workshop.value() / 100;
    let cap_rupees = env_or_default("WB_REDEMPTION_CAP_PER_WORKSHOP", default_cap_rupees);
    let exchange_rate = env_or_default("WB_REWARD_EXCHANGE_RATE", defaults.exchange_rate.value());
    let exchange_rate = positive_or_default("WB_REWARD_EXCHANGE_RATE", exchange_rate, defaults.exchange_rate.value());
    let welcome_bonus = env_or_default("WB_WELCOME_BONUS_AMOUNT", defaults.welcome_bonus.value());
    let config = RewardsConfig {
        cashback_percentage: cashback_percentage.clamp(0, 100),
        redemption_cap_percentage: redemption_cap_percentage.clamp(0, 100),
        redemption_cap_per_workshop: Paise::from_rupees(cap_rupees.max(0)),
        exchange_rate: Paise::from(exchange_rate),
        welcome_bonus: Points::from(welcome_bonus.max(0)),
    };
    info!(
        "🪛️ Rewards: {}% cashback, discounts capped at {}% and {} per workshop, 1 point = {}, welcome bonus {}",
        config.cashback_percentage,
        config.redemption_cap_percentage,
        config.redemption_cap_per_workshop,
        config.exchange_rate,
        config.welcome_bonus
    );
    config
}

//-------------------------------------------------  WorkerConfig  -----------------------------------------------------
#[derive(Clone, Copy, Debug)]
pub struct WorkerConfig {
    pub expiry_interval: Duration,
    /// Minimum time between the starts of two expiry sweeps.
    pub expiry_min_spacing: Duration,
    pub cashback_interval: Duration,
    pub batch_size: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            expiry_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
            expiry_min_spacing: DEFAULT_EXPIRY_MIN_SPACING,
            cashback_interval: DEFAULT_CASHBACK_SWEEP_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            let v = env_or_default(name, default.as_secs());
            Duration::from_secs(positive_or_default(name, v, default.as_secs()))
        };
        let batch_size = env_or_default("WB_SWEEP_BATCH_SIZE", defaults.batch_size);
        Self {
            expiry_interval: secs("WB_EXPIRY_SWEEP_INTERVAL_SECS", defaults.expiry_interval),
            expiry_min_spacing: secs("WB_EXPIRY_SWEEP_MIN_SPACING_SECS", defaults.expiry_min_spacing),
            cashback_interval: secs("WB_CASHBACK_SWEEP_INTERVAL_SECS", defaults.cashback_interval),
            batch_size: positive_or_default("WB_SWEEP_BATCH_SIZE", batch_size, defaults.batch_size),
        }
    }
}

//-------------------------------------------------  helpers  ----------------------------------------------------------
fn env_or_default<T>(name: &str, default: T) -> T
where T: FromStr + Display {
    let Ok(raw) = env::var(name) else {
        debug!("🪛️ {name} is not set. Using the default value of {default}.");
        return default;
    };
    parse_number::<T>(Some(raw.clone())).unwrap_or_else(|| {
        warn!("🪛️ {raw} is not a valid value for {name}. Using the default, {default}, instead.");
        default
    })
}

fn positive_or_default<T>(name: &str, value: T, default: T) -> T
where T: PartialOrd + Default + Display {
    if value > T::default() {
        value
    } else {
        warn!("🪛️ {name} must be greater than zero. Using the default, {default}, instead.");
        default
    }
}
