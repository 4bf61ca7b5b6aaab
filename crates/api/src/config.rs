//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use checkout::CheckoutConfig;
use common::GeoPoint;
use dispatch::{FleetConfig, SchedulerConfig};
use domain::{CartPolicy, OrderPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `ALLOW_MULTI_RESTAURANT`: split mixed carts instead of rejecting them
/// - `CONFIRMATION_WINDOW_MINUTES`, `PAYMENT_TIMEOUT_SECS`
/// - `DISPATCH_TICK_SECS`, `INFEASIBLE_ALERT_SECS`
/// - `DRONE_SPEED_KMH`, `DRONE_DRAIN_PER_KM`, `DRONE_MIN_BATTERY`,
///   `DRONE_CHARGE_PER_TICK`, `DRONE_AUTO_CHARGE_BELOW`
/// - `SEED_DEMO_FLEET`, `DEPOT_LAT`, `DEPOT_LNG`
/// - `DATABASE_URL`: when set, events go to PostgreSQL
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub allow_multi_restaurant: bool,
    pub confirmation_window_minutes: i64,
    pub payment_timeout_secs: u64,
    pub dispatch_tick_secs: u64,
    pub infeasible_alert_secs: u64,
    pub drone_speed_kmh: f64,
    pub drone_drain_per_km: f64,
    pub drone_min_battery: f64,
    pub drone_charge_per_tick: f64,
    pub drone_auto_charge_below: f64,
    pub seed_demo_fleet: bool,
    pub depot: GeoPoint,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            allow_multi_restaurant: env_or("ALLOW_MULTI_RESTAURANT", defaults.allow_multi_restaurant),
            confirmation_window_minutes: env_or(
                "CONFIRMATION_WINDOW_MINUTES",
                defaults.confirmation_window_minutes,
            ),
            payment_timeout_secs: env_or("PAYMENT_TIMEOUT_SECS", defaults.payment_timeout_secs),
            dispatch_tick_secs: env_or("DISPATCH_TICK_SECS", defaults.dispatch_tick_secs),
            infeasible_alert_secs: env_or("INFEASIBLE_ALERT_SECS", defaults.infeasible_alert_secs),
            drone_speed_kmh: env_or("DRONE_SPEED_KMH", defaults.drone_speed_kmh),
            drone_drain_per_km: env_or("DRONE_DRAIN_PER_KM", defaults.drone_drain_per_km),
            drone_min_battery: env_or("DRONE_MIN_BATTERY", defaults.drone_min_battery),
            drone_charge_per_tick: env_or("DRONE_CHARGE_PER_TICK", defaults.drone_charge_per_tick),
            drone_auto_charge_below: env_or(
                "DRONE_AUTO_CHARGE_BELOW",
                defaults.drone_auto_charge_below,
            ),
            seed_demo_fleet: env_or("SEED_DEMO_FLEET", defaults.seed_demo_fleet),
            depot: GeoPoint::new(
                env_or("DEPOT_LAT", defaults.depot.lat),
                env_or("DEPOT_LNG", defaults.depot.lng),
            ),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            confirmation_window: chrono::Duration::minutes(self.confirmation_window_minutes),
        }
    }

    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig {
            cart_policy: CartPolicy {
                allow_multi_restaurant: self.allow_multi_restaurant,
            },
            payment_timeout: Duration::from_secs(self.payment_timeout_secs),
        }
    }

    pub fn fleet(&self) -> FleetConfig {
        FleetConfig {
            speed_kmh: self.drone_speed_kmh,
            drain_per_km: self.drone_drain_per_km,
            min_battery: self.drone_min_battery,
            charge_per_tick: self.drone_charge_per_tick,
            auto_charge_below: self.drone_auto_charge_below,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick: Duration::from_secs(self.dispatch_tick_secs.max(1)),
            infeasible_alert: Duration::from_secs(self.infeasible_alert_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            allow_multi_restaurant: false,
            confirmation_window_minutes: 30,
            payment_timeout_secs: 10,
            dispatch_tick_secs: 5,
            infeasible_alert_secs: 300,
            drone_speed_kmh: 50.0,
            drone_drain_per_km: 0.5,
            drone_min_battery: 20.0,
            drone_charge_per_tick: 10.0,
            drone_auto_charge_below: 15.0,
            seed_demo_fleet: true,
            depot: GeoPoint::new(10.762622, 106.660172),
            database_url: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparsable setting, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(!config.allow_multi_restaurant);
        assert!(config.seed_demo_fleet);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_library_configs_follow_settings() {
        let config = Config {
            allow_multi_restaurant: true,
            payment_timeout_secs: 3,
            dispatch_tick_secs: 0,
            drone_min_battery: 25.0,
            ..Config::default()
        };

        assert!(config.checkout().cart_policy.allow_multi_restaurant);
        assert_eq!(config.checkout().payment_timeout, Duration::from_secs(3));
        assert_eq!(config.scheduler().tick, Duration::from_secs(1));
        assert!((config.fleet().threshold(0.0) - 25.0).abs() < 1e-9);
        assert_eq!(config.order_policy().confirmation_window, chrono::Duration::minutes(30));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        assert_eq!(env_or("API_TEST_SURELY_UNSET_KEY", 42u16), 42);
    }
}
