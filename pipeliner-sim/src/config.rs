use std::{fmt::Display, str::FromStr, time::Duration};

use pipeliner_core::DayEndPolicy;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    // How often the ticker advances the pipeline.
    pub tick_interval: Duration,
    // Working hours that pass on every tick.
    pub hours_per_tick: f32,
    // The simulation is done once every node has worked this many days.
    pub max_days: u32,
    // Seed for failure rolls, task generation and reviews.
    pub seed: u64,
    // Chance that a task in progress fails during one tick.
    pub failure_chance: f64,
    // Chance that a reviewed task gets rejected.
    pub reject_chance: f64,
    // How often the feeder offers a new task.
    pub feed_interval: Duration,
    // How often the supervisor walks the board.
    pub review_interval: Duration,
    // Consecutive refused tasks the feeder tolerates before giving up.
    pub max_rejection_tolerance: usize,
    pub day_end_policy: DayEndPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            hours_per_tick: 0.1,
            max_days: 3,
            seed: 2024,
            failure_chance: 0.0,
            reject_chance: 0.2,
            feed_interval: Duration::from_millis(500),
            review_interval: Duration::from_millis(250),
            max_rejection_tolerance: 20,
            day_end_policy: DayEndPolicy::KeepTasks,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` finds for the `PIPELINER_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            tick_interval: millis(&lookup, "PIPELINER_TICK_MS", defaults.tick_interval)?,
            hours_per_tick: parse(&lookup, "PIPELINER_HOURS_PER_TICK", defaults.hours_per_tick)?,
            max_days: parse(&lookup, "PIPELINER_MAX_DAYS", defaults.max_days)?,
            seed: parse(&lookup, "PIPELINER_SEED", defaults.seed)?,
            failure_chance: parse(&lookup, "PIPELINER_FAILURE_CHANCE", defaults.failure_chance)?,
            reject_chance: parse(&lookup, "PIPELINER_REJECT_CHANCE", defaults.reject_chance)?,
            feed_interval: millis(&lookup, "PIPELINER_FEED_MS", defaults.feed_interval)?,
            review_interval: millis(&lookup, "PIPELINER_REVIEW_MS", defaults.review_interval)?,
            max_rejection_tolerance: parse(
                &lookup,
                "PIPELINER_MAX_REJECTIONS",
                defaults.max_rejection_tolerance,
            )?,
            day_end_policy: parse(&lookup, "PIPELINER_DAY_END", defaults.day_end_policy)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.hours_per_tick > 0.0) {
            return Err(invalid("PIPELINER_HOURS_PER_TICK", self.hours_per_tick, "must be positive"));
        }
        if self.max_days == 0 {
            return Err(invalid("PIPELINER_MAX_DAYS", self.max_days, "must be at least 1"));
        }
        for (key, chance) in [
            ("PIPELINER_FAILURE_CHANCE", self.failure_chance),
            ("PIPELINER_REJECT_CHANCE", self.reject_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(invalid(key, chance, "must be between 0 and 1"));
            }
        }
        for (key, interval) in [
            ("PIPELINER_TICK_MS", self.tick_interval),
            ("PIPELINER_FEED_MS", self.feed_interval),
            ("PIPELINER_REVIEW_MS", self.review_interval),
        ] {
            if interval.is_zero() {
                return Err(invalid(key, 0, "must be at least 1ms"));
            }
        }
        Ok(())
    }
}

fn invalid(key: &'static str, value: impl Display, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| invalid(key, &value, error.to_string())),
        None => Ok(default),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default = default.as_millis() as u64;
    parse(lookup, key, default).map(Duration::from_millis)
}
