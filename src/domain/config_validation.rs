//! Configuration validation.
//!
//! Validates config fields before a backtest or import runs. Missing keys
//! fall back to defaults; present keys must hold usable values.

use crate::domain::backtest::DEFAULT_INITIAL_CAPITAL;
use crate::domain::date_range::DEFAULT_CHUNK_DAYS;
use crate::domain::error::MacrossError;
use crate::domain::indicator::DEFAULT_MA_PERIOD;
use crate::domain::signal::CrossoverRule;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    validate_initial_capital(config)?;
    validate_ma_period(config)?;
    validate_crossover_rule(config)?;
    Ok(())
}

pub fn validate_provider_config(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    validate_chunk_days(config)?;
    validate_min_interval(config)?;
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    let value = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !value.is_finite() || value <= 0.0 {
        return Err(MacrossError::config_invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_ma_period(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    let value = config.get_int("backtest", "ma_period", DEFAULT_MA_PERIOD as i64);
    if value < 1 {
        return Err(MacrossError::config_invalid(
            "backtest",
            "ma_period",
            "ma_period must be at least 1",
        ));
    }
    Ok(())
}

fn validate_crossover_rule(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    match config.get_string("backtest", "crossover_rule") {
        None => Ok(()),
        Some(s) => s
            .parse::<CrossoverRule>()
            .map(|_| ())
            .map_err(|reason| MacrossError::config_invalid("backtest", "crossover_rule", reason)),
    }
}

fn validate_chunk_days(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    let value = config.get_int("provider", "chunk_days", DEFAULT_CHUNK_DAYS);
    if value < 1 {
        return Err(MacrossError::config_invalid(
            "provider",
            "chunk_days",
            "chunk_days must be at least 1",
        ));
    }
    Ok(())
}

fn validate_min_interval(config: &dyn ConfigPort) -> Result<(), MacrossError> {
    let value = config.get_int("provider", "min_interval_ms", 0);
    if value < 0 {
        return Err(MacrossError::config_invalid(
            "provider",
            "min_interval_ms",
            "min_interval_ms must be non-negative",
        ));
    }
    Ok(())
}
