//! Portfolio state, trade records and equity tracking.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Shares per board lot.
pub const LOT_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub side: TradeSide,
    pub quantity: u64,
    pub price: f64,
    pub cash_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub shares: u64,
    pub close: f64,
    pub total_assets: f64,
}

/// Cash and lot-sized holdings of a single-instrument run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub shares_held: u64,
    pub date: Option<NaiveDate>,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        PortfolioState {
            cash: initial_capital,
            shares_held: 0,
            date: None,
        }
    }

    pub fn total_assets(&self, price: f64) -> f64 {
        self.cash + self.shares_held as f64 * price
    }

    /// Whole lots affordable at `price` without overdrawing cash.
    pub fn affordable_shares(&self, price: f64) -> u64 {
        if self.cash <= 0.0 || price <= 0.0 {
            return 0;
        }
        let lot_cost = price * LOT_SIZE as f64;
        // `as` saturates, so the clamp keeps `lots * LOT_SIZE` in range
        let mut lots = ((self.cash / lot_cost).floor() as u64).min(u64::MAX / LOT_SIZE);
        // the float division can round up; past 2^50 lots a single lot is
        // below f64 resolution, so step down in proportion
        while lots > 0 && (lots * LOT_SIZE) as f64 * price > self.cash {
            lots -= (lots >> 50).max(1);
        }
        lots * LOT_SIZE
    }

    /// Spend as much cash as whole lots allow. `None` when not even one lot
    /// is affordable or the holding would exceed `u64::MAX` shares.
    pub fn buy_max_lots(&mut self, date: NaiveDate, price: f64) -> Option<Trade> {
        let quantity = self.affordable_shares(price);
        if quantity == 0 {
            return None;
        }
        self.shares_held = self.shares_held.checked_add(quantity)?;
        self.cash -= quantity as f64 * price;
        Some(Trade {
            date,
            side: TradeSide::Buy,
            quantity,
            price,
            cash_after: self.cash,
        })
    }

    /// Sell the whole holding. `None` when flat.
    pub fn liquidate(&mut self, date: NaiveDate, price: f64) -> Option<Trade> {
        if self.shares_held == 0 {
            return None;
        }
        let quantity = self.shares_held;
        self.cash += quantity as f64 * price;
        self.shares_held = 0;
        Some(Trade {
            date,
            side: TradeSide::Sell,
            quantity,
            price,
            cash_after: self.cash,
        })
    }

    pub fn mark(&mut self, date: NaiveDate, close: f64) -> EquityPoint {
        self.date = Some(date);
        EquityPoint {
            date,
            cash: self.cash,
            shares: self.shares_held,
            close,
            total_assets: self.total_assets(close),
        }
    }
}
