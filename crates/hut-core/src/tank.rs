//! Heating-oil deliveries.
//!
//! A filling records the burner-hour counter as read when the tank was
//! topped up. Fillings are checkpoints on the counter between stays, so their
//! readings may not run backwards in time.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::billing::round_money;

/// Why a filling was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TankError {
    #[error("liters must be greater than zero (got {0})")]
    NonPositiveLiters(Decimal),

    #[error("price per liter must be greater than zero (got {0})")]
    NonPositivePrice(Decimal),

    /// The counter reading is negative, infinite or NaN.
    #[error("counter reading must be finite and non-negative")]
    InvalidCounterReading,

    /// The reading contradicts an earlier or later filling.
    #[error(
        "counter reading {reading:.1} h on {date} is out of order with \
         {other_reading:.1} h on {other_date}"
    )]
    CounterOutOfOrder {
        date: NaiveDate,
        reading: f64,
        other_date: NaiveDate,
        other_reading: f64,
    },
}

/// One delivery of heating oil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankFilling {
    /// Assigned by the store; `None` until saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub liters: Decimal,
    pub price_per_liter: Decimal,
    /// Burner-hour counter at delivery.
    pub counter_reading: f64,
}

impl TankFilling {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// What the delivery cost, in cents.
    pub fn cost(&self) -> Decimal {
        round_money(self.liters * self.price_per_liter)
    }

    /// Checks the filling on its own and against the fillings on record.
    ///
    /// A recorded filling with the same id is the filling's previous version
    /// and is skipped. Fillings on the same day may carry readings in any
    /// order.
    pub fn validate(&self, recorded: &[Self]) -> Result<(), TankError> {
        if self.liters <= Decimal::ZERO {
            return Err(TankError::NonPositiveLiters(self.liters));
        }
        if self.price_per_liter <= Decimal::ZERO {
            return Err(TankError::NonPositivePrice(self.price_per_liter));
        }
        if !self.counter_reading.is_finite() || self.counter_reading < 0.0 {
            return Err(TankError::InvalidCounterReading);
        }

        let others = recorded
            .iter()
            .filter(|other| self.id.is_none() || other.id != self.id);
        for other in others {
            let backwards = (other.date < self.date && other.counter_reading > self.counter_reading)
                || (other.date > self.date && other.counter_reading < self.counter_reading);
            if backwards {
                return Err(TankError::CounterOutOfOrder {
                    date: self.date,
                    reading: self.counter_reading,
                    other_date: other.date,
                    other_reading: other.counter_reading,
                });
            }
        }
        Ok(())
    }
}
