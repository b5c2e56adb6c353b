//! Shared query parameter types for API handlers.

use groundwatch_core::statistics::Period;
use serde::Deserialize;

use crate::error::AppError;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped in the handler via `clamp_limit` / `clamp_offset`.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?period=` for statistics endpoints. Defaults to `all`.
#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    pub period: Option<String>,
}

impl PeriodParams {
    pub fn period(&self) -> Result<Period, AppError> {
        match self.period.as_deref() {
            None | Some("") => Ok(Period::default()),
            Some(raw) => Ok(raw.parse::<Period>()?),
        }
    }
}
