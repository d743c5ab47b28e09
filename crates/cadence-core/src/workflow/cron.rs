//! Five-field cron expression matcher.
//!
//! Fields are minute, hour, day-of-month, month and day-of-week (0 = Sunday,
//! 7 is accepted as Sunday too). Each field is a comma-separated list of
//! alternatives, where an alternative is `*`, a literal, a `start-end` range
//! or a `*/step` stride. A timestamp matches when every field matches.
//!
//! The scheduler never sees a parse error: `CronExpression::matches_str`
//! logs and reports "no match" for malformed expressions.

use chrono::{Datelike, Timelike};

/// Why a cron expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{token}'")]
    InvalidToken { field: &'static str, token: String },

    #[error("{field} value {value} outside {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Any,
    Value(u32),
    Range(u32, u32),
    Step(u32),
}

impl Part {
    fn matches(&self, value: u32) -> bool {
        match *self {
            Part::Any => true,
            Part::Value(v) => v == value,
            Part::Range(start, end) => (start..=end).contains(&value),
            Part::Step(step) => value % step == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    parts: Vec<Part>,
}

impl Field {
    fn parse(token: &str, name: &'static str, min: u32, max: u32) -> Result<Self, CronError> {
        let invalid = || CronError::InvalidToken {
            field: name,
            token: token.to_string(),
        };
        let check = |value: u32| {
            if (min..=max).contains(&value) {
                Ok(value)
            } else {
                Err(CronError::OutOfRange {
                    field: name,
                    value,
                    min,
                    max,
                })
            }
        };

        let mut parts = Vec::new();
        for alt in token.split(',') {
            let part = if alt == "*" {
                Part::Any
            } else if let Some(step) = alt.strip_prefix("*/") {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                Part::Step(step)
            } else if let Some((start, end)) = alt.split_once('-') {
                let start = check(start.parse().map_err(|_| invalid())?)?;
                let end = check(end.parse().map_err(|_| invalid())?)?;
                if start > end {
                    return Err(invalid());
                }
                Part::Range(start, end)
            } else {
                Part::Value(check(alt.parse().map_err(|_| invalid())?)?)
            };
            parts.push(part);
        }
        Ok(Self { parts })
    }

    fn matches(&self, value: u32) -> bool {
        self.parts.iter().any(|p| p.matches(value))
    }
}

/// A parsed five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let tokens: Vec<&str> = expression.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(CronError::FieldCount(tokens.len()));
        }
        Ok(Self {
            minute: Field::parse(tokens[0], "minute", 0, 59)?,
            hour: Field::parse(tokens[1], "hour", 0, 23)?,
            day_of_month: Field::parse(tokens[2], "day-of-month", 1, 31)?,
            month: Field::parse(tokens[3], "month", 1, 12)?,
            day_of_week: Field::parse(tokens[4], "day-of-week", 0, 7)?,
        })
    }

    /// Whether the timestamp's wall-clock fields satisfy the expression.
    pub fn matches<T: Datelike + Timelike>(&self, time: &T) -> bool {
        let weekday = time.weekday().num_days_from_sunday();
        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.day_of_month.matches(time.day())
            && self.month.matches(time.month())
            && (self.day_of_week.matches(weekday) || (weekday == 0 && self.day_of_week.matches(7)))
    }

    /// Parse and match in one go, logging and returning false on bad input.
    pub fn matches_str<T: Datelike + Timelike>(expression: &str, time: &T) -> bool {
        match Self::parse(expression) {
            Ok(cron) => cron.matches(time),
            Err(e) => {
                tracing::warn!(expression, error = %e, "invalid cron expression; it will never fire");
                false
            }
        }
    }
}
