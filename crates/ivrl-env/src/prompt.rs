//! Prompt construction for implied volatility prediction

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use ivrl_core::util::format_float;
use ivrl_core::{ChatMessage, MarketRecord, TrainingItem};

/// Seconds in an average (Julian) year
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

/// Time to expiration used when the expiration date cannot be parsed
pub const DEFAULT_TIME_TO_EXPIRATION: f64 = 0.25;

/// Floor for options that have already expired
pub const MIN_TIME_TO_EXPIRATION: f64 = 1e-6;

/// System prompt: thinking instructions only, the task lives in the user turn
pub const SYSTEM_PROMPT: &str = "You are a deep thinking AI Stock Options analyst.
You may use extremely long chains of thought to deeply consider the problem and deliberate with yourself via systematic reasoning processes to help come to a correct solution prior to answering.

You should enclose your thoughts and internal monologue inside <think> </think> tags, and then provide your final prediction.";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse an expiration timestamp. Naive timestamps and bare dates are read
/// as UTC.
pub fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Years between `now` and the expiration date.
///
/// Expired options get [`MIN_TIME_TO_EXPIRATION`]; unparseable dates get
/// [`DEFAULT_TIME_TO_EXPIRATION`].
pub fn time_to_expiration(expiration: &str, now: DateTime<Utc>) -> f64 {
    match parse_expiration(expiration) {
        Some(expiry) => {
            let seconds = (expiry - now).num_milliseconds() as f64 / 1000.0;
            let years = seconds / SECONDS_PER_YEAR;
            if years < 0.0 {
                MIN_TIME_TO_EXPIRATION
            } else {
                years
            }
        }
        None => {
            warn!(
                "Error processing expiration date {:?}. Using default TTE.",
                expiration
            );
            DEFAULT_TIME_TO_EXPIRATION
        }
    }
}

/// Render the user turn for one market record
pub fn user_message(record: &MarketRecord, now: DateTime<Utc>) -> String {
    let tte = time_to_expiration(&record.expiration_date, now);
    let context = record.context.as_deref().unwrap_or("N/A");

    format!(
        "Your task is to analyze the following option data:
Option Price: {option_price}
Underlying Stock Price: {underlying}
Strike Price: {strike}
Time to Expiration (Years): {tte:.4}
Risk-Free Rate: {rate:.4}
Option Type: {option_type}

Predict the implied volatility of the option.

Your final answer MUST use the exact format:
\"The implied volatility will be: {{answer}}%\"

Where {{answer}} is the implied volatility as a string (e.g., \"70.5\").

Here is the data to analyze:

Further details: {context}",
        option_price = format_float(record.last_price),
        underlying = format_float(record.underlying_price),
        strike = format_float(record.strike),
        rate = record.risk_free_rate_or_default(),
        option_type = record.option_type,
    )
}

/// System and user messages for one market record
pub fn build_prompt(record: &MarketRecord, now: DateTime<Utc>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_message(record, now)),
    ]
}

/// Training item for one market record
pub fn build_item(record: &MarketRecord, now: DateTime<Utc>) -> TrainingItem {
    TrainingItem::new(build_prompt(record, now), record.expected_answer())
}
