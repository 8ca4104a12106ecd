//! Tank01 MLB betting-odds adapter
//!
//! RapidAPI-hosted. Responses are wrapped in `{"statusCode", "body"}` and the
//! body may be a list of rows, `{"games": [...]}` or a single row. Prices
//! arrive as strings such as `"-150"` or `"+130"`.

use super::draft::{parse_loose_decimal, QuoteDraft};
use super::types::{NormalizeOutcome, ValidationError};
use super::{Normalizer, SourceAdapter};
use crate::config::SourceConfig;
use crate::odds::{GameId, MarketStatus, MarketType, Side, Sportsbook};
use crate::source::{RawPayload, SourceError};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

pub const TANK01_ODDS_PATH: &str = "/getMLBBettingOdds";

/// Number or string, as Tank01 mixes both
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(serde_json::Number),
    Text(String),
}

impl Loose {
    fn as_text(&self) -> String {
        match self {
            Loose::Number(n) => n.to_string(),
            Loose::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Tank01Row {
    #[serde(rename = "gameID")]
    game_id: Option<String>,
    #[serde(rename = "homeML")]
    home_ml: Option<Loose>,
    #[serde(rename = "awayML")]
    away_ml: Option<Loose>,
    #[serde(rename = "homeSpread")]
    home_spread: Option<Loose>,
    #[serde(rename = "homeSpreadOdds")]
    home_spread_odds: Option<Loose>,
    #[serde(rename = "awaySpread")]
    away_spread: Option<Loose>,
    #[serde(rename = "awaySpreadOdds")]
    away_spread_odds: Option<Loose>,
    #[serde(rename = "totalOver")]
    total_over: Option<Loose>,
    #[serde(rename = "totalOverOdds")]
    total_over_odds: Option<Loose>,
    #[serde(rename = "totalUnder")]
    total_under: Option<Loose>,
    #[serde(rename = "totalUnderOdds")]
    total_under_odds: Option<Loose>,
    sportsbook: Option<String>,
    #[serde(rename = "marketStatus")]
    market_status: Option<String>,
    last_updated_e_time: Option<Loose>,
}

/// Adapter for the Tank01 RapidAPI service
pub struct Tank01Adapter;

impl SourceAdapter for Tank01Adapter {
    fn build_request(
        &self,
        client: &Client,
        config: &SourceConfig,
        game_id: &GameId,
        api_key: &str,
    ) -> RequestBuilder {
        let url = format!("{}{}", config.base_url.trim_end_matches('/'), TANK01_ODDS_PATH);
        client
            .get(url)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &config.rapidapi_host)
            .query(&[("gameID", game_id.as_str())])
    }

    fn unwrap_envelope(&self, body: Value) -> Result<Value, SourceError> {
        let Value::Object(mut map) = body else {
            return Ok(body);
        };
        let Some(code) = map.get("statusCode").and_then(Value::as_u64) else {
            return Ok(Value::Object(map));
        };
        match code {
            200 => map
                .remove("body")
                .ok_or_else(|| SourceError::MalformedResponse("envelope without body".to_string())),
            401 | 403 => Err(SourceError::AuthFailure(format!("statusCode {}", code))),
            429 => Err(SourceError::RateLimited),
            other => Err(SourceError::MalformedResponse(format!(
                "statusCode {}",
                other
            ))),
        }
    }
}

fn decimal_field(
    field: &'static str,
    value: &Option<Loose>,
    rejected: &mut Vec<ValidationError>,
) -> Result<Option<Decimal>, ()> {
    match value {
        None => Ok(None),
        Some(v) => parse_loose_decimal(field, &v.as_text()).map_err(|e| rejected.push(e)),
    }
}

fn epoch_seconds(value: &Loose) -> Option<DateTime<Utc>> {
    let secs = Decimal::from_str(value.as_text().trim()).ok()?;
    let whole = secs.trunc().to_i64()?;
    let nanos = ((secs - secs.trunc()) * Decimal::from(1_000_000_000))
        .to_u32()
        .unwrap_or(0);
    Utc.timestamp_opt(whole, nanos).single()
}

fn rows(body: &Value) -> Result<Vec<&Value>, ValidationError> {
    match body {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(map) => match map.get("games") {
            Some(Value::Array(items)) => Ok(items.iter().collect()),
            Some(_) => Err(ValidationError::UnexpectedShape(
                "`games` is not a list".to_string(),
            )),
            None => Ok(vec![body]),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(ValidationError::UnexpectedShape(format!(
            "expected list or object, got {}",
            other
        ))),
    }
}

impl Normalizer for Tank01Adapter {
    fn normalize(&self, payload: &RawPayload) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();
        let rows = match rows(&payload.body) {
            Ok(rows) => rows,
            Err(e) => {
                outcome.rejected.push(e);
                return outcome;
            }
        };

        for raw in rows {
            let row: Tank01Row = match serde_json::from_value(raw.clone()) {
                Ok(row) => row,
                Err(e) => {
                    outcome
                        .rejected
                        .push(ValidationError::UnexpectedShape(e.to_string()));
                    continue;
                }
            };
            self.normalize_row(payload, row, &mut outcome);
        }
        outcome
    }
}

impl Tank01Adapter {
    fn normalize_row(&self, payload: &RawPayload, row: Tank01Row, outcome: &mut NormalizeOutcome) {
        let rejected = &mut outcome.rejected;

        let Some(game_id) = row.game_id.as_deref().filter(|id| !id.is_empty()) else {
            rejected.push(ValidationError::MissingField { field: "gameID" });
            return;
        };
        if game_id != payload.game_id.as_str() {
            return;
        }

        let Some(raw_ts) = row.last_updated_e_time.as_ref() else {
            rejected.push(ValidationError::MissingField {
                field: "last_updated_e_time",
            });
            return;
        };
        let Some(observed_at) = epoch_seconds(raw_ts) else {
            rejected.push(ValidationError::Unparseable {
                field: "last_updated_e_time",
                value: raw_ts.as_text(),
            });
            return;
        };

        let sportsbook = Sportsbook::new(row.sportsbook.as_deref().unwrap_or(payload.source.as_str()));
        let status = row
            .market_status
            .as_deref()
            .and_then(|s| MarketStatus::from_str(s).ok())
            .unwrap_or_default();

        let no_line: Option<Loose> = None;
        let markets: [(MarketType, [(Side, &Option<Loose>, &Option<Loose>, &'static str); 2]); 3] = [
            (
                MarketType::Moneyline,
                [
                    (Side::Home, &row.home_ml, &no_line, "homeML"),
                    (Side::Away, &row.away_ml, &no_line, "awayML"),
                ],
            ),
            (
                MarketType::Spread,
                [
                    (Side::Home, &row.home_spread_odds, &row.home_spread, "homeSpreadOdds"),
                    (Side::Away, &row.away_spread_odds, &row.away_spread, "awaySpreadOdds"),
                ],
            ),
            (
                MarketType::Total,
                [
                    (Side::Over, &row.total_over_odds, &row.total_over, "totalOverOdds"),
                    (Side::Under, &row.total_under_odds, &row.total_under, "totalUnderOdds"),
                ],
            ),
        ];

        for (market_type, sides) in markets {
            let mut draft = QuoteDraft::new(
                payload.game_id.clone(),
                sportsbook.clone(),
                market_type,
                status,
                observed_at,
            );
            for (side, odds, line, field) in sides {
                let odds = match decimal_field(field, odds, rejected) {
                    Ok(v) => v,
                    Err(()) => {
                        draft.mark_attempted();
                        continue;
                    }
                };
                let line = match decimal_field("line", line, rejected) {
                    Ok(v) => v,
                    Err(()) => {
                        draft.mark_attempted();
                        continue;
                    }
                };
                draft.side(side, odds, line, rejected);
            }
            if let Some(quote) = draft.finish(rejected) {
                outcome.quotes.push(quote);
            }
        }
    }
}
