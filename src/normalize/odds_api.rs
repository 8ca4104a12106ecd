//! The Odds API (v4) adapter
//!
//! One event per request, every bookmaker nested inside it. Prices are
//! already American when requested with `oddsFormat=american`.

use super::draft::QuoteDraft;
use super::types::{NormalizeOutcome, ValidationError};
use super::{Normalizer, SourceAdapter};
use crate::config::SourceConfig;
use crate::odds::{GameId, MarketStatus, MarketType, Side, Sportsbook};
use crate::source::RawPayload;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Event {
    id: Option<String>,
    home_team: Option<String>,
    away_team: Option<String>,
    /// Decoded one at a time so a bad bookmaker does not sink the event
    #[serde(default)]
    bookmakers: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    key: Option<String>,
    last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    point: Option<Decimal>,
}

/// Adapter for the-odds-api.com
pub struct OddsApiAdapter;

impl SourceAdapter for OddsApiAdapter {
    fn build_request(
        &self,
        client: &Client,
        config: &SourceConfig,
        game_id: &GameId,
        api_key: &str,
    ) -> RequestBuilder {
        let url = format!(
            "{}/v4/sports/{}/events/{}/odds",
            config.base_url.trim_end_matches('/'),
            config.sport_key,
            game_id
        );
        let mut request = client.get(url).query(&[
            ("apiKey", api_key),
            ("regions", config.regions.as_str()),
            ("markets", "h2h,spreads,totals"),
            ("oddsFormat", "american"),
        ]);
        if !config.bookmakers.is_empty() {
            request = request.query(&[("bookmakers", config.bookmakers.join(","))]);
        }
        request
    }
}

fn market_type(key: &str) -> Option<MarketType> {
    match key {
        "h2h" => Some(MarketType::Moneyline),
        "spreads" => Some(MarketType::Spread),
        "totals" => Some(MarketType::Total),
        k if k.starts_with("player_") || k.starts_with("batter_") || k.starts_with("pitcher_") => {
            Some(MarketType::Prop)
        }
        _ => None,
    }
}

impl Normalizer for OddsApiAdapter {
    fn normalize(&self, payload: &RawPayload) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome::default();
        let event: Event = match serde_json::from_value(payload.body.clone()) {
            Ok(event) => event,
            Err(e) => {
                outcome
                    .rejected
                    .push(ValidationError::UnexpectedShape(e.to_string()));
                return outcome;
            }
        };

        match event.id.as_deref() {
            None | Some("") => {
                outcome
                    .rejected
                    .push(ValidationError::MissingField { field: "id" });
                return outcome;
            }
            Some(id) if id != payload.game_id.as_str() => return outcome,
            Some(_) => {}
        }

        let home = event.home_team.unwrap_or_default();
        let away = event.away_team.unwrap_or_default();
        let side_for = |market: MarketType, name: &str| -> Option<Side> {
            if !home.is_empty() && name == home {
                return Some(Side::Home);
            }
            if !away.is_empty() && name == away {
                return Some(Side::Away);
            }
            match name {
                "Over" => Some(Side::Over),
                "Under" => Some(Side::Under),
                "Draw" => Some(Side::Draw),
                "Yes" if market == MarketType::Prop => Some(Side::Yes),
                "No" if market == MarketType::Prop => Some(Side::No),
                _ => None,
            }
        };

        for raw in event.bookmakers {
            let bookmaker: Bookmaker = match serde_json::from_value(raw) {
                Ok(bookmaker) => bookmaker,
                Err(e) => {
                    outcome
                        .rejected
                        .push(ValidationError::UnexpectedShape(e.to_string()));
                    continue;
                }
            };
            let Some(key) = bookmaker.key.filter(|k| !k.is_empty()) else {
                outcome.rejected.push(ValidationError::MissingField {
                    field: "bookmakers.key",
                });
                continue;
            };
            let sportsbook = Sportsbook::new(&key);

            for market in bookmaker.markets {
                let Some(market_type) = market_type(&market.key) else {
                    tracing::debug!(market = %market.key, "Skipping unsupported market");
                    continue;
                };
                let Some(observed_at) = market.last_update.or(bookmaker.last_update) else {
                    outcome.rejected.push(ValidationError::MissingField {
                        field: "last_update",
                    });
                    continue;
                };

                let mut draft = QuoteDraft::new(
                    payload.game_id.clone(),
                    sportsbook.clone(),
                    market_type,
                    MarketStatus::Open,
                    observed_at,
                );
                for o in market.outcomes {
                    match side_for(market_type, &o.name) {
                        Some(side) if o.price.is_some() => {
                            draft.side(side, o.price, o.point, &mut outcome.rejected)
                        }
                        Some(_) => {
                            draft.mark_attempted();
                            outcome
                                .rejected
                                .push(ValidationError::MissingField { field: "price" });
                        }
                        None => {
                            draft.mark_attempted();
                            outcome.rejected.push(ValidationError::UnknownOutcome {
                                market: market_type,
                                name: o.name,
                            });
                        }
                    }
                }
                if let Some(quote) = draft.finish(&mut outcome.rejected) {
                    outcome.quotes.push(quote);
                }
            }
        }
        outcome
    }
}
