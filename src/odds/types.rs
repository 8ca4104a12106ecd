//! Canonical odds types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Game identifier as issued by the sports-data service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Sportsbook identity. Names are normalized to lowercase so that the same
/// book reported by two different sources maps to one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sportsbook(String);

impl Sportsbook {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sportsbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sportsbook {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Market type. Fixed set; adding one is a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
    Prop,
}

impl MarketType {
    pub const ALL: [MarketType; 4] = [
        MarketType::Moneyline,
        MarketType::Spread,
        MarketType::Total,
        MarketType::Prop,
    ];
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketType::Moneyline => "moneyline",
            MarketType::Spread => "spread",
            MarketType::Total => "total",
            MarketType::Prop => "prop",
        };
        f.write_str(s)
    }
}

impl FromStr for MarketType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moneyline" => Ok(MarketType::Moneyline),
            "spread" => Ok(MarketType::Spread),
            "total" => Ok(MarketType::Total),
            "prop" => Ok(MarketType::Prop),
            other => anyhow::bail!("unknown market type: {}", other),
        }
    }
}

/// One side of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
    Draw,
    Over,
    Under,
    Yes,
    No,
}

impl Side {
    /// The opposing side in a two-sided market. `Draw` has none.
    pub fn opposite(self) -> Option<Side> {
        match self {
            Side::Home => Some(Side::Away),
            Side::Away => Some(Side::Home),
            Side::Over => Some(Side::Under),
            Side::Under => Some(Side::Over),
            Side::Yes => Some(Side::No),
            Side::No => Some(Side::Yes),
            Side::Draw => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Draw => "draw",
            Side::Over => "over",
            Side::Under => "under",
            Side::Yes => "yes",
            Side::No => "no",
        };
        f.write_str(s)
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            "draw" => Ok(Side::Draw),
            "over" => Ok(Side::Over),
            "under" => Ok(Side::Under),
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            other => anyhow::bail!("unknown side: {}", other),
        }
    }
}

/// Price for one side: American odds plus the line (spread/total point) when
/// the market has one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidePrice {
    pub odds: Decimal,
    pub line: Option<Decimal>,
}

impl SidePrice {
    pub fn new(odds: Decimal) -> Self {
        Self { odds, line: None }
    }

    pub fn with_line(odds: Decimal, line: Decimal) -> Self {
        Self {
            odds,
            line: Some(line),
        }
    }
}

/// Whether the book is currently taking action on the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    #[default]
    Open,
    Suspended,
    Closed,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketStatus::Open => "open",
            MarketStatus::Suspended => "suspended",
            MarketStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

impl FromStr for MarketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" | "active" => Ok(MarketStatus::Open),
            "suspended" | "paused" => Ok(MarketStatus::Suspended),
            "closed" | "settled" => Ok(MarketStatus::Closed),
            other => anyhow::bail!("unknown market status: {}", other),
        }
    }
}

/// Snapshot key: one live slot per (game, book, market)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteKey {
    pub game_id: GameId,
    pub sportsbook: Sportsbook,
    pub market_type: MarketType,
}

impl fmt::Display for QuoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game_id, self.sportsbook, self.market_type)
    }
}

/// Reference to a stored quote by its uniqueness key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteRef {
    pub key: QuoteKey,
    pub observed_at: DateTime<Utc>,
}

/// Canonical price snapshot. Immutable: a new observation is a new quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub game_id: GameId,
    pub sportsbook: Sportsbook,
    pub market_type: MarketType,
    pub side_values: BTreeMap<Side, SidePrice>,
    pub limit_amount: Option<Decimal>,
    pub market_status: MarketStatus,
    pub observed_at: DateTime<Utc>,
}

impl OddsQuote {
    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            game_id: self.game_id.clone(),
            sportsbook: self.sportsbook.clone(),
            market_type: self.market_type,
        }
    }

    pub fn quote_ref(&self) -> QuoteRef {
        QuoteRef {
            key: self.key(),
            observed_at: self.observed_at,
        }
    }

    pub fn price(&self, side: Side) -> Option<&SidePrice> {
        self.side_values.get(&side)
    }

    /// True when both sides of at least one opposing pair are quoted
    pub fn is_two_sided(&self) -> bool {
        self.side_values.keys().any(|side| {
            side.opposite()
                .map(|o| self.side_values.contains_key(&o))
                .unwrap_or(false)
        })
    }

    pub fn is_open(&self) -> bool {
        self.market_status == MarketStatus::Open
    }
}

/// Public betting split for one market, supplied by an external collaborator.
/// Percentages are on a 0-100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BettingSplits {
    /// Share of tickets (bet count) per side
    pub tickets: BTreeMap<Side, Decimal>,
    /// Share of handle (money) per side, when the provider has it
    pub money: Option<BTreeMap<Side, Decimal>>,
}

impl BettingSplits {
    /// Side holding a strict majority of tickets. Ties have no majority.
    pub fn majority_side(&self) -> Option<Side> {
        let mut best: Option<(Side, Decimal)> = None;
        let mut tied = false;
        for (&side, &pct) in &self.tickets {
            match best {
                Some((_, top)) if pct > top => {
                    best = Some((side, pct));
                    tied = false;
                }
                Some((_, top)) if pct == top => tied = true,
                None => best = Some((side, pct)),
                _ => {}
            }
        }
        if tied {
            None
        } else {
            best.map(|(side, _)| side)
        }
    }

    /// Largest amount by which a side's money share exceeds its ticket share,
    /// as a fraction (0.15 = 15 points). `None` without money data.
    pub fn ticket_money_divergence(&self) -> Option<Decimal> {
        let money = self.money.as_ref()?;
        let hundred = Decimal::ONE_HUNDRED;
        money
            .iter()
            .filter_map(|(side, money_pct)| {
                self.tickets
                    .get(side)
                    .map(|ticket_pct| (*money_pct - *ticket_pct) / hundred)
            })
            .max()
            .map(|d| d.max(Decimal::ZERO))
    }
}

/// Errors computing derived metrics from a quote. Scoped to one side or one
/// quote; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputationError {
    /// American odds of exactly zero
    #[error("odds value is zero")]
    ZeroOdds,
    /// |odds| below 100 has no meaning in American format
    #[error("odds out of range: {0}")]
    OddsOutOfRange(Decimal),
    /// Probability outside the open interval (0, 1)
    #[error("probability out of range: {0}")]
    ProbabilityOutOfRange(Decimal),
    /// Single-book market efficiency below 1.0
    #[error("negative vig on a single book (efficiency {0})")]
    NegativeVig(Decimal),
}
