use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plugin-local row id of a configured trading server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(pub i64);

/// Plugin-local row id of a provider (one exchange connection on one server).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub i64);

/// Plugin-local row id of a mirrored catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CatalogId(pub i64);

/// Plugin-local row id of a mirrored case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub i64);

/// Plugin-local row id of an intention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentionId(pub i64);

/// Plugin-local row id of a persisted buy/sell schedule pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub i64);

/// The host system's id for a case. Never interchangeable with [`CaseId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostCaseId(pub i64);

/// The host system's id for a catalog. Never interchangeable with [`CatalogId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostCatalogId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostSessionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAnalysisId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostRateId(pub i64);

/// The trading API's own id for a provider, as returned by its listing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteProviderId(pub String);

/// The trading API's own id for a created schedule.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteScheduleId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Outcome of the two-leg remote scheduling call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Scheduled,
    /// Remote buy leg exists but the linked sell leg was rejected.
    SellFailed,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::SellFailed => "sell_failed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScheduleStatus::Pending),
            "scheduled" => Some(ScheduleStatus::Scheduled),
            "sell_failed" => Some(ScheduleStatus::SellFailed),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// Entity kinds a lookup can fail on, for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Server,
    Provider,
    Catalog,
    Case,
    Intention,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Server => "server",
            Entity::Provider => "provider",
            Entity::Catalog => "catalog",
            Entity::Case => "case",
            Entity::Intention => "intention",
        };
        f.write_str(name)
    }
}

/// A configured base URL + credential for the external trading API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub url: String,
    pub description: String,
    pub api_key: String,
    pub selected: bool,
}

/// One exchange connection via a given server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    /// The trading API's provider id, mirrored locally at registration time.
    pub server_provider_id: String,
    pub server_id: ServerId,
    pub url: String,
    pub api_key: String,
    pub exchange_id: String,
    pub selected: bool,
}

/// Local mirror of a host catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub id: CatalogId,
    pub name: String,
    pub host_catalog_id: HostCatalogId,
    pub selected: bool,
}

/// Local mirror of a host case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub host_case_id: HostCaseId,
    pub name: String,
    pub catalog_id: CatalogId,
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

/// A user-defined trade template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intention {
    pub id: IntentionId,
    pub description: String,
    pub intention: String,
    pub hold_minutes: i64,
    pub amount: f64,
    pub stop_loss_percentage: f64,
    pub take_profit_percentage: f64,
    pub selected: bool,
}

/// Persisted record of a buy+sell order pair submitted to the trading API.
///
/// The sell id is absent when the sell leg failed after a successful buy leg;
/// such records are kept for manual reconciliation against the remote system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentionSchedule {
    pub id: ScheduleId,
    pub intention_id: IntentionId,
    pub buy_datetime: DateTime<Utc>,
    pub sell_datetime: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub server_schedule_buy_id: Option<RemoteScheduleId>,
    pub server_schedule_sell_id: Option<RemoteScheduleId>,
    pub created_at: DateTime<Utc>,
}
