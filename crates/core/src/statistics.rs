//! Aggregate views over the movement ledger.
//!
//! Every figure is recomputed from a fresh ledger scan on each call. Nothing
//! is cached between calls.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::CoreError;
use crate::ledger::MovementLedger;
use crate::movement::{MovementEntry, MovementKind};
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Entries kept in each top-N ranking.
pub const TOP_N: usize = 10;

/// Entries kept in the recent-activity feed.
pub const RECENT_FEED_SIZE: usize = 10;

/// Days covered by the daily trend series (including today).
pub const TREND_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MovementStatistics {
    pub total: TotalStats,
    pub by_asset: Vec<AssetCount>,
    pub by_location: Vec<LocationFlow>,
    pub by_user: Vec<UserCount>,
    pub by_movement_type: MovementTypeBreakdown,
    pub recent: Vec<RecentMovement>,
    pub daily_trend: Vec<DailyCount>,
    pub summary: SummaryMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalStats {
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetCount {
    pub asset_id: EntityId,
    pub asset_tag: String,
    pub count: i64,
}

/// Traffic through one location. `net` is incoming minus outgoing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFlow {
    pub location_id: EntityId,
    pub name: Option<String>,
    pub incoming: i64,
    pub outgoing: i64,
    pub net: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCount {
    pub user_id: EntityId,
    pub name: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MovementTypeBreakdown {
    pub location_to_location: i64,
    pub location_to_user: i64,
    pub user_to_location: i64,
    pub user_to_user: i64,
    pub new_asset: i64,
}

impl MovementTypeBreakdown {
    fn record(&mut self, kind: MovementKind) {
        let slot = match kind {
            MovementKind::LocationToLocation => &mut self.location_to_location,
            MovementKind::LocationToCustodian => &mut self.location_to_user,
            MovementKind::CustodianToLocation => &mut self.user_to_location,
            MovementKind::CustodianToCustodian => &mut self.user_to_user,
            MovementKind::NewAsset => &mut self.new_asset,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentMovement {
    pub id: EntityId,
    pub asset_id: EntityId,
    pub kind: MovementKind,
    pub summary: String,
    pub moved_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetrics {
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub unique_assets: i64,
    pub unique_locations: i64,
    pub unique_users: i64,
    pub earliest_movement: Option<Timestamp>,
    pub latest_movement: Option<Timestamp>,
    /// Total divided by whole days between earliest and latest; 0 for a zero span.
    pub avg_per_day: f64,
    /// Total divided by distinct assets; 0 when no asset was moved.
    pub avg_per_asset: f64,
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Read-only statistics over a ledger.
pub struct StatisticsAggregator<'a> {
    ledger: &'a dyn MovementLedger,
}

impl<'a> StatisticsAggregator<'a> {
    pub fn new(ledger: &'a dyn MovementLedger) -> Self {
        Self { ledger }
    }

    pub async fn compute(&self) -> Result<MovementStatistics, CoreError> {
        let entries = self.ledger.scan().await?;
        Ok(compute_statistics(&entries, chrono::Utc::now()))
    }
}

/// Derive every statistic from `entries` as seen at `now`.
pub fn compute_statistics(entries: &[MovementEntry], now: Timestamp) -> MovementStatistics {
    let today = now.date_naive();
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month_start = today.with_day(1).unwrap_or(today);
    let trend_start = today - Duration::days(TREND_DAYS - 1);

    let mut by_asset: HashMap<EntityId, AssetCount> = HashMap::new();
    let mut by_location: HashMap<EntityId, LocationFlow> = HashMap::new();
    let mut by_user: HashMap<EntityId, UserCount> = HashMap::new();
    let mut by_type = MovementTypeBreakdown::default();
    let mut per_day: HashMap<NaiveDate, i64> = HashMap::new();
    let mut users_touched: HashSet<EntityId> = HashSet::new();

    let (mut in_today, mut in_week, mut in_month) = (0i64, 0i64, 0i64);
    let mut earliest: Option<Timestamp> = None;
    let mut latest: Option<Timestamp> = None;

    for entry in entries {
        let r = &entry.record;
        let labels = &entry.labels;

        by_asset
            .entry(r.asset_id)
            .or_insert_with(|| AssetCount {
                asset_id: r.asset_id,
                asset_tag: labels.asset_tag.clone(),
                count: 0,
            })
            .count += 1;

        if let Some(from) = r.from_location_id {
            location_slot(&mut by_location, from, &labels.from_location_name).outgoing += 1;
        }
        if let Some(to) = r.destination.location_id() {
            location_slot(&mut by_location, to, &labels.to_location_name).incoming += 1;
        }

        by_user
            .entry(r.moved_by)
            .or_insert_with(|| UserCount {
                user_id: r.moved_by,
                name: labels.moved_by_name.clone(),
                count: 0,
            })
            .count += 1;

        users_touched.insert(r.moved_by);
        users_touched.extend(r.from_custodian_id);
        users_touched.extend(r.destination.custodian_id());

        by_type.record(r.kind());

        let day = r.moved_at.date_naive();
        if day >= trend_start {
            *per_day.entry(day).or_insert(0) += 1;
        }
        if day == today {
            in_today += 1;
        }
        if day >= week_start {
            in_week += 1;
        }
        if day >= month_start {
            in_month += 1;
        }

        earliest = Some(earliest.map_or(r.moved_at, |e| e.min(r.moved_at)));
        latest = Some(latest.map_or(r.moved_at, |l| l.max(r.moved_at)));
    }

    let total = entries.len() as i64;
    let unique_assets = by_asset.len() as i64;

    let span_days = match (earliest, latest) {
        (Some(e), Some(l)) => (l - e).num_days(),
        _ => 0,
    };
    let avg_per_day = if span_days > 0 {
        round2(total as f64 / span_days as f64)
    } else {
        0.0
    };
    let avg_per_asset = if unique_assets > 0 {
        round2(total as f64 / unique_assets as f64)
    } else {
        0.0
    };

    let daily_trend = (0..TREND_DAYS)
        .map(|offset| {
            let date = trend_start + Duration::days(offset);
            DailyCount {
                date,
                count: per_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    let mut recent: Vec<&MovementEntry> = entries.iter().collect();
    recent.sort_by(|a, b| {
        b.record
            .moved_at
            .cmp(&a.record.moved_at)
            .then_with(|| b.record.id.cmp(&a.record.id))
    });
    let recent = recent
        .into_iter()
        .take(RECENT_FEED_SIZE)
        .map(|e| RecentMovement {
            id: e.record.id,
            asset_id: e.record.asset_id,
            kind: e.record.kind(),
            summary: e.summary(),
            moved_at: e.record.moved_at,
        })
        .collect();

    let unique_locations = by_location.len() as i64;

    let mut by_asset: Vec<AssetCount> = by_asset.into_values().collect();
    by_asset.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.asset_id.cmp(&b.asset_id)));
    by_asset.truncate(TOP_N);

    let mut by_location: Vec<LocationFlow> = by_location
        .into_values()
        .map(|mut flow| {
            flow.net = flow.incoming - flow.outgoing;
            flow
        })
        .collect();
    by_location.sort_by(|a, b| {
        (b.incoming + b.outgoing)
            .cmp(&(a.incoming + a.outgoing))
            .then_with(|| a.location_id.cmp(&b.location_id))
    });
    by_location.truncate(TOP_N);

    let mut by_user: Vec<UserCount> = by_user.into_values().collect();
    by_user.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_id.cmp(&b.user_id)));
    by_user.truncate(TOP_N);

    MovementStatistics {
        total: TotalStats { count: total },
        by_asset,
        by_location,
        by_user,
        by_movement_type: by_type,
        recent,
        daily_trend,
        summary: SummaryMetrics {
            today: in_today,
            this_week: in_week,
            this_month: in_month,
            unique_assets,
            unique_locations,
            unique_users: users_touched.len() as i64,
            earliest_movement: earliest,
            latest_movement: latest,
            avg_per_day,
            avg_per_asset,
        },
    }
}

fn location_slot<'m>(
    map: &'m mut HashMap<EntityId, LocationFlow>,
    id: EntityId,
    name: &Option<String>,
) -> &'m mut LocationFlow {
    let slot = map.entry(id).or_insert_with(|| LocationFlow {
        location_id: id,
        name: None,
        incoming: 0,
        outgoing: 0,
        net: 0,
    });
    if slot.name.is_none() {
        slot.name = name.clone();
    }
    slot
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
