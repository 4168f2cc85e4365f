//! Shared query parameter types for movement handlers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use custody_core::error::CoreError;
use custody_core::listing::{CursorRequest, MovementFilter, MovementQuery, PageRequest, SortSpec};
use custody_core::types::{EntityId, Timestamp};

/// Query string accepted by every movement read endpoint.
///
/// Pagination fields are only consulted by the endpoints that paginate.
/// Dates accept RFC 3339 timestamps or plain `YYYY-MM-DD` days; a plain
/// `moved_to` day includes the whole day.
#[derive(Debug, Default, Deserialize)]
pub struct MovementParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub before: Option<EntityId>,
    pub after: Option<EntityId>,
    pub search: Option<String>,
    pub sort: Option<String>,
    /// Annotation language to return.
    pub lang: Option<String>,
    pub asset_id: Option<EntityId>,
    pub from_location_id: Option<EntityId>,
    pub to_location_id: Option<EntityId>,
    pub from_custodian_id: Option<EntityId>,
    pub to_custodian_id: Option<EntityId>,
    pub moved_by: Option<EntityId>,
    pub moved_from: Option<String>,
    pub moved_to: Option<String>,
}

impl MovementParams {
    pub fn to_query(&self) -> Result<MovementQuery, CoreError> {
        let filter = MovementFilter {
            asset_id: self.asset_id,
            from_location_id: self.from_location_id,
            to_location_id: self.to_location_id,
            from_custodian_id: self.from_custodian_id,
            to_custodian_id: self.to_custodian_id,
            moved_by: self.moved_by,
            moved_from: parse_bound(self.moved_from.as_deref(), "moved_from", false)?,
            moved_to: parse_bound(self.moved_to.as_deref(), "moved_to", true)?,
        };
        filter.validate()?;

        Ok(MovementQuery {
            search: self.search.clone(),
            filter,
            sort: SortSpec::parse(self.sort.as_deref())?,
        })
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.limit, self.offset)
    }

    pub fn cursor(&self) -> Result<CursorRequest, CoreError> {
        CursorRequest::new(self.before, self.after, self.limit)
    }
}

fn parse_bound(
    raw: Option<&str>,
    field: &str,
    end_of_day: bool,
) -> Result<Option<Timestamp>, CoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let invalid = || {
        CoreError::Validation(format!(
            "Invalid {field} '{raw}'. Expected RFC 3339 or YYYY-MM-DD"
        ))
    };
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    let at = if end_of_day {
        day.and_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        day.and_hms_opt(0, 0, 0)
    };
    at.map(|dt| Some(dt.and_utc())).ok_or_else(invalid)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn plain_days_cover_the_whole_day() {
        let params = MovementParams {
            moved_from: Some("2026-03-01".into()),
            moved_to: Some("2026-03-01".into()),
            ..Default::default()
        };
        let query = params.to_query().unwrap();
        let from = query.filter.moved_from.unwrap();
        let to = query.filter.moved_to.unwrap();
        assert_eq!(from.day(), 1);
        assert_eq!(from.hour(), 0);
        assert_eq!(to.hour(), 23);
        assert!(from < to);
    }

    #[test]
    fn rfc3339_is_accepted() {
        let params = MovementParams {
            moved_from: Some("2026-03-01T10:00:00+02:00".into()),
            ..Default::default()
        };
        let from = params.to_query().unwrap().filter.moved_from.unwrap();
        assert_eq!(from.hour(), 8);
    }

    #[test]
    fn malformed_date_and_sort_are_validation_errors() {
        let bad_date = MovementParams {
            moved_to: Some("yesterday".into()),
            ..Default::default()
        };
        assert_matches!(bad_date.to_query(), Err(CoreError::Validation(_)));

        let bad_sort = MovementParams {
            sort: Some("-colour".into()),
            ..Default::default()
        };
        assert_matches!(bad_sort.to_query(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn cursor_rejects_both_directions() {
        let id = custody_core::types::new_movement_id();
        let params = MovementParams {
            before: Some(id),
            after: Some(id),
            ..Default::default()
        };
        assert_matches!(params.cursor(), Err(CoreError::Validation(_)));
    }
}
