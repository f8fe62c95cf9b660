use crate::datamodel::{CalendarFields, CapPlanDateTimeExt, Column, ColumnValues, FeatureGrid};
use crate::error::Result;
use tracing::{debug, warn};

pub const HOUR_COLUMN: &str = "hour";
pub const DAY_OF_WEEK_COLUMN: &str = "day_of_week";
pub const DAY_COLUMN: &str = "day";
pub const MONTH_COLUMN: &str = "month";

/// Derives calendar features from the timestamp column.
///
/// The timestamp column is coerced to instants first. A cell that cannot be
/// parsed becomes missing and so do its four calendar features, the row
/// itself is kept.
#[derive(Debug, Clone)]
pub struct TimeFeatureExpander {
    timestamp_column: String,
}

impl TimeFeatureExpander {
    pub fn new(timestamp_column: &str) -> Self {
        Self {
            timestamp_column: timestamp_column.to_string(),
        }
    }

    pub fn expand(&self, mut grid: FeatureGrid) -> Result<FeatureGrid> {
        let raw = grid.require(&self.timestamp_column)?;
        let already_missing = raw.missing_count();
        let instants = raw.to_datetimes();
        let missing = instants.iter().filter(|instant| instant.is_none()).count();
        let coerced = missing.saturating_sub(already_missing);
        if coerced > 0 {
            warn!(
                "{} of {} values in '{}' could not be parsed as timestamps, their time features are missing",
                coerced,
                instants.len(),
                self.timestamp_column
            );
        }

        let calendar = instants
            .iter()
            .map(|instant| instant.map(|instant| instant.calendar_fields()))
            .collect::<Vec<_>>();
        let derived = |extract: fn(&CalendarFields) -> u8| {
            ColumnValues::Integer(
                calendar
                    .iter()
                    .map(|fields| fields.as_ref().map(|fields| extract(fields) as i64))
                    .collect(),
            )
        };
        let hour = derived(|fields| fields.hour);
        let day_of_week = derived(|fields| fields.day_of_week);
        let day = derived(|fields| fields.day);
        let month = derived(|fields| fields.month);

        grid.set_column(Column::new(
            self.timestamp_column.clone(),
            ColumnValues::DateTime(instants),
        ))?;
        grid.set_column(Column::new(HOUR_COLUMN, hour))?;
        grid.set_column(Column::new(DAY_OF_WEEK_COLUMN, day_of_week))?;
        grid.set_column(Column::new(DAY_COLUMN, day))?;
        grid.set_column(Column::new(MONTH_COLUMN, month))?;
        debug!("Added time features from '{}'", self.timestamp_column);
        Ok(grid)
    }
}
