//! Fixed-step daily timestepper.
//!
//! Timestep `i` is stamped `start + i * timestep_days`. The last timestep is
//! the last stamp that does not go past `end`.

use chrono::{Duration, NaiveDate};

use crate::error::{CoreError, CoreResult};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestepper {
    start: NaiveDate,
    end: NaiveDate,
    timestep_days: u32,
}

impl Timestepper {
    pub fn new(start: NaiveDate, end: NaiveDate, timestep_days: u32) -> CoreResult<Self> {
        if timestep_days == 0 {
            return Err(CoreError::InvalidArg {
                what: "timestep must be at least one day",
            });
        }
        if start >= end {
            return Err(CoreError::InvalidSchedule { start, end });
        }
        Ok(Self {
            start,
            end,
            timestep_days,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn timestep_days(&self) -> u32 {
        self.timestep_days
    }

    /// Number of timesteps in the run.
    pub fn len(&self) -> usize {
        let span = (self.end - self.start).num_days() as usize;
        span / self.timestep_days as usize + 1
    }

    /// Always false; a valid timestepper has at least two timesteps.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn last_index(&self) -> usize {
        self.len() - 1
    }

    pub fn timestamp_at(&self, index: usize) -> Option<NaiveDate> {
        if index >= self.len() {
            return None;
        }
        let offset = index as i64 * self.timestep_days as i64;
        self.start.checked_add_signed(Duration::days(offset))
    }

    pub fn last_timestamp(&self) -> NaiveDate {
        // len() >= 1, so the last index always maps to a date
        self.timestamp_at(self.last_index()).unwrap_or(self.end)
    }

    /// Index of the timestep stamped exactly `date`.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if date < self.start || date > self.end {
            return None;
        }
        let offset = (date - self.start).num_days() as usize;
        let step = self.timestep_days as usize;
        (offset % step == 0).then_some(offset / step)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.index_of(date).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_steps_include_both_ends() {
        let ts = Timestepper::new(date(2015, 1, 1), date(2015, 1, 5), 1).unwrap();
        assert_eq!(ts.len(), 5);
        assert_eq!(ts.timestamp_at(0), Some(date(2015, 1, 1)));
        assert_eq!(ts.timestamp_at(4), Some(date(2015, 1, 5)));
        assert_eq!(ts.timestamp_at(5), None);
        assert_eq!(ts.last_timestamp(), date(2015, 1, 5));
    }

    #[test]
    fn weekly_steps_stop_before_end() {
        let ts = Timestepper::new(date(2015, 1, 1), date(2015, 1, 20), 7).unwrap();
        // 01, 08, 15
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.last_timestamp(), date(2015, 1, 15));
        assert_eq!(ts.index_of(date(2015, 1, 8)), Some(1));
        assert_eq!(ts.index_of(date(2015, 1, 9)), None);
        assert!(!ts.contains(date(2015, 1, 20)));
    }

    #[test]
    fn rejects_inverted_or_empty_schedule() {
        assert_eq!(
            Timestepper::new(date(2015, 1, 5), date(2015, 1, 5), 1),
            Err(CoreError::InvalidSchedule {
                start: date(2015, 1, 5),
                end: date(2015, 1, 5),
            })
        );
        assert!(Timestepper::new(date(2015, 1, 1), date(2015, 1, 5), 0).is_err());
    }

    #[test]
    fn out_of_range_dates_have_no_index() {
        let ts = Timestepper::new(date(2015, 1, 1), date(2015, 1, 5), 1).unwrap();
        assert_eq!(ts.index_of(date(2014, 12, 31)), None);
        assert_eq!(ts.index_of(date(2015, 1, 6)), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_timestamp_maps_back_to_its_index(span in 1i64..400, step in 1u32..30) {
                let start = date(2000, 1, 1);
                let end = start + Duration::days(span);
                let ts = Timestepper::new(start, end, step).unwrap();
                for i in 0..ts.len() {
                    let t = ts.timestamp_at(i).unwrap();
                    prop_assert!(t <= end);
                    prop_assert_eq!(ts.index_of(t), Some(i));
                }
            }
        }
    }
}
