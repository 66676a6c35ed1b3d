//! Mapping between wall-clock time, the sleep window and per-block indices/keys.
//!
//! A cycle is 24 hours long and starts at the sleep window's start hour. Blocks are
//! linearized across that cycle so they can be compared against "now".

use chrono::Timelike;
use std::fmt;

pub const HOURS_PER_CYCLE: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepWindow {
    pub start: u32,
    pub end: u32,
}

impl SleepWindow {
    pub fn new(start: u32, end: u32) -> Self {
        SleepWindow {
            start: start % HOURS_PER_CYCLE,
            end: end % HOURS_PER_CYCLE,
        }
    }
}

/// Persistence identity of a block. Same hour and sub-block on any day share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub hour: u32,
    pub block: u32,
}

impl BlockKey {
    pub fn new(hour: u32, block: u32) -> Self {
        BlockKey {
            hour: hour % HOURS_PER_CYCLE,
            block,
        }
    }

    /// Key of the block containing `time`.
    pub fn at<T: Timelike>(time: &T, blocks_per_hour: u32) -> Self {
        BlockKey::new(time.hour(), time.minute() / minutes_per_block(blocks_per_hour))
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "planner-{}-{}", self.hour, self.block)
    }
}

pub fn minutes_per_block(blocks_per_hour: u32) -> u32 {
    60 / blocks_per_hour.max(1)
}

pub fn blocks_per_cycle(blocks_per_hour: u32) -> u32 {
    HOURS_PER_CYCLE * blocks_per_hour
}

/// Index of the block containing `now`, counted from the first block of the cycle.
///
/// Hours before `sleep.start` belong to the previous day's cycle, so they land at
/// the end of the range rather than going negative.
pub fn current_block_index<T: Timelike>(
    now: &T,
    sleep: SleepWindow,
    blocks_per_hour: u32,
) -> u32 {
    let mut hour = now.hour();
    if hour < sleep.start {
        hour += HOURS_PER_CYCLE;
    }
    hour -= sleep.start;
    hour * blocks_per_hour + now.minute() / minutes_per_block(blocks_per_hour)
}

pub fn absolute_block_index(
    hour: u32,
    block: u32,
    sleep: SleepWindow,
    blocks_per_hour: u32,
) -> u32 {
    let normalized =
        (i64::from(hour) - i64::from(sleep.start)).rem_euclid(i64::from(HOURS_PER_CYCLE));
    normalized as u32 * blocks_per_hour + block
}

/// Literal `start <= hour < end`. A window that wraps midnight (start > end) never
/// matches any hour.
pub fn is_sleep_block(hour: u32, sleep: SleepWindow) -> bool {
    hour >= sleep.start && hour < sleep.end
}

pub fn format_hour_label(hour: u32) -> String {
    format!("{:02}:00", hour % HOURS_PER_CYCLE)
}

/// Hours of one cycle in display order, starting at the sleep start.
pub fn cycle_hours(sleep: SleepWindow) -> impl Iterator<Item = u32> {
    (sleep.start..sleep.start + HOURS_PER_CYCLE).map(|h| h % HOURS_PER_CYCLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn current_index_inside_cycle() {
        let sleep = SleepWindow::new(2, 10);
        assert_eq!(current_block_index(&at(3, 7), sleep, 4), 4);
    }

    #[test]
    fn current_index_before_sleep_start_wraps_to_previous_cycle() {
        let sleep = SleepWindow::new(2, 10);
        assert_eq!(current_block_index(&at(1, 50), sleep, 4), 95);
    }

    #[test]
    fn first_block_of_cycle_is_zero() {
        let sleep = SleepWindow::new(2, 10);
        assert_eq!(absolute_block_index(2, 0, sleep, 4), 0);
        assert_eq!(absolute_block_index(1, 3, sleep, 4), 95);
    }

    #[test]
    fn sleep_block_uses_plain_comparison() {
        assert!(is_sleep_block(3, SleepWindow::new(2, 10)));
        assert!(!is_sleep_block(11, SleepWindow::new(2, 10)));
        assert!(!is_sleep_block(10, SleepWindow::new(2, 10)));
        // wrapping windows are not recognised
        assert!(!is_sleep_block(23, SleepWindow::new(22, 6)));
        assert!(!is_sleep_block(3, SleepWindow::new(22, 6)));
    }

    #[test]
    fn hour_labels() {
        assert_eq!(format_hour_label(0), "00:00");
        assert_eq!(format_hour_label(9), "09:00");
        assert_eq!(format_hour_label(25), "01:00");
    }

    #[test]
    fn block_key_text_form() {
        assert_eq!(BlockKey::new(5, 2).to_string(), "planner-5-2");
        assert_eq!(BlockKey::at(&at(13, 44), 4), BlockKey::new(13, 2));
        assert_eq!(BlockKey::at(&at(13, 44), 2), BlockKey::new(13, 1));
    }

    #[test]
    fn cycle_starts_at_sleep_start() {
        let hours: Vec<u32> = cycle_hours(SleepWindow::new(22, 6)).collect();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0], 22);
        assert_eq!(hours[2], 0);
        assert_eq!(hours[23], 21);
    }

    #[test]
    fn current_block_matches_its_own_absolute_index() {
        let sleep = SleepWindow::new(7, 23);
        let now = at(6, 59);
        let key = BlockKey::at(&now, 4);
        assert_eq!(
            current_block_index(&now, sleep, 4),
            absolute_block_index(key.hour, key.block, sleep, 4)
        );
    }

    fn divisors_of_60() -> impl Strategy<Value = u32> {
        prop::sample::select(vec![1u32, 2, 3, 4, 5, 6, 10, 12, 15, 20, 30, 60])
    }

    proptest! {
        #[test]
        fn hour_label_is_periodic(hour in 0u32..24) {
            prop_assert_eq!(format_hour_label(hour), format_hour_label(hour + 24));
        }

        #[test]
        fn absolute_index_is_a_bijection(start in 0u32..24, end in 0u32..24, bph in divisors_of_60()) {
            let sleep = SleepWindow::new(start, end);
            let mut seen = HashSet::new();
            for hour in 0..24 {
                for block in 0..bph {
                    let idx = absolute_block_index(hour, block, sleep, bph);
                    prop_assert!(idx < blocks_per_cycle(bph));
                    prop_assert!(seen.insert(idx));
                }
            }
            prop_assert_eq!(seen.len() as u32, blocks_per_cycle(bph));
        }

        #[test]
        fn current_index_never_decreases_within_a_cycle(
            start in 0u32..24,
            offset in 0u32..(24 * 60 - 1),
            bph in divisors_of_60(),
        ) {
            let sleep = SleepWindow::new(start, 0);
            let minute_of_day = |off: u32| (start * 60 + off) % (24 * 60);
            let t0 = minute_of_day(offset);
            let t1 = minute_of_day(offset + 1);
            let a = current_block_index(&at(t0 / 60, t0 % 60), sleep, bph);
            let b = current_block_index(&at(t1 / 60, t1 % 60), sleep, bph);
            prop_assert!(a <= b);
            prop_assert_eq!(a, current_block_index(&at(t0 / 60, t0 % 60), sleep, bph));
        }
    }
}
