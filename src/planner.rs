//! Per-cycle view model: which blocks exist, how each is classified, and the
//! writes that user interaction performs on the store.

use crate::config::PlannerConfig;
use crate::schedule::{
    absolute_block_index, current_block_index, cycle_hours, format_hour_label, is_sleep_block,
    BlockKey, SleepWindow, HOURS_PER_CYCLE,
};
use crate::storage::KeyValueStore;
use anyhow::Result;
use chrono::Timelike;

const ACTIVE: &str = "1";
const INACTIVE: &str = "0";

/// Classification flags of one block. They are independent of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockFlags {
    pub past: bool,
    pub current: bool,
    pub sleep: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCell {
    pub key: BlockKey,
    pub index: u32,
    pub flags: BlockFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourRow {
    pub hour: u32,
    pub label: String,
    pub note: Option<String>,
    pub blocks: Vec<BlockCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerGrid {
    pub sleep: SleepWindow,
    pub current_index: u32,
    pub blocks_per_hour: u32,
    pub rows: Vec<HourRow>,
}

impl PlannerGrid {
    pub fn cell(&self, row: usize, col: usize) -> Option<&BlockCell> {
        self.rows.get(row).and_then(|r| r.blocks.get(col))
    }

    /// Row/column of the block flagged as current.
    pub fn current_position(&self) -> Option<(usize, usize)> {
        let bph = self.blocks_per_hour as usize;
        let idx = self.current_index as usize;
        if bph == 0 || idx >= self.rows.len() * bph {
            return None;
        }
        Some((idx / bph, idx % bph))
    }

    pub fn active_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.blocks.iter())
            .filter(|b| b.flags.active)
            .count()
    }
}

/// Builds the grid for one render cycle. The sleep window is read once and shared
/// by every block of the cycle.
pub fn build_grid<T: Timelike>(
    store: &impl KeyValueStore,
    config: &PlannerConfig,
    now: &T,
) -> PlannerGrid {
    let sleep = SleepWindow::load(store, config);
    let bph = config.blocks_per_hour;
    let current_index = current_block_index(now, sleep, bph);

    let rows = cycle_hours(sleep)
        .map(|hour| {
            let blocks = (0..bph)
                .map(|block| {
                    let key = BlockKey::new(hour, block);
                    let index = absolute_block_index(hour, block, sleep, bph);
                    BlockCell {
                        key,
                        index,
                        flags: BlockFlags {
                            past: index < current_index,
                            current: index == current_index,
                            sleep: is_sleep_block(hour, sleep),
                            active: block_state(store, key),
                        },
                    }
                })
                .collect();
            HourRow {
                hour,
                label: format_hour_label(hour),
                note: hour_note(store, hour),
                blocks,
            }
        })
        .collect();

    tracing::debug!(
        start = sleep.start,
        end = sleep.end,
        current_index,
        "built planner grid"
    );
    PlannerGrid {
        sleep,
        current_index,
        blocks_per_hour: bph,
        rows,
    }
}

pub fn block_state(store: &impl KeyValueStore, key: BlockKey) -> bool {
    store.get(&key.to_string()).as_deref() == Some(ACTIVE)
}

/// Flips and persists the state of one block, returning the new state.
pub fn toggle_block(store: &mut impl KeyValueStore, key: BlockKey) -> Result<bool> {
    let next = !block_state(store, key);
    let value = if next { ACTIVE } else { INACTIVE };
    store.set(&key.to_string(), value.to_string())?;
    tracing::info!(key = %key, active = next, "toggled block");
    Ok(next)
}

fn note_key(hour: u32) -> String {
    format!("planner-{}", hour % HOURS_PER_CYCLE)
}

pub fn hour_note(store: &impl KeyValueStore, hour: u32) -> Option<String> {
    store.get(&note_key(hour)).filter(|n| !n.trim().is_empty())
}

/// Sets the free-text note of an hour. Blank text removes it.
pub fn set_hour_note(store: &mut impl KeyValueStore, hour: u32, text: &str) -> Result<()> {
    let key = note_key(hour);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        store.remove(&key)?;
        tracing::info!(hour = hour % HOURS_PER_CYCLE, "cleared hour note");
    } else {
        store.set(&key, trimmed.to_string())?;
        tracing::info!(hour = hour % HOURS_PER_CYCLE, "saved hour note");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::save_sleep_settings;
    use crate::storage::MemoryStore;
    use chrono::NaiveTime;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn grid_covers_one_cycle_from_sleep_start() {
        let store = MemoryStore::default();
        let config = PlannerConfig::default();
        let grid = build_grid(&store, &config, &at(3, 7));

        assert_eq!(grid.rows.len(), 24);
        assert_eq!(grid.rows[0].hour, 2);
        assert_eq!(grid.rows[0].label, "02:00");
        assert_eq!(grid.rows[23].hour, 1);
        assert!(grid.rows.iter().all(|r| r.blocks.len() == 4));
        assert_eq!(grid.current_index, 4);
        assert_eq!(grid.current_position(), Some((1, 0)));
        for (n, cell) in grid.rows.iter().flat_map(|r| r.blocks.iter()).enumerate() {
            assert_eq!(cell.index as usize, n);
        }
    }

    #[test]
    fn flags_are_independent() {
        let mut store = MemoryStore::default();
        let config = PlannerConfig::default();
        toggle_block(&mut store, BlockKey::new(2, 1)).unwrap();
        let grid = build_grid(&store, &config, &at(3, 7));

        let cell = grid.cell(0, 1).unwrap();
        assert_eq!(cell.key, BlockKey::new(2, 1));
        assert_eq!(
            cell.flags,
            BlockFlags {
                past: true,
                current: false,
                sleep: true,
                active: true,
            }
        );

        let current = grid.cell(1, 0).unwrap();
        assert!(current.flags.current && current.flags.sleep);
        assert!(!current.flags.past && !current.flags.active);

        let later = grid.cell(10, 0).unwrap();
        assert_eq!(later.key.hour, 12);
        assert_eq!(later.flags, BlockFlags::default());
        assert_eq!(grid.active_count(), 1);
    }

    #[test]
    fn toggle_persists_one_then_zero() {
        let mut store = MemoryStore::default();
        let key = BlockKey::new(5, 2);
        assert!(!block_state(&store, key));
        assert!(toggle_block(&mut store, key).unwrap());
        assert_eq!(store.get("planner-5-2").as_deref(), Some("1"));
        assert!(!toggle_block(&mut store, key).unwrap());
        assert_eq!(store.get("planner-5-2").as_deref(), Some("0"));
    }

    #[test]
    fn grid_follows_saved_settings() {
        let mut store = MemoryStore::default();
        let config = PlannerConfig::default();
        save_sleep_settings(&mut store, "22:00", "06:00").unwrap();
        let grid = build_grid(&store, &config, &at(23, 30));

        assert_eq!(grid.rows[0].hour, 22);
        assert_eq!(grid.current_index, 6);
        // wrapping window: no row is classified as sleep
        assert!(grid
            .rows
            .iter()
            .flat_map(|r| r.blocks.iter())
            .all(|b| !b.flags.sleep));
    }

    #[test]
    fn hour_notes_are_shown_on_their_row() {
        let mut store = MemoryStore::default();
        let config = PlannerConfig::default();
        set_hour_note(&mut store, 14, "  standup ").unwrap();
        let grid = build_grid(&store, &config, &at(9, 0));
        let row = grid.rows.iter().find(|r| r.hour == 14).unwrap();
        assert_eq!(row.note.as_deref(), Some("standup"));

        set_hour_note(&mut store, 14, "").unwrap();
        assert_eq!(hour_note(&store, 14), None);
        assert_eq!(store.get("planner-14"), None);
    }

    #[test]
    fn notes_do_not_collide_with_block_keys() {
        let mut store = MemoryStore::default();
        set_hour_note(&mut store, 5, "gym").unwrap();
        toggle_block(&mut store, BlockKey::new(5, 0)).unwrap();
        assert_eq!(hour_note(&store, 5).as_deref(), Some("gym"));
        assert!(block_state(&store, BlockKey::new(5, 0)));
    }

    #[test]
    fn coarser_blocks() {
        let store = MemoryStore::default();
        let config = PlannerConfig {
            blocks_per_hour: 2,
            ..PlannerConfig::default()
        };
        let grid = build_grid(&store, &config, &at(3, 45));
        assert!(grid.rows.iter().all(|r| r.blocks.len() == 2));
        assert_eq!(grid.current_index, 3);
    }

    proptest! {
        #[test]
        fn toggling_twice_restores_state(hour in 0u32..24, block in 0u32..4, initially_on: bool) {
            let mut store = MemoryStore::default();
            let key = BlockKey::new(hour, block);
            if initially_on {
                toggle_block(&mut store, key).unwrap();
            }
            let before = block_state(&store, key);
            toggle_block(&mut store, key).unwrap();
            toggle_block(&mut store, key).unwrap();
            prop_assert_eq!(block_state(&store, key), before);
        }

        #[test]
        fn exactly_one_current_block(h in 0u32..24, m in 0u32..60, start in 0u32..24) {
            let mut store = MemoryStore::default();
            let start_text = format!("{:02}:00", start);
            save_sleep_settings(&mut store, &start_text, "10:00").unwrap();
            let grid = build_grid(&store, &PlannerConfig::default(), &at(h, m));
            let current: Vec<_> = grid
                .rows
                .iter()
                .flat_map(|r| r.blocks.iter())
                .filter(|b| b.flags.current)
                .collect();
            prop_assert_eq!(current.len(), 1);
            prop_assert_eq!(current[0].key, BlockKey::at(&at(h, m), 4));
        }
    }
}
