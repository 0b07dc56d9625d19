//! Engine clock and time-window evaluation.
//!
//! Polled once per tick by the scheduler; also the source of the discrete
//! minute-boundary / moon-phase-change events that drive time-restriction
//! re-evaluation (see `zone::trigger`).

use serde::{Deserialize, Serialize};

/// Engine-wide clock snapshot: real (system) time alongside the in-game
/// clock, which runs on its own hour/minute/moon-phase cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldClock {
    pub system_hour: u8,
    pub system_minute: u8,
    pub game_hour: u8,
    pub game_minute: u8,
    /// 0–15, lunar-calendar style.
    pub moon_phase: u8,
    pub day_of_week: u8,
    pub month: u8,
    pub day: u8,
}

impl Default for WorldClock {
    fn default() -> Self {
        Self { system_hour: 0, system_minute: 0, game_hour: 0, game_minute: 0, moon_phase: 0, day_of_week: 0, month: 1, day: 1 }
    }
}

impl WorldClock {
    pub fn advance_game_minute(&mut self) {
        self.game_minute += 1;
        if self.game_minute >= 60 {
            self.game_minute = 0;
            self.game_hour = (self.game_hour + 1) % 24;
        }
    }

    pub fn advance_moon_phase(&mut self) {
        self.moon_phase = (self.moon_phase + 1) % 16;
    }

    /// Night window used to select the night-time aggro distance/FoV
    /// (`ai::tick`'s `with_night_adjustment`): dusk at 19:00, dawn at 06:00.
    pub fn is_night(&self) -> bool {
        self.game_hour >= 19 || self.game_hour < 6
    }
}

/// An inclusive-lower, exclusive-upper time-of-day window, stored with the
/// end minute already offset by +1 so that the window includes the stated
/// `to` minute (matches the source engine's representation verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from_hour: u8,
    pub from_minute: u8,
    pub to_hour: u8,
    pub to_minute: u8,
}

impl TimeWindow {
    /// Construct from an inclusive `[from, to]` pair as written in content,
    /// storing the exclusive end internally.
    pub fn inclusive(from_hour: u8, from_minute: u8, to_hour: u8, to_minute: u8) -> Self {
        let (to_hour, to_minute) = if to_minute == 59 {
            ((to_hour + 1) % 24, 0)
        } else {
            (to_hour, to_minute + 1)
        };
        Self { from_hour, from_minute, to_hour, to_minute }
    }

    fn minutes_of(hour: u8, minute: u8) -> u32 {
        hour as u32 * 60 + minute as u32
    }

    /// Whether `(hour, minute)` falls in this window. Handles windows that
    /// wrap past midnight (from > to).
    pub fn contains(&self, hour: u8, minute: u8) -> bool {
        let now = Self::minutes_of(hour, minute);
        let from = Self::minutes_of(self.from_hour, self.from_minute);
        let to = Self::minutes_of(self.to_hour, self.to_minute);
        if from <= to {
            now >= from && now < to
        } else {
            now >= from || now < to
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DayOfWeekMask: u8 {
        const SUNDAY = 0b0000_0001;
        const MONDAY = 0b0000_0010;
        const TUESDAY = 0b0000_0100;
        const WEDNESDAY = 0b0000_1000;
        const THURSDAY = 0b0001_0000;
        const FRIDAY = 0b0010_0000;
        const SATURDAY = 0b0100_0000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MoonPhaseMask: u16 {
        const PHASE_0 = 1 << 0;
        const PHASE_1 = 1 << 1;
        const PHASE_2 = 1 << 2;
        const PHASE_3 = 1 << 3;
        const PHASE_4 = 1 << 4;
        const PHASE_5 = 1 << 5;
        const PHASE_6 = 1 << 6;
        const PHASE_7 = 1 << 7;
        const PHASE_8 = 1 << 8;
        const PHASE_9 = 1 << 9;
        const PHASE_10 = 1 << 10;
        const PHASE_11 = 1 << 11;
        const PHASE_12 = 1 << 12;
        const PHASE_13 = 1 << 13;
        const PHASE_14 = 1 << 14;
        const PHASE_15 = 1 << 15;
    }
}

impl DayOfWeekMask {
    pub fn matches(&self, day_of_week: u8) -> bool {
        DayOfWeekMask::from_bits_truncate(1 << day_of_week.min(6)).intersects(*self)
    }
}

impl MoonPhaseMask {
    pub fn matches(&self, phase: u8) -> bool {
        MoonPhaseMask::from_bits_truncate(1 << phase.min(15)).intersects(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_window_includes_the_to_minute() {
        let w = TimeWindow::inclusive(9, 0, 10, 30);
        assert!(w.contains(10, 30));
        assert!(!w.contains(10, 31));
        assert!(w.contains(9, 0));
        assert!(!w.contains(8, 59));
    }

    #[test]
    fn window_wraps_past_midnight() {
        let w = TimeWindow::inclusive(22, 0, 1, 0);
        assert!(w.contains(23, 30));
        assert!(w.contains(0, 30));
        assert!(w.contains(1, 0));
        assert!(!w.contains(1, 1));
        assert!(!w.contains(12, 0));
    }

    #[test]
    fn day_of_week_mask_matches_bit() {
        let mask = DayOfWeekMask::MONDAY | DayOfWeekMask::FRIDAY;
        assert!(mask.matches(1));
        assert!(mask.matches(5));
        assert!(!mask.matches(2));
    }

    #[test]
    fn is_night_spans_dusk_to_dawn() {
        let mut clock = WorldClock { game_hour: 20, ..WorldClock::default() };
        assert!(clock.is_night());
        clock.game_hour = 3;
        assert!(clock.is_night());
        clock.game_hour = 12;
        assert!(!clock.is_night());
    }

    #[test]
    fn moon_phase_rollover_wraps_0_15() {
        let mut clock = WorldClock {
            system_hour: 0,
            system_minute: 0,
            game_hour: 23,
            game_minute: 59,
            moon_phase: 15,
            day_of_week: 0,
            month: 1,
            day: 1,
        };
        clock.advance_game_minute();
        assert_eq!(clock.game_hour, 0);
        assert_eq!(clock.game_minute, 0);

        clock.advance_moon_phase();
        assert_eq!(clock.moon_phase, 0);
    }
}
