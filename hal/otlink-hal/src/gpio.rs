//! GPIO lines driven by the bridge
//!
//! Only outputs are needed: the co-processor's active-low reset line and
//! its boot-mode strap. Both are modelled as a latched [`Level`].

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    #[default]
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::High
    }
}

/// Output line that remembers the level it was last driven to
pub trait OutputPin {
    fn set_level(&mut self, level: Level);

    /// Level last written with [`set_level`](Self::set_level)
    fn level(&self) -> Level;

    fn set_high(&mut self) {
        self.set_level(Level::High);
    }

    fn set_low(&mut self) {
        self.set_level(Level::Low);
    }

    fn is_set_high(&self) -> bool {
        self.level() == Level::High
    }
}
