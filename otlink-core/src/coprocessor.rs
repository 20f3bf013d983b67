//! Co-processor boot control
//!
//! The co-processor is an STM32 whose BOOT0 strap selects between the
//! system bootloader (high) and user flash (low) at reset.

use otlink_hal::{Level, OutputPin};

/// Reset and boot-strap lines of the co-processor
pub struct Coprocessor<R: OutputPin, B: OutputPin> {
    reset: R,
    boot: B,
}

impl<R: OutputPin, B: OutputPin> Coprocessor<R, B> {
    pub fn new(reset: R, boot: B) -> Self {
        Self { reset, boot }
    }

    /// Pulse reset with BOOT0 low so the co-processor runs its firmware
    pub fn start_application(&mut self) {
        debug!("co-processor reset into application");
        self.reset.set_low();
        self.boot.set_low();
        self.reset.set_high();
    }

    /// Keep the co-processor in reset
    pub fn hold_in_reset(&mut self) {
        self.reset.set_low();
    }

    /// Reset released and BOOT0 low
    pub fn is_running(&self) -> bool {
        self.reset.is_set_high() && self.boot.level() == Level::Low
    }

    /// Give back the pins
    pub fn release(self) -> (R, B) {
        (self.reset, self.boot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    /// Pin that records every level it is driven to
    #[derive(Default)]
    struct TracePin {
        level: Level,
        history: Vec<Level, 8>,
    }

    impl OutputPin for TracePin {
        fn set_level(&mut self, level: Level) {
            self.level = level;
            let _ = self.history.push(level);
        }

        fn level(&self) -> Level {
            self.level
        }
    }

    #[test]
    fn test_start_application_sequence() {
        let mut cop = Coprocessor::new(TracePin::default(), TracePin::default());
        cop.start_application();
        assert!(cop.is_running());

        let (reset, boot) = cop.release();
        assert_eq!(&reset.history[..], &[Level::Low, Level::High]);
        assert_eq!(&boot.history[..], &[Level::Low]);
    }

    #[test]
    fn test_hold_in_reset() {
        let mut cop = Coprocessor::new(TracePin::default(), TracePin::default());
        cop.start_application();
        cop.hold_in_reset();
        assert!(!cop.is_running());
    }
}
