/// Count of byte clocks (8 SCK cycles each) a poll may spend.
///
/// Budgets are relative to the SPI clock rate, not to wall-clock time: the
/// same budget waits twice as long at 400 kHz as at 800 kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockBudget(usize);

impl ClockBudget {
    /// Budget of `count` byte clocks.
    pub const fn bytes(count: usize) -> Self {
        ClockBudget(count)
    }

    /// Number of byte clocks.
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Represents config for [`SdSpi`](crate::SdSpi).
pub trait SdSpiConfig {
    /// Byte clocks to wait for the R1 start bit, and again for a data token.
    const R1_TIMEOUT: ClockBudget;
    /// Groups of byte clocks probed for an idle bus before bring-up.
    const BUS_IDLE_PROBE: ClockBudget;
    /// Byte clocks allowed for the bus to return to idle after a response.
    const SETTLE_BUDGET: ClockBudget;
    /// Dummy cycles spun after each settle byte.
    const SETTLE_DELAY_CYCLES: usize;
    /// Dummy cycles spun while the card reports idle during ACMD41 polling.
    const OP_COND_DELAY_CYCLES: usize;
    /// Max CMD55/ACMD41 rounds before giving up on the card leaving idle.
    const OP_COND_MAX_ATTEMPTS: usize;
    /// `0xFF` bytes clocked with the card deselected at power-up.
    const WAKE_UP_BYTES: usize;
}

/// Default implementation of [`SdSpiConfig`](crate::SdSpiConfig).
pub struct DefaultSdSpiConfig;

impl SdSpiConfig for DefaultSdSpiConfig {
    const R1_TIMEOUT: ClockBudget = ClockBudget::bytes(1000);
    const BUS_IDLE_PROBE: ClockBudget = ClockBudget::bytes(160);
    const SETTLE_BUDGET: ClockBudget = ClockBudget::bytes(20);
    const SETTLE_DELAY_CYCLES: usize = 1000;
    const OP_COND_DELAY_CYCLES: usize = 1000;
    const OP_COND_MAX_ATTEMPTS: usize = 1024;
    const WAKE_UP_BYTES: usize = 10;
}
