use crate::consts::tokens;

use bitfield::bitfield;

bitfield! {
    /// R1 response bitset.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct R1Response(u8);
    impl Debug;
    pub in_idle_state, _: 0;
    pub erase_reset, _: 1;
    pub illegal_command, _: 2;
    pub command_crc_error, _: 3;
    pub erase_sequence_error, _: 4;
    pub address_error, _: 5;
    pub parameter_error, _: 6;
}

impl R1Response {
    /// No flag set, card ready.
    pub const NO_ERROR: R1Response = R1Response(0x00);
    /// Card in idle state, no error.
    pub const IN_IDLE_STATE: R1Response = R1Response(0x01);

    /// Whether the start bit is clear, i.e. the byte is an R1 and not bus idle.
    pub fn is_valid(&self) -> bool {
        self.0 & tokens::R1_START_BIT == 0
    }

    /// Raw byte.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for R1Response {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "R1(0b{=u8:08b})", self.0)
    }
}
