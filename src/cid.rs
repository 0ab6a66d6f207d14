use crate::crc::register_crc_valid;

use bitfield::bitfield;

/// Card Identification block.
pub type CidData = [u8; 16];

bitfield! {
    /// Card Identification register.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Cid(u128);
    impl Debug;
    pub u8, manufacturer_id, _: 127, 120;
    pub u16, oem_id, _: 119, 104;
    pub u64, product_name_raw, _: 103, 64;
    pub u8, product_revision, _: 63, 56;
    pub u32, serial_number, _: 55, 24;
    pub u8, manufacturing_year_offset, _: 19, 12;
    pub u8, manufacturing_month, _: 11, 8;
    pub u8, crc, _: 7, 1;
}

impl From<CidData> for Cid {
    fn from(cid_data: CidData) -> Self {
        Cid(u128::from_be_bytes(cid_data))
    }
}

impl Cid {
    /// Product name, 5 ASCII characters.
    pub fn product_name(&self) -> [u8; 5] {
        let raw = self.product_name_raw().to_be_bytes();
        [raw[3], raw[4], raw[5], raw[6], raw[7]]
    }

    /// Product revision as (major, minor) BCD nibbles.
    pub fn product_revision_bcd(&self) -> (u8, u8) {
        let revision = self.product_revision();
        (revision >> 4, revision & 0x0F)
    }

    /// Manufacturing date as (year, month).
    pub fn manufacturing_date(&self) -> (u16, u8) {
        (
            2000 + u16::from(self.manufacturing_year_offset()),
            self.manufacturing_month(),
        )
    }

    /// Whether the stored CRC-7 matches the first 15 register bytes.
    pub fn crc_valid(&self) -> bool {
        register_crc_valid(&self.0.to_be_bytes())
    }
}
