/// Length of a command frame.
pub const CMD_FRAME_LENGTH: usize = 6;
/// Length of the driver owned data buffer: token-stripped 512-byte block plus R1 and CRC-16.
pub const DATA_BLOCK_LENGTH: usize = 515;
/// R1 + 16 register bytes + first CRC-16 byte, as read for CID and CSD.
pub const REGISTER_RESPONSE_LENGTH: usize = 18;
/// Length of the CID and CSD registers.
pub const REGISTER_LENGTH: usize = 16;

/// Command indices. The frame builder adds the start and transmission bits.
pub mod commands {
    /// Start and transmission bits of the first frame byte.
    pub const FRAME_BITS: u8 = 0x40;
    /// Bits of the first frame byte holding the command index.
    pub const INDEX_MASK: u8 = 0x3F;

    /// GO_IDLE_STATE - init card in spi mode if CS low.
    pub const CMD0: u8 = 0x00;
    /// SEND_OP_COND - MMC initialization.
    pub const CMD1: u8 = 0x01;
    /// SEND_CSD - read the Card Specific Data (CSD register).
    pub const CMD9: u8 = 0x09;
    /// SEND_CID - read the Card Identification (CID register).
    pub const CMD10: u8 = 0x0A;
    /// STOP_TRANSMISSION - end multiple block read sequence.
    pub const CMD12: u8 = 0x0C;
    /// SEND_STATUS - read the card status register.
    pub const CMD13: u8 = 0x0D;
    /// SET_BLOCKLEN - set the block length for standard capacity cards.
    pub const CMD16: u8 = 0x10;
    /// READ_SINGLE_BLOCK - read a single data block from the card.
    pub const CMD17: u8 = 0x11;
    /// READ_MULTIPLE_BLOCK - read a multiple data blocks from the card.
    pub const CMD18: u8 = 0x12;
    /// WRITE_BLOCK - write a single data block to the card.
    pub const CMD24: u8 = 0x18;
    /// WRITE_MULTIPLE_BLOCK - write blocks of data until a STOP_TRANSMISSION.
    pub const CMD25: u8 = 0x19;
    /// PROGRAM_CSD - program the programmable bits of the CSD.
    pub const CMD27: u8 = 0x1B;
    /// SET_WRITE_PROT.
    pub const CMD28: u8 = 0x1C;
    /// CLR_WRITE_PROT.
    pub const CMD29: u8 = 0x1D;
    /// SEND_WRITE_PROT.
    pub const CMD30: u8 = 0x1E;
    /// ERASE_WR_BLK_START_ADDR.
    pub const CMD32: u8 = 0x20;
    /// ERASE_WR_BLK_END_ADDR.
    pub const CMD33: u8 = 0x21;
    /// ERASE - erase the selected write blocks.
    pub const CMD38: u8 = 0x26;
    /// APP_CMD - escape for application specific command.
    pub const CMD55: u8 = 0x37;
    /// GEN_CMD - general purpose data block transfer.
    pub const CMD56: u8 = 0x38;
    /// READ_OCR - read the OCR register of a card.
    pub const CMD58: u8 = 0x3A;
    /// CRC_ON_OFF - enable or disable CRC checking.
    pub const CMD59: u8 = 0x3B;

    /// SD_STATUS.
    pub const ACMD13: u8 = 0x0D;
    /// SEND_NUM_WR_BLOCKS.
    pub const ACMD22: u8 = 0x16;
    /// SET_WR_BLK_ERASE_COUNT.
    pub const ACMD23: u8 = 0x17;
    /// SD_SEND_OP_COND - Sends host capacity support information and activates
    /// the card's initialization process.
    pub const ACMD41: u8 = 0x29;
    /// SET_CLR_CARD_DETECT.
    pub const ACMD42: u8 = 0x2A;
    /// SEND_SCR.
    pub const ACMD51: u8 = 0x33;
}

pub mod arguments {
    /// Argument of commands without one.
    pub const NONE: u32 = 0x0000_0000;
    /// CMD59 argument turning CRC checking on.
    pub const CRC_ON: u32 = 0x0000_0001;
}

pub mod tokens {
    /// Byte seen on MISO while the card is idle, also sent as filler.
    pub const IDLE: u8 = 0xFF;
    /// Start data token for read or write single block.
    pub const DATA_START_BLOCK: u8 = 0xFE;
    /// Bit that is clear in every valid R1 byte.
    pub const R1_START_BIT: u8 = 0x80;
}

/// R2 second byte flags; the first byte is identical to R1.
pub mod r2 {
    pub const LOCKED: u8 = 0x01;
    pub const WP_FAILED: u8 = 0x02;
    pub const ERROR: u8 = 0x04;
    pub const CTRL_ERR: u8 = 0x08;
    pub const ECC_FAIL: u8 = 0x10;
    pub const WP_VIOL: u8 = 0x20;
    pub const ERASE_PARAM: u8 = 0x40;
    pub const RANGE_ERR: u8 = 0x80;
}
