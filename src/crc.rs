/// CRC-7 polynomial x^7 + x^3 + 1, with the x^7 term kept in bit 7.
const CRC7_POLYNOMIAL: u8 = 0x89;

/// Shifts one bit into the CRC-7 register.
#[inline]
fn crc7_shift(crc: u8, bit: u8) -> u8 {
    let crc = (crc << 1) | bit;
    if crc & 0x80 != 0 {
        crc ^ CRC7_POLYNOMIAL
    } else {
        crc
    }
}

/// Adds `data` to a running CRC-7, most significant bit first.
///
/// Start with `0`. The result must pass through [`crc7_finalize`] before use.
pub fn crc7_step(old_crc: u8, data: u8) -> u8 {
    (0..8)
        .rev()
        .fold(old_crc, |crc, bit| crc7_shift(crc, (data >> bit) & 0x01))
}

/// Flushes the register with seven zero bits, leaving the CRC-7 in bits 0..=6.
pub fn crc7_finalize(crc: u8) -> u8 {
    (0..7).fold(crc, |crc, _| crc7_shift(crc, 0))
}

/// CRC-7 calculation.
pub fn crc7(data: &[u8]) -> u8 {
    crc7_finalize(data.iter().fold(0, |crc, &byte| crc7_step(crc, byte)))
}

/// Whether a 16-byte register's trailing CRC-7 (bits 7..1 of the last byte)
/// matches its first 15 bytes.
pub(crate) fn register_crc_valid(register: &[u8; 16]) -> bool {
    crc7(&register[..15]) == register[15] >> 1
}
