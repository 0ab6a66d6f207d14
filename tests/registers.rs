mod common;

use common::*;
use hex_literal::hex;
use sd_spi_bringup::{commands, CapacityProvider, Csd, Error};

const CID: [u8; 16] = hex!("03 53 44 53 44 30 32 47 80 12 34 AB CD 00 E4 39");
const CSD_V2: [u8; 16] = hex!("40 0E 00 32 5B 59 00 00 1D 69 7F 80 0A 40 00 8B");

fn register_card(r1_value: u8, register: [u8; 16]) -> Card {
    card_with(move |cmd, _| match cmd {
        commands::CMD10 | commands::CMD9 => r1_with_data(r1_value, &register),
        _ => r1(0x04),
    })
}

#[test]
fn read_cid_decodes_register() {
    let card = register_card(0x00, CID);
    let sd = driver::<FastConfig>(&card);

    let cid = sd.read_cid().unwrap();
    assert_eq!(cid.manufacturer_id(), 0x03);
    assert_eq!(&cid.product_name(), b"SD02G");
    assert_eq!(cid.serial_number(), 0x1234_ABCD);
    assert_eq!(cid.manufacturing_date(), (2014, 4));

    // R1, the register and the first CRC-16 byte stay in the data buffer.
    let data = sd.data_buffer();
    assert_eq!(data[0], 0x00);
    assert_eq!(&data[1..17], &CID[..]);
    assert_eq!(data[17], 0x5A);

    assert_eq!(card.borrow().command_indices(), vec![commands::CMD10]);
}

#[test]
fn read_cid_rejects_error_status() {
    let card = register_card(0x04, CID);
    let sd = driver::<FastConfig>(&card);

    assert_eq!(sd.read_cid(), Err(Error::Ng));
}

#[test]
fn read_cid_rejects_bad_checksum() {
    let mut corrupted = CID;
    corrupted[4] ^= 0x20;
    let card = register_card(0x00, corrupted);
    let sd = driver::<FastConfig>(&card);

    assert_eq!(sd.read_cid(), Err(Error::Ng));
}

#[test]
fn read_cid_without_card_response() {
    let card = card();
    let sd = driver::<FastConfig>(&card);

    assert_eq!(sd.read_cid(), Err(Error::Ng));
}

#[test]
fn read_csd_reports_capacity() {
    let card = register_card(0x00, CSD_V2);
    let sd = driver::<FastConfig>(&card);

    let csd = sd.read_csd().unwrap();
    assert!(matches!(csd, Csd::V2(_)));
    assert_eq!(csd.card_capacity_blocks(), 7_710_720);
    assert_eq!(card.borrow().command_indices(), vec![commands::CMD9]);
}
