//! Simulated SD card on the far side of the SPI bus.

#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, convert::Infallible, rc::Rc};

use embedded_hal::blocking::spi::Transfer;
use sd_spi_bringup::{command_frame, ClockBudget, SdSpi, SdSpiConfig, CMD_FRAME_LENGTH};
use switch_hal::{InputSwitch, OutputSwitch};

/// Reply bytes queued after a command frame.
pub type Responder = Box<dyn FnMut(u8, u32) -> Vec<u8>>;

pub struct CardState {
    /// Bytes of the command frame being received.
    frame: Vec<u8>,
    /// Bytes the card shifts out next.
    pub pending: VecDeque<u8>,
    /// Byte shifted out once `pending` is empty.
    pub default_byte: u8,
    /// Commands received, as (index, argument).
    pub commands: Vec<(u8, u32)>,
    /// Frames whose CRC didn't match.
    pub bad_frames: usize,
    /// Byte exchanges with CS asserted.
    pub selected_clocks: usize,
    /// Byte exchanges with CS released.
    pub deselected_clocks: usize,
    /// CS assertions.
    pub selections: usize,
    pub selected: bool,
    /// Card detect readings; the last one repeats.
    pub detect: VecDeque<bool>,
    pub detect_reads: usize,
    /// Makes the next CS assertion fail.
    pub fail_select: bool,
    responder: Option<Responder>,
}

impl CardState {
    fn exchange(&mut self, mosi: u8) -> u8 {
        if !self.selected {
            self.deselected_clocks += 1;
            return 0xFF;
        }
        self.selected_clocks += 1;

        if !self.frame.is_empty() || mosi & 0xC0 == 0x40 {
            self.frame.push(mosi);
            if self.frame.len() == CMD_FRAME_LENGTH {
                self.dispatch();
            }
            return 0xFF;
        }

        self.pending.pop_front().unwrap_or(self.default_byte)
    }

    fn dispatch(&mut self) {
        let frame: Vec<u8> = self.frame.drain(..).collect();
        let cmd = frame[0] & 0x3F;
        let arg = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);

        if frame[..] != command_frame(cmd, arg)[..] {
            self.bad_frames += 1;
            return;
        }

        self.commands.push((cmd, arg));
        self.pending.clear();
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(cmd, arg);
            self.pending.extend(reply);
        }
    }

    pub fn count(&self, cmd: u8) -> usize {
        self.commands.iter().filter(|(c, _)| *c == cmd).count()
    }

    pub fn command_indices(&self) -> Vec<u8> {
        self.commands.iter().map(|(c, _)| *c).collect()
    }
}

pub type Card = Rc<RefCell<CardState>>;

pub fn card() -> Card {
    Rc::new(RefCell::new(CardState {
        frame: Vec::new(),
        pending: VecDeque::new(),
        default_byte: 0xFF,
        commands: Vec::new(),
        bad_frames: 0,
        selected_clocks: 0,
        deselected_clocks: 0,
        selections: 0,
        selected: false,
        detect: VecDeque::from(vec![true]),
        detect_reads: 0,
        fail_select: false,
        responder: None,
    }))
}

pub fn card_with<F>(responder: F) -> Card
where
    F: FnMut(u8, u32) -> Vec<u8> + 'static,
{
    let card = card();
    card.borrow_mut().responder = Some(Box::new(responder));
    card
}

pub struct MockSpi(pub Card);

impl Transfer<u8> for MockSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut card = self.0.borrow_mut();
        for word in words.iter_mut() {
            *word = card.exchange(*word);
        }
        Ok(words)
    }
}

pub struct MockCs(pub Card);

impl OutputSwitch for MockCs {
    type Error = ();

    fn on(&mut self) -> Result<(), Self::Error> {
        let mut card = self.0.borrow_mut();
        if card.fail_select {
            return Err(());
        }
        card.selected = true;
        card.selections += 1;
        Ok(())
    }

    fn off(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().selected = false;
        Ok(())
    }
}

pub struct MockDetect(pub Card);

impl InputSwitch for MockDetect {
    type Error = Infallible;

    fn is_active(&self) -> Result<bool, Self::Error> {
        let mut card = self.0.borrow_mut();
        card.detect_reads += 1;
        let present = if card.detect.len() > 1 {
            card.detect.pop_front().unwrap_or(true)
        } else {
            card.detect.front().copied().unwrap_or(true)
        };
        Ok(present)
    }
}

/// Small budgets and no spinning.
pub struct FastConfig;

impl SdSpiConfig for FastConfig {
    const R1_TIMEOUT: ClockBudget = ClockBudget::bytes(16);
    const BUS_IDLE_PROBE: ClockBudget = ClockBudget::bytes(160);
    const SETTLE_BUDGET: ClockBudget = ClockBudget::bytes(20);
    const SETTLE_DELAY_CYCLES: usize = 0;
    const OP_COND_DELAY_CYCLES: usize = 0;
    const OP_COND_MAX_ATTEMPTS: usize = 4;
    const WAKE_UP_BYTES: usize = 10;
}

pub type Driver<Config> = SdSpi<MockSpi, MockCs, MockDetect, Config>;

pub fn driver<Config: SdSpiConfig>(card: &Card) -> Driver<Config> {
    SdSpi::new(
        MockSpi(card.clone()),
        MockCs(card.clone()),
        MockDetect(card.clone()),
    )
}

/// Gap byte followed by an R1.
pub fn r1(value: u8) -> Vec<u8> {
    vec![0xFF, value]
}

/// R1, start token, payload and a CRC-16 trailer.
pub fn r1_with_data(value: u8, data: &[u8]) -> Vec<u8> {
    let mut reply = vec![0xFF, value, 0xFF, 0xFE];
    reply.extend_from_slice(data);
    reply.extend_from_slice(&[0x5A, 0xA5]);
    reply
}
