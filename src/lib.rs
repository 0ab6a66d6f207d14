//! SD card bring-up over SPI written in Embedded Rust.
//!
//! This crate drives an SD card from power-up into SPI mode with CRC checking on,
//! and reads its identification (CID) and specific data (CSD) registers. Every
//! transfer is a chip-select framed exchange on an [`embedded_hal`] SPI bus; card
//! presence is read from a [`switch_hal`] input.
//!
//! Polls are bounded by [`ClockBudget`]s, counts of byte clocks, so they scale
//! with the SPI clock rate rather than with time.

#![no_std]

// Must stay first so the logging macros are visible to the other modules.
mod fmt;

mod cid;
mod config;
mod consts;
mod crc;
mod csd;
mod response;

pub use crate::{
    cid::{Cid, CidData},
    config::{ClockBudget, DefaultSdSpiConfig, SdSpiConfig},
    consts::{arguments, commands, r2, tokens, CMD_FRAME_LENGTH, DATA_BLOCK_LENGTH},
    crc::{crc7, crc7_finalize, crc7_step},
    csd::{CapacityProvider, Csd, CsdData, CsdV1, CsdV2},
    response::R1Response,
};

use crate::consts::{REGISTER_LENGTH, REGISTER_RESPONSE_LENGTH};

use core::{cell::RefCell, fmt::Display, marker::PhantomData};
use embedded_hal::blocking::spi::Transfer;
use switch_hal::{InputSwitch, OutputSwitch};

/// [`SdSpi`] result error.
///
/// `T` - transport error type.
/// `S` - select switch error type.
/// `D` - card detect switch error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<T, S, D> {
    /// Error from the SPI peripheral.
    Transport(T),
    /// Couldn't set a select.
    SelectError(S),
    /// Couldn't read the card detect input.
    DetectError(D),
    /// Generic failure, e.g. a register read with a bad status or checksum.
    Ng,
    /// Response buffer can't hold an R1.
    BadParameter,
    /// Unexpected byte while waiting for the data start token.
    Token,
    /// Poll budget spent without the expected byte.
    Timeout,
    /// Bus didn't settle to `0xFF`.
    BusNotIdle,
    /// GO_IDLE_STATE failed on every retry.
    Cmd0,
    /// APP_CMD got no response.
    Cmd55,
    /// SD_SEND_OP_COND failed or the card never left idle.
    Acmd41,
    /// CRC_ON_OFF was rejected.
    Cmd59,
}

impl<T, S, D> Error<T, S, D> {
    /// Whether the error comes from the SPI bus or a pin rather than the card.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::SelectError(_) | Error::DetectError(_)
        )
    }

    /// Replaces a protocol error with `error`, keeping hardware errors.
    fn or_protocol(self, error: Self) -> Self {
        if self.is_hardware() {
            self
        } else {
            error
        }
    }

    /// Diagnostic message for the console.
    pub fn message(&self) -> &'static str {
        match self {
            Error::Cmd0 => "Fail CMD0",
            Error::Cmd55 => "Fail CMD55",
            Error::Acmd41 => "Fail ACMD41",
            Error::Cmd59 => "Fail CMD59",
            Error::BusNotIdle => "Fail...Device is not in idle state.",
            _ => "Fail",
        }
    }
}

impl<T, S, D> Display for Error<T, S, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

/// Diagnostic message for the outcome of an operation.
pub fn status_message<R, T, S, D>(result: &Result<R, Error<T, S, D>>) -> &'static str {
    match result {
        Ok(_) => "Done!",
        Err(err) => err.message(),
    }
}

/// Card presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectStatus {
    Connected,
    Disconnected,
}

/// Error type alias.
pub type ErrorFor<Spi, Cs, Detect> = Error<
    <Spi as Transfer<u8>>::Error,
    <Cs as OutputSwitch>::Error,
    <Detect as InputSwitch>::Error,
>;

/// SD Card SPI bring-up driver.
///
/// `Spi` - SPI.
/// `Cs` - Chip select output switch.
/// `Detect` - Card detect input switch, active while a card is inserted.
/// `Config` - Config implementation of driver config trait.
pub struct SdSpi<Spi, Cs, Detect, Config = DefaultSdSpiConfig>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdSpiConfig,
{
    spi: RefCell<Spi>,
    cs: RefCell<Cs>,
    detect: RefCell<Detect>,
    data_buf: RefCell<[u8; DATA_BLOCK_LENGTH]>,
    initialized: bool,
    config: PhantomData<Config>,
}

/// Builds a command frame: start bits and index, big-endian argument, CRC-7 and end bit.
pub fn command_frame(cmd: u8, arg: u32) -> [u8; CMD_FRAME_LENGTH] {
    let arg = arg.to_be_bytes();
    let mut frame = [
        commands::FRAME_BITS | (cmd & commands::INDEX_MASK),
        arg[0],
        arg[1],
        arg[2],
        arg[3],
        0,
    ];
    let crc_index = frame.len() - 1;

    frame[crc_index] = (crc7(&frame[..crc_index]) << 1) | 0x01;

    frame
}

impl<Spi, Cs, Detect, Config> SdSpi<Spi, Cs, Detect, Config>
where
    Spi: Transfer<u8>,
    Cs: OutputSwitch,
    Detect: InputSwitch,
    Config: SdSpiConfig,
    Spi::Error: core::fmt::Debug,
    Cs::Error: core::fmt::Debug,
    Detect::Error: core::fmt::Debug,
{
    /// Creates a new [`SdSpi<Spi, Cs, Detect, Config>`].
    ///
    /// `spi` - SPI instance.
    /// `cs` - chip select output switch.
    /// `detect` - card detect input switch.
    pub fn new(spi: Spi, cs: Cs, detect: Detect) -> Self {
        SdSpi {
            spi: RefCell::new(spi),
            cs: RefCell::new(cs),
            detect: RefCell::new(detect),
            data_buf: RefCell::new([0; DATA_BLOCK_LENGTH]),
            initialized: false,
            config: PhantomData::<Config>,
        }
    }

    /// Releases the SPI bus and the switches.
    pub fn free(self) -> (Spi, Cs, Detect) {
        (
            self.spi.into_inner(),
            self.cs.into_inner(),
            self.detect.into_inner(),
        )
    }

    /// Whether the last [`init`](Self::init) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Copy of the data buffer, holding the last register response (R1 first).
    pub fn data_buffer(&self) -> [u8; DATA_BLOCK_LENGTH] {
        *self.data_buf.borrow()
    }

    /// Delay.
    fn delay(cycles: usize) {
        for i in 0..cycles {
            unsafe { core::ptr::read_volatile(&i) };
        }
    }

    /// Activate chip select.
    fn select(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        self.cs.borrow_mut().on().map_err(Error::SelectError)
    }

    /// Deactivate chip select.
    fn unselect(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        self.cs.borrow_mut().off().map_err(Error::SelectError)
    }

    /// CS scope.
    fn cs_scope<R, F>(&self, f: F) -> Result<R, ErrorFor<Spi, Cs, Detect>>
    where
        F: FnOnce(&Self) -> Result<R, ErrorFor<Spi, Cs, Detect>>,
    {
        self.select()?;
        let result = f(self);
        self.unselect()?;

        result
    }

    /// Send one byte and receive one byte.
    fn transfer(&self, data: u8) -> Result<u8, ErrorFor<Spi, Cs, Detect>> {
        self.spi
            .borrow_mut()
            .transfer(&mut [data])
            .map(|b| b[0])
            .map_err(Error::Transport)
    }

    /// Exchanges up to `length` bytes inside one chip select transaction.
    ///
    /// Without `tx` the card is clocked with `0xFF`; without `rx` the received
    /// bytes are dropped. Stops early at the end of a shorter buffer and returns
    /// the number of bytes exchanged.
    pub fn transceive(
        &self,
        tx: Option<&[u8]>,
        mut rx: Option<&mut [u8]>,
        length: usize,
    ) -> Result<usize, ErrorFor<Spi, Cs, Detect>> {
        self.cs_scope(|s| {
            let mut count = 0;

            while count < length {
                let data = match tx {
                    Some(tx) => match tx.get(count) {
                        Some(&byte) => byte,
                        None => break,
                    },
                    None => tokens::IDLE,
                };

                let received = match rx.as_deref_mut() {
                    Some(rx) => match rx.get_mut(count) {
                        Some(slot) => {
                            *slot = s.transfer(data)?;
                            *slot
                        }
                        None => break,
                    },
                    None => s.transfer(data)?,
                };
                trace!("SD xfer {=u8:02X} -> {=u8:02X}", data, received);

                count += 1;
            }

            Ok(count)
        })
    }

    /// Receive a byte from the SD card by clocking in an 0xFF byte.
    fn receive(&self) -> Result<u8, ErrorFor<Spi, Cs, Detect>> {
        let mut byte = [tokens::IDLE];
        self.transceive(None, Some(&mut byte[..]), 1)?;

        Ok(byte[0])
    }

    /// Wait for token.
    fn wait_for_token<F: Fn(u8) -> bool>(
        &self,
        token_validator: F,
        budget: ClockBudget,
    ) -> Result<u8, ErrorFor<Spi, Cs, Detect>> {
        for _ in 0..budget.get() {
            let token = self.receive()?;

            if token_validator(token) {
                return Ok(token);
            }
        }

        Err(Error::Timeout)
    }

    /// Sends a command frame; the response must be collected with [`wait_r1`](Self::wait_r1).
    pub fn send_command(&self, cmd: u8, arg: u32) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        let frame = command_frame(cmd, arg);
        debug!("SD CMD{=u8} arg {=u32:08X}", cmd, arg);

        self.transceive(Some(&frame[..]), None, frame.len()).map(|_| ())
    }

    /// Waits for the R1 response and, if `buffer` is longer than one byte, the
    /// data block following it.
    ///
    /// R1 lands in `buffer[0]`. For longer buffers a `0xFE` start token must
    /// precede the data, which fills `buffer[1..]`. Afterwards the bus gets up
    /// to [`SdSpiConfig::SETTLE_BUDGET`] clocks to return to idle.
    pub fn wait_r1(
        &self,
        buffer: &mut [u8],
        timeout: ClockBudget,
    ) -> Result<R1Response, ErrorFor<Spi, Cs, Detect>> {
        let (r1_slot, data) = buffer.split_first_mut().ok_or(Error::BadParameter)?;

        let r1 = R1Response(self.wait_for_token(|byte| R1Response(byte).is_valid(), timeout)?);
        *r1_slot = r1.bits();

        if !data.is_empty() {
            let token = self.wait_for_token(|byte| byte != tokens::IDLE, timeout)?;
            if token != tokens::DATA_START_BLOCK {
                warn!("SD unexpected token {=u8:02X}", token);
                return Err(Error::Token);
            }

            let length = data.len();
            self.transceive(None, Some(data), length)?;
        }

        self.settle()?;

        Ok(r1)
    }

    /// Extra clocks for the card to finish internal operations.
    fn settle(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        for _ in 0..Config::SETTLE_BUDGET.get() {
            let byte = self.receive()?;
            Self::delay(Config::SETTLE_DELAY_CYCLES);

            if byte == tokens::IDLE {
                return Ok(());
            }
        }

        Err(Error::BusNotIdle)
    }

    /// Probes up to `max_chars` groups of up to three bytes for an idle bus.
    pub fn wait_idle(&self, max_chars: ClockBudget) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        for _ in 0..max_chars.get() {
            let mut byte = self.receive()?;
            for _ in 1..3 {
                if byte != tokens::IDLE {
                    break;
                }
                byte = self.receive()?;
            }

            if byte == tokens::IDLE {
                return Ok(());
            }
        }

        Err(Error::Timeout)
    }

    /// Reads the card detect input.
    pub fn card_connect_status(&self) -> Result<ConnectStatus, ErrorFor<Spi, Cs, Detect>> {
        let present = self
            .detect
            .borrow()
            .is_active()
            .map_err(Error::DetectError)?;

        Ok(if present {
            ConnectStatus::Connected
        } else {
            ConnectStatus::Disconnected
        })
    }

    /// Blocks until a card is inserted.
    fn wait_card(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        info!("Please plug-in SD card");

        while self.card_connect_status()? == ConnectStatus::Disconnected {}

        info!("SD card connected");
        Ok(())
    }

    /// Clocks the card with CS high so it can enter native mode.
    fn wake_up(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        self.unselect()?;

        for _ in 0..Config::WAKE_UP_BYTES {
            self.transfer(tokens::IDLE)?;
        }

        Ok(())
    }

    /// Enter SD to SPI mode.
    fn enter_spi_mode(&self, retries: u8) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        let mut response = [0u8; 1];

        for i in 0..retries {
            info!("Enter to SPI mode for SD, attempt: {=u8}", i + 1);

            self.send_command(commands::CMD0, arguments::NONE)?;
            match self.wait_r1(&mut response, Config::R1_TIMEOUT) {
                Ok(R1Response::IN_IDLE_STATE) => return Ok(()),
                Ok(r) => warn!("Wrong response from CMD0: {=u8:02X}", r.bits()),
                Err(err) if err.is_hardware() => return Err(err),
                Err(err) => warn!("No response from CMD0: {=str}", err.message()),
            }
        }

        Err(Error::Cmd0)
    }

    /// Sends host capacity support information and activates.
    fn send_op_cond(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        info!("Waiting for SD to leave idle state");

        let mut response = [0u8; 1];

        for _ in 0..Config::OP_COND_MAX_ATTEMPTS {
            self.send_command(commands::CMD55, arguments::NONE)?;
            self.wait_r1(&mut response, Config::R1_TIMEOUT)
                .map_err(|err| err.or_protocol(Error::Cmd55))?;

            self.send_command(commands::ACMD41, arguments::NONE)?;
            let r1 = self
                .wait_r1(&mut response, Config::R1_TIMEOUT)
                .map_err(|err| err.or_protocol(Error::Acmd41))?;

            if !r1.in_idle_state() {
                return Ok(());
            }

            Self::delay(Config::OP_COND_DELAY_CYCLES);
        }

        Err(Error::Acmd41)
    }

    /// Enable CRC.
    fn enable_crc(&self) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        info!("Enabling CRC for SD");

        let mut response = [0u8; 1];

        self.send_command(commands::CMD59, arguments::CRC_ON)?;
        match self.wait_r1(&mut response, Config::R1_TIMEOUT) {
            Ok(R1Response::NO_ERROR) => Ok(()),
            Ok(_) => Err(Error::Cmd59),
            Err(err) => Err(err.or_protocol(Error::Cmd59)),
        }
    }

    /// Initialize SD.
    ///
    /// Waits for a card, checks the bus is idle, resets the card into SPI mode
    /// with up to `retries` CMD0 attempts, polls ACMD41 until the card is ready
    /// and turns CRC checking on.
    pub fn init(&mut self, retries: u8) -> Result<(), ErrorFor<Spi, Cs, Detect>> {
        self.initialized = false;

        self.wait_card()?;
        self.wake_up()?;

        self.wait_idle(Config::BUS_IDLE_PROBE)
            .map_err(|err| err.or_protocol(Error::BusNotIdle))?;

        info!("Initialize SD card in SPI mode");

        let result = self
            .enter_spi_mode(retries)
            .and_then(|_| self.send_op_cond())
            .and_then(|_| self.enable_crc());

        match &result {
            Ok(_) => {
                info!("SD successfully initialized");
                self.initialized = true;
            }
            Err(err) => error!("Failed to initialize SD: {=str}", err.message()),
        }

        result
    }

    /// Reads a 16-byte register into the data buffer.
    fn read_register(&self, cmd: u8) -> Result<[u8; REGISTER_LENGTH], ErrorFor<Spi, Cs, Detect>> {
        let mut buf = self.data_buf.borrow_mut();
        let response = &mut buf[..REGISTER_RESPONSE_LENGTH];

        self.send_command(cmd, arguments::NONE)?;
        let r1 = self
            .wait_r1(response, Config::R1_TIMEOUT)
            .map_err(|err| err.or_protocol(Error::Ng))?;

        if r1 != R1Response::NO_ERROR {
            warn!("Register read CMD{=u8} rejected: {=u8:02X}", cmd, r1.bits());
            return Err(Error::Ng);
        }

        let mut register = [0u8; REGISTER_LENGTH];
        register.copy_from_slice(&response[1..=REGISTER_LENGTH]);

        Ok(register)
    }

    /// Reads the Card Identification register.
    pub fn read_cid(&self) -> Result<Cid, ErrorFor<Spi, Cs, Detect>> {
        let cid = Cid::from(self.read_register(commands::CMD10)?);

        if !cid.crc_valid() {
            error!("CID checksum mismatch");
            return Err(Error::Ng);
        }

        Ok(cid)
    }

    /// Reads the Card Specific Data register.
    pub fn read_csd(&self) -> Result<Csd, ErrorFor<Spi, Cs, Detect>> {
        let csd = Csd::from(self.read_register(commands::CMD9)?);

        if !csd.crc_valid() {
            error!("CSD checksum mismatch");
            return Err(Error::Ng);
        }

        Ok(csd)
    }
}
