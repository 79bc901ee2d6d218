//! Register-level PWM driver for the BCM2835 family (Raspberry Pi)
//!
//! Maps the GPIO, PWM and clock manager blocks through `/dev/mem` and drives
//! them the way the usual wiringPi calls do: `pinMode(PWM_OUTPUT)`,
//! `pwmSetMode`, `pwmSetRange`, `pwmSetClock`, `pwmWrite`, and finally
//! `pinMode(OUTPUT)` plus `digitalWrite(LOW)`.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::ptr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;

use super::pwm::{ClockDivider, IntoOutput, Pwm, PwmChannel, PwmMode};
use crate::error::{Error, Result};
use crate::os::Mapping;

const GPIO_OFFSET: u64 = 0x20_0000;
const PWM_OFFSET: u64 = 0x20_C000;
const CLOCK_OFFSET: u64 = 0x10_1000;
const BLOCK_SIZE: usize = 4096;

// GPIO registers
const GPFSEL0: usize = 0x00;
const GPSET0: usize = 0x1C;
const GPCLR0: usize = 0x28;

// PWM registers
const PWM_CTL: usize = 0x00;
const PWM_RNG1: usize = 0x10;
const PWM_DAT1: usize = 0x14;
const PWM_RNG2: usize = 0x20;
const PWM_DAT2: usize = 0x24;

// Clock manager registers
const CM_PWMCTL: usize = 0xA0;
const CM_PWMDIV: usize = 0xA4;
const CM_PASSWORD: u32 = 0x5A00_0000;
const CM_BUSY: u32 = 1 << 7;
const CM_SRC_OSC: u32 = 0x01;
const CM_ENABLE: u32 = 1 << 4;
const CM_BUSY_SPINS: u32 = 1000;

/// DIVI is a 12 bit field
const MAX_DIVISOR: u32 = 0xFFF;

/// BCM2711 feeds the PWM clock from 54 MHz instead of 19.2 MHz
const BCM2711_BASE: u64 = 0xFE00_0000;

const SETTLE: Duration = Duration::from_micros(110);

const DEVICE_TREE_RANGES: &str = "/proc/device-tree/soc/ranges";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
enum Function {
    Output = 0b001,
    Alt0 = 0b100,
    Alt5 = 0b010,
}

/// Which PWM output and pin function a GPIO needs
fn route(gpio: u8) -> Result<(PwmChannel, Function)> {
    match gpio {
        12 => Ok((PwmChannel::Pwm0, Function::Alt0)),
        13 => Ok((PwmChannel::Pwm1, Function::Alt0)),
        18 => Ok((PwmChannel::Pwm0, Function::Alt5)),
        19 => Ok((PwmChannel::Pwm1, Function::Alt5)),
        other => Err(Error::UnsupportedPin(other)),
    }
}

impl PwmChannel {
    fn enable_bit(self) -> u32 {
        match self {
            PwmChannel::Pwm0 => 1 << 0,
            PwmChannel::Pwm1 => 1 << 8,
        }
    }

    fn mark_space_bit(self) -> u32 {
        match self {
            PwmChannel::Pwm0 => 1 << 7,
            PwmChannel::Pwm1 => 1 << 15,
        }
    }

    fn range_reg(self) -> usize {
        match self {
            PwmChannel::Pwm0 => PWM_RNG1,
            PwmChannel::Pwm1 => PWM_RNG2,
        }
    }

    fn data_reg(self) -> usize {
        match self {
            PwmChannel::Pwm0 => PWM_DAT1,
            PwmChannel::Pwm1 => PWM_DAT2,
        }
    }
}

/// Divisor to program for a divisor computed against the 19.2 MHz clock
fn scaled_divisor(divisor: u32, base: u64) -> u32 {
    let divisor = if base == BCM2711_BASE {
        (divisor as u64 * 540 / 192) as u32
    } else {
        divisor
    };
    divisor.clamp(1, MAX_DIVISOR)
}

/// Reads the peripheral base address from the device tree
pub fn detect_base() -> Result<u64> {
    let ranges = fs::read(DEVICE_TREE_RANGES).map_err(|_| Error::PeripheralBase)?;
    let word = |at: usize| {
        ranges
            .get(at..at + 4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    };
    // 64 bit parents (BCM2711) put the address one cell later.
    let base = match word(4) {
        Some(0) => word(8),
        other => other,
    };
    base.filter(|&b| b != 0)
        .map(u64::from)
        .ok_or(Error::PeripheralBase)
}

#[derive(Debug)]
struct Block(Mapping);

impl Block {
    fn map(mem: &File, phys: u64) -> Result<Self> {
        Mapping::new(
            mem.as_raw_fd(),
            BLOCK_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            phys as libc::off_t,
        )
        .map(Block)
    }

    #[inline]
    fn read(&self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile(self.0.as_ptr().add(offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        unsafe { ptr::write_volatile(self.0.as_ptr().add(offset) as *mut u32, value) }
    }
}

#[derive(Debug)]
struct Registers {
    gpio: Block,
    pwm: Block,
    clock: Block,
}

impl Registers {
    fn set_function(&self, gpio: u8, function: Function) {
        let reg = GPFSEL0 + (gpio as usize / 10) * 4;
        let shift = (gpio as u32 % 10) * 3;
        let value = self.gpio.read(reg) & !(0b111 << shift);
        self.gpio.write(reg, value | ((function as u32) << shift));
    }
}

/// PWM block of a Raspberry Pi, configured for one GPIO
#[derive(Debug)]
pub struct Bcm2835 {
    regs: Arc<Registers>,
    base: u64,
    gpio: u8,
    channel: PwmChannel,
    range: u16,
}

impl Bcm2835 {
    /// Maps the peripheral at `base` and routes `gpio` to its PWM output
    pub fn new(base: u64, gpio: u8, mode: PwmMode, range: u32) -> Result<Self> {
        let (channel, function) = route(gpio)?;
        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(Error::DevMem)?;

        // The mappings outlive the descriptor.
        let regs = Registers {
            gpio: Block::map(&mem, base + GPIO_OFFSET)?,
            pwm: Block::map(&mem, base + PWM_OFFSET)?,
            clock: Block::map(&mem, base + CLOCK_OFFSET)?,
        };

        regs.set_function(gpio, function);
        thread::sleep(SETTLE);

        let mut ctl = regs.pwm.read(PWM_CTL);
        ctl &= !(channel.enable_bit() | channel.mark_space_bit());
        ctl |= channel.enable_bit();
        if mode == PwmMode::MarkSpace {
            ctl |= channel.mark_space_bit();
        }
        regs.pwm.write(PWM_CTL, ctl);
        regs.pwm.write(channel.range_reg(), range);

        log::info!(
            "BCM PWM at {:#x}: GPIO {} on {:?}, {:?}, range {}",
            base,
            gpio,
            channel,
            mode,
            range
        );
        Ok(Self {
            regs: Arc::new(regs),
            base,
            gpio,
            channel,
            range: range.min(u16::MAX as u32) as u16,
        })
    }
}

impl Pwm for Bcm2835 {
    type Clock = Bcm2835Clock;
    type Channel = Bcm2835Channel;

    fn split(self) -> (Bcm2835Clock, Bcm2835Channel) {
        (
            Bcm2835Clock {
                regs: Arc::clone(&self.regs),
                base: self.base,
            },
            Bcm2835Channel {
                regs: self.regs,
                gpio: self.gpio,
                channel: self.channel,
                range: self.range,
            },
        )
    }
}

/// PWM clock manager
#[derive(Debug)]
pub struct Bcm2835Clock {
    regs: Arc<Registers>,
    base: u64,
}

impl ClockDivider for Bcm2835Clock {
    fn set_divisor(&mut self, divisor: u32) {
        let divisor = scaled_divisor(divisor, self.base);
        let regs = &self.regs;

        // The clock must be stopped and idle before DIVI may change.
        let ctl = regs.pwm.read(PWM_CTL);
        regs.pwm.write(PWM_CTL, 0);
        regs.clock.write(CM_PWMCTL, CM_PASSWORD | CM_SRC_OSC);
        thread::sleep(SETTLE);

        let mut spins = 0;
        while regs.clock.read(CM_PWMCTL) & CM_BUSY != 0 && spins < CM_BUSY_SPINS {
            thread::sleep(Duration::from_micros(1));
            spins += 1;
        }
        if spins == CM_BUSY_SPINS {
            log::warn!("PWM clock still busy, writing divisor anyway");
        }

        regs.clock.write(CM_PWMDIV, CM_PASSWORD | (divisor << 12));
        regs.clock.write(CM_PWMCTL, CM_PASSWORD | CM_ENABLE | CM_SRC_OSC);
        regs.pwm.write(PWM_CTL, ctl);
        log::trace!("PWM clock divisor {}", divisor);
    }
}

/// One PWM output routed to the buzzer GPIO
#[derive(Debug)]
pub struct Bcm2835Channel {
    regs: Arc<Registers>,
    gpio: u8,
    channel: PwmChannel,
    range: u16,
}

impl PwmPin for Bcm2835Channel {
    type Duty = u16;

    fn disable(&mut self) {
        let ctl = self.regs.pwm.read(PWM_CTL);
        self.regs.pwm.write(PWM_CTL, ctl & !self.channel.enable_bit());
    }

    fn enable(&mut self) {
        let ctl = self.regs.pwm.read(PWM_CTL);
        self.regs.pwm.write(PWM_CTL, ctl | self.channel.enable_bit());
    }

    fn get_duty(&self) -> u16 {
        self.regs.pwm.read(self.channel.data_reg()) as u16
    }

    fn get_max_duty(&self) -> u16 {
        self.range
    }

    fn set_duty(&mut self, duty: u16) {
        self.regs.pwm.write(self.channel.data_reg(), duty as u32);
    }
}

impl IntoOutput for Bcm2835Channel {
    type Output = Bcm2835Pin;

    fn into_output(self) -> Bcm2835Pin {
        self.regs.set_function(self.gpio, Function::Output);
        Bcm2835Pin {
            regs: self.regs,
            gpio: self.gpio,
        }
    }
}

/// The buzzer GPIO as a plain digital output
#[derive(Debug)]
pub struct Bcm2835Pin {
    regs: Arc<Registers>,
    gpio: u8,
}

impl Bcm2835Pin {
    fn bank(&self) -> (usize, u32) {
        ((self.gpio as usize / 32) * 4, 1 << (self.gpio as u32 % 32))
    }
}

impl OutputPin for Bcm2835Pin {
    type Error = Infallible;

    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        let (bank, bit) = self.bank();
        self.regs.gpio.write(GPCLR0 + bank, bit);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        let (bank, bit) = self.bank();
        self.regs.gpio.write(GPSET0 + bank, bit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buzzer_pins_route_to_pwm() {
        assert_eq!(route(18).unwrap(), (PwmChannel::Pwm0, Function::Alt5));
        assert_eq!(route(12).unwrap(), (PwmChannel::Pwm0, Function::Alt0));
        assert_eq!(route(19).unwrap(), (PwmChannel::Pwm1, Function::Alt5));
        assert!(matches!(route(4), Err(Error::UnsupportedPin(4))));
    }

    #[test]
    fn divisor_fits_register() {
        assert_eq!(scaled_divisor(42, 0x3F00_0000), 42);
        assert_eq!(scaled_divisor(0, 0x3F00_0000), 1);
        assert_eq!(scaled_divisor(1_000_000, 0x2000_0000), MAX_DIVISOR);
    }

    #[test]
    fn bcm2711_divisor_is_rescaled() {
        // 42 ticks of 19.2 MHz are 118 ticks of 54 MHz.
        assert_eq!(scaled_divisor(42, BCM2711_BASE), 118);
    }
}
