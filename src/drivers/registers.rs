// StrainLog - Register Access Layer
//
// Byte-level primitives against one addressable device on the shared sensor
// bus. Every call is a complete request/response transaction; nothing is
// pipelined, so two logical operations can never interleave on the wire.

use embedded_hal::i2c::I2c;

/// An 8-bit device register with a fixed offset, viewed as a typed bitfield.
///
/// Drivers describe each register as a small `Copy` newtype with named
/// accessors. Updates go through [`RegisterBus::modify`], which makes the
/// read-modify-write explicit and keeps the unrelated bits intact.
pub trait Register: Copy {
    const ADDR: u8;

    fn from_bits(bits: u8) -> Self;
    fn bits(self) -> u8;
}

pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> RegisterBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus handle back to the caller.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn read_byte(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value])
    }

    /// Burst-read consecutive registers starting at `reg`.
    ///
    /// The caller is responsible for any auto-increment flag the device
    /// needs in the register address.
    pub fn read_many(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.address, &[reg], buf)
    }

    /// Send raw bytes with no register pointer (command-style devices).
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, bytes)
    }

    /// Read raw bytes with no register pointer (command-style devices).
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.read(self.address, buf)
    }

    pub fn set_bit(&mut self, reg: u8, bit: u8) -> Result<(), I2C::Error> {
        let value = self.read_byte(reg)?;
        self.write_byte(reg, value | (1 << bit))
    }

    pub fn clear_bit(&mut self, reg: u8, bit: u8) -> Result<(), I2C::Error> {
        let value = self.read_byte(reg)?;
        self.write_byte(reg, value & !(1 << bit))
    }

    pub fn get_bit(&mut self, reg: u8, bit: u8) -> Result<bool, I2C::Error> {
        Ok(self.read_byte(reg)? & (1 << bit) != 0)
    }

    pub fn read<R: Register>(&mut self) -> Result<R, I2C::Error> {
        self.read_byte(R::ADDR).map(R::from_bits)
    }

    pub fn write<R: Register>(&mut self, value: R) -> Result<(), I2C::Error> {
        self.write_byte(R::ADDR, value.bits())
    }

    /// Read-modify-write of one register. Returns the value written.
    pub fn modify<R, F>(&mut self, f: F) -> Result<R, I2C::Error>
    where
        R: Register,
        F: FnOnce(R) -> R,
    {
        let updated = f(self.read::<R>()?);
        self.write(updated)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const ADDR: u8 = 0x2A;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Ctrl(u8);

    impl Register for Ctrl {
        const ADDR: u8 = 0x01;

        fn from_bits(bits: u8) -> Self {
            Self(bits)
        }

        fn bits(self) -> u8 {
            self.0
        }
    }

    #[test]
    fn set_bit_preserves_other_bits() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x00], vec![0b0000_0110]),
            Transaction::write(ADDR, vec![0x00, 0b0001_0110]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = RegisterBus::new(i2c.clone(), ADDR);

        bus.set_bit(0x00, 4).unwrap();
        i2c.done();
    }

    #[test]
    fn clear_bit_preserves_other_bits() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x00], vec![0b0001_0111]),
            Transaction::write(ADDR, vec![0x00, 0b0001_0110]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = RegisterBus::new(i2c.clone(), ADDR);

        bus.clear_bit(0x00, 0).unwrap();
        i2c.done();
    }

    #[test]
    fn get_bit_reads_single_flag() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x00], vec![0b0010_0000]),
            Transaction::write_read(ADDR, vec![0x00], vec![0b0000_0000]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = RegisterBus::new(i2c.clone(), ADDR);

        assert!(bus.get_bit(0x00, 5).unwrap());
        assert!(!bus.get_bit(0x00, 5).unwrap());
        i2c.done();
    }

    #[test]
    fn modify_is_one_read_and_one_write() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x01], vec![0b1010_0011]),
            Transaction::write(ADDR, vec![0x01, 0b1010_0101]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = RegisterBus::new(i2c.clone(), ADDR);

        let written = bus
            .modify(|r: Ctrl| Ctrl((r.0 & !0b0000_0111) | 0b101))
            .unwrap();
        assert_eq!(written, Ctrl(0b1010_0101));
        i2c.done();
    }

    #[test]
    fn burst_read_fills_buffer() {
        let expectations = [Transaction::write_read(
            ADDR,
            vec![0x12],
            vec![0x80, 0x00, 0x01],
        )];
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = RegisterBus::new(i2c.clone(), ADDR);

        let mut buf = [0u8; 3];
        bus.read_many(0x12, &mut buf).unwrap();
        assert_eq!(buf, [0x80, 0x00, 0x01]);
        i2c.done();
    }
}
