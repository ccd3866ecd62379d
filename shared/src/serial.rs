//! Kernel console. On bare metal this is COM1; hosted builds (including the
//! test harness) write to stderr instead.

use core::fmt;
#[cfg(target_os = "none")]
use core::sync::atomic::{AtomicBool, Ordering};

/// Handle to the console. It carries no state of its own so each `print!`
/// invocation can create one.
pub struct SerialWriter;

impl SerialWriter {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for SerialWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
mod port {
    use core::arch::asm;

    pub const IO_BASE: u16 = 0x3f8;
    pub const RBR: u16 = IO_BASE; // Receiver Buffer Reg (read-only)
    pub const THR: u16 = IO_BASE; // Transmitter Holding Reg (write-only)
    pub const IER: u16 = IO_BASE + 1; // Interrupt Enable Reg
    pub const FCR: u16 = IO_BASE + 2; // FIFO Control Reg (write-only)
    pub const LCR: u16 = IO_BASE + 3; // Line Control Register
    pub const MCR: u16 = IO_BASE + 4; // MODEM Control Register
    pub const LSR: u16 = IO_BASE + 5; // Line Status Register (read-only)

    pub unsafe fn outb(port: u16, byte: u8) {
        asm!("out dx, al", in("dx") port, in("al") byte)
    }

    pub unsafe fn inb(port: u16) -> u8 {
        let res: u8;
        asm!("in al, dx", in("dx") port, out("al") res);
        res
    }
}

#[cfg(target_os = "none")]
static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "none")]
impl SerialWriter {
    fn ensure_initialized(&mut self) {
        use port::{inb, outb, FCR, IER, LCR, MCR, RBR, THR};

        if INITIALIZED.load(Ordering::Acquire) {
            return;
        }

        // SAFETY: Follows the correct proceedure for initializing serial ports.
        unsafe {
            // https://wiki.osdev.org/Serial_Ports#Initialization

            outb(IER, 0x00);
            outb(LCR, 0x80);
            outb(THR, 0x03);
            outb(IER, 0x00);
            outb(LCR, 0x03);
            outb(FCR, 0xC7);
            outb(MCR, 0x0B);

            outb(MCR, 0x1E); // Enable loopback.

            // Confirm that serial is working by writing a byte and reading it
            // back.
            const EXPECTED: u8 = 0xAE;
            outb(THR, EXPECTED);
            let actual = inb(RBR);
            assert!(
                actual == EXPECTED,
                "faulty serial, expected {EXPECTED:#X}, got {actual:#X}"
            );

            outb(MCR, 0x0F); // Disable loopback.
        }

        INITIALIZED.store(true, Ordering::Release);
    }
}

#[cfg(target_os = "none")]
impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        use port::{inb, outb, LSR, THR};

        self.ensure_initialized();

        for b in s.bytes() {
            // SAFETY: Correctly waits before outputting byte to serial port.
            unsafe {
                while inb(LSR) & 0x20 == 0 {}
                outb(THR, b);
            }
        }

        Ok(())
    }
}

#[cfg(not(target_os = "none"))]
impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        use std::io::Write;

        std::io::stderr()
            .write_all(s.as_bytes())
            .map_err(|_| fmt::Error)
    }
}
