// Serial console: byte sink/source plumbing for logs and shell input.
//
// The engine never talks to a UART directly; the host (or a boot shim)
// installs a `ByteSink`/`ByteSource` pair and everything else goes through
// the `kprint!`/`kprintln!` macros or the raw put_* helpers below.
use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

/// Destination for diagnostic output. One byte at a time, like a UART FIFO.
pub trait ByteSink: Sync {
    fn put_byte(&self, byte: u8);
}

/// Blocking input source for the shell. `None` means the source is gone
/// (closed stdin on a host, never on real hardware).
pub trait ByteSource: Sync {
    fn get_byte(&self) -> Option<u8>;
}

pub struct Console {
    sink: Option<&'static dyn ByteSink>,
}

impl Console {
    const fn new() -> Self {
        Console { sink: None }
    }

    fn write_byte(&mut self, byte: u8) {
        if let Some(sink) = self.sink {
            sink.put_byte(byte);
        }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

lazy_static! {
    static ref CONSOLE: Mutex<Console> = Mutex::new(Console::new());
    static ref SOURCE: Mutex<Option<&'static dyn ByteSource>> = Mutex::new(None);
}

/// Install the output device. Output before this call is dropped.
pub fn set_sink(sink: &'static dyn ByteSink) {
    CONSOLE.lock().sink = Some(sink);
}

/// Install the input device used by the shell.
pub fn set_source(source: &'static dyn ByteSource) {
    *SOURCE.lock() = Some(source);
}

pub fn put_byte(byte: u8) {
    CONSOLE.lock().write_byte(byte);
}

pub fn put_string(s: &str) {
    use fmt::Write;
    CONSOLE.lock().write_str(s).ok();
}

/// 8-digit uppercase hex, no prefix.
pub fn put_hex_u32(value: u32) {
    use fmt::Write;
    write!(CONSOLE.lock(), "{:08X}", value).ok();
}

pub fn put_decimal_u32(value: u32) {
    use fmt::Write;
    write!(CONSOLE.lock(), "{}", value).ok();
}

/// Read one byte from the installed source, blocking until one arrives.
pub fn get_byte() -> Option<u8> {
    let source = *SOURCE.lock();
    source.and_then(|s| s.get_byte())
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    CONSOLE.lock().write_fmt(args).ok();
}

#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ($crate::kprint!("{}\n", format_args!($($arg)*)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    struct Capture {
        buf: Mutex<String>,
    }

    impl ByteSink for Capture {
        fn put_byte(&self, byte: u8) {
            self.buf.lock().push(byte as char);
        }
    }

    static CAPTURE: Capture = Capture {
        buf: Mutex::new(String::new()),
    };

    #[test]
    fn formatting_helpers_match_device_contract() {
        set_sink(&CAPTURE);

        CAPTURE.buf.lock().clear();
        put_hex_u32(0);
        assert_eq!(CAPTURE.buf.lock().as_str(), "00000000");

        CAPTURE.buf.lock().clear();
        put_hex_u32(0xDEAD_BEEF);
        assert_eq!(CAPTURE.buf.lock().as_str(), "DEADBEEF");

        CAPTURE.buf.lock().clear();
        put_decimal_u32(0);
        assert_eq!(CAPTURE.buf.lock().as_str(), "0");

        CAPTURE.buf.lock().clear();
        put_decimal_u32(4_294_967_295);
        assert_eq!(CAPTURE.buf.lock().as_str(), "4294967295");

        CAPTURE.buf.lock().clear();
        put_string("tick");
        put_byte(b'!');
        assert_eq!(CAPTURE.buf.lock().as_str(), "tick!");
    }
}
