// Hosted front-end: wires stdin/stdout up as the serial device and drops
// into the shell. The library underneath is the same no_std core a boot
// stub would drive.
use std::io::{Read, Write};

use tickos::serial::{ByteSink, ByteSource};

struct Stdout;

impl ByteSink for Stdout {
    fn put_byte(&self, byte: u8) {
        let mut out = std::io::stdout().lock();
        out.write_all(&[byte]).ok();
        out.flush().ok();
    }
}

struct Stdin;

impl ByteSource for Stdin {
    fn get_byte(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match std::io::stdin().lock().read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}

static STDOUT: Stdout = Stdout;
static STDIN: Stdin = Stdin;

fn main() {
    tickos::serial::set_sink(&STDOUT);
    tickos::serial::set_source(&STDIN);
    tickos::init();

    println!();
    println!("========================================");
    println!("    tickos - teaching kernel core");
    println!("========================================");
    println!("Type 'help' for available commands");
    println!();

    tickos::shell::run();
}
