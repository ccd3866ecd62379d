//! Console output macros. `println!` is for progress and status messages;
//! `eprintln!` flags conditions someone should look at, and is prefixed so it
//! stands out in a serial log.

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        // Console output is best effort.
        let _ = write!($crate::serial::SerialWriter::new(), "{}", format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! println {
    () => {{
        $crate::print!("\n");
    }};
    ($($arg:tt)*) => {{
        $crate::print!("{}\n", format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {{
        $crate::print!("[!] {}", format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! eprintln {
    () => {{
        $crate::print!("\n");
    }};
    ($($arg:tt)*) => {{
        $crate::print!("[!] {}\n", format_args!($($arg)*));
    }};
}
