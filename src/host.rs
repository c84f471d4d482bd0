// ABOUTME: The host boundary isolating interpreter side effects from I/O

use std::io::{self, Write};

/// Every effect a running script has on the outside world funnels through
/// here, so the evaluator itself never touches stdio or the process
/// directly.
pub trait Host {
    fn write_out(&mut self, text: &str);
    fn write_line(&mut self, text: &str);
    fn read_line(&mut self) -> String;
    fn terminate(&mut self, code: i32) -> !;
}

pub struct StdHost;

impl Host for StdHost {
    fn write_out(&mut self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    fn write_line(&mut self, text: &str) {
        println!("{text}");
    }

    fn read_line(&mut self) -> String {
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).unwrap_or(0);
        buf.trim_end_matches(['\n', '\r']).to_string()
    }

    fn terminate(&mut self, code: i32) -> ! {
        std::process::exit(code);
    }
}
