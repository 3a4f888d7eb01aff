//! Terminal implementation of the input provider.

use knit_core::{InputProvider, KnitError, Result};
use std::io::{self, BufRead, Write};

/// Reads answers from stdin, writes prompts and notices to stderr
pub struct TerminalInput<R> {
    reader: R,
}

impl TerminalInput<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            reader: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> TerminalInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        eprint!("{prompt}: ");
        io::stderr().flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(KnitError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<R: BufRead> InputProvider for TerminalInput<R> {
    fn ask_text(&mut self, prompt: &str) -> Result<String> {
        self.read_line(prompt)
    }

    fn ask_int(&mut self, prompt: &str) -> Result<i64> {
        loop {
            let answer = self.read_line(prompt)?;
            match answer.trim().parse() {
                Ok(value) => return Ok(value),
                Err(_) => eprintln!("'{}' is not a whole number, try again.", answer.trim()),
            }
        }
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}
