use std::io::{self, Write};

use termcolor::{self, ColorChoice, ColorSpec, StandardStream, WriteColor};

use base::prelude::*;
use cpu::{AmEntryStatus, Fault, PtwKey};

use super::options::TranslateRequest;

fn get_colour_choice() -> termcolor::ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Writes the outcome of each translation to standard output.
pub struct Reporter {
    stream: StandardStream,
}

impl Reporter {
    pub fn new() -> Reporter {
        Reporter {
            stream: StandardStream::stdout(get_colour_choice()),
        }
    }

    fn coloured(&mut self, colour: termcolor::Color, text: &str) -> Result<(), io::Error> {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(colour)).set_bold(true);
        self.stream.set_color(&spec)?;
        write!(self.stream, "{text}")?;
        self.stream.reset()
    }

    pub fn translation(
        &mut self,
        request: &TranslateRequest,
        outcome: &Result<AbsoluteAddress, Fault>,
    ) -> Result<(), io::Error> {
        write!(
            self.stream,
            "{:>05o}|{:>06o} {:<20} ",
            request.segno,
            request.offset,
            request.cycle.to_string()
        )?;
        match outcome {
            Ok(address) => {
                self.coloured(termcolor::Color::Green, "ok")?;
                writeln!(self.stream, "    {address:>08o}")
            }
            Err(fault) => {
                self.coloured(termcolor::Color::Red, "FAULT")?;
                writeln!(self.stream, " {}", fault.details)
            }
        }
    }

    pub fn sdwam(&mut self, entries: &[AmEntryStatus<SegmentNumber>]) -> Result<(), io::Error> {
        writeln!(self.stream, "SDW associative memory:")?;
        for e in entries.iter().filter(|e| e.valid) {
            writeln!(
                self.stream,
                "  slot {:>2} use {:>2} segment {:>05o}",
                e.slot, e.use_count, e.key
            )?;
        }
        Ok(())
    }

    pub fn ptwam(&mut self, entries: &[AmEntryStatus<PtwKey>]) -> Result<(), io::Error> {
        writeln!(self.stream, "PTW associative memory:")?;
        for e in entries.iter().filter(|e| e.valid) {
            writeln!(
                self.stream,
                "  slot {:>2} use {:>2} segment {:>05o} page {:>3o}",
                e.slot, e.use_count, e.key.segment, e.key.page
            )?;
        }
        Ok(())
    }
}
