#![deny(unsafe_code)]

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use clap::Parser;
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::{
    AppendingUnit, AppendingUnitConfiguration, AssociativeMemoryConfiguration,
    DescriptorSegmentBuilder, MemoryConfiguration, MemoryUnit, PanicOnFault,
};

mod options;
mod report;

use options::{parse_segment, parse_translate, SegmentSpec, TranslateRequest};
use report::Reporter;

const ABOUT: &str = "Lay out DPS8/M segments in memory and show how addresses translate";

/// The descriptor segment is placed at this absolute address, and
/// the segments follow it.
const DESCRIPTOR_SEGMENT_BASE: u32 = 0o1000;

/// Translate segmented addresses with an emulated DPS8/M appending unit
#[derive(Parser, Debug)]
#[clap(version, about=ABOUT, long_about = None)]
struct Cli {
    /// Size of main memory, in words (octal)
    #[clap(long, default_value = "4000000", value_parser = parse_octal_u32)]
    memory_words: u32,

    /// Page the descriptor segment
    #[clap(long)]
    paged_descriptor_segment: bool,

    /// A segment to create, as SEGNO:BOUND:R1,R2,R3:FLAGS[:paged]
    /// (octal numbers; FLAGS drawn from REWPG)
    #[clap(long = "segment", value_parser = parse_segment)]
    segments: Vec<SegmentSpec>,

    /// An address to translate, as SEGNO|OFFSET[:CYCLE] where CYCLE
    /// is one of if, rd, st, ind, rtcd (default rd)
    #[clap(long = "translate", value_parser = parse_translate)]
    translations: Vec<TranslateRequest>,

    /// The ring of the procedure making the references
    #[clap(long, default_value = "0", value_parser = parse_octal_u32)]
    ring: u32,

    /// The segment number of the procedure making the references
    #[clap(long, default_value = "0", value_parser = parse_octal_u32)]
    psr: u32,

    /// Disable the SDW associative memory
    #[clap(long)]
    no_sdwam: bool,

    /// Disable the PTW associative memory
    #[clap(long)]
    no_ptwam: bool,

    /// Show the contents of the associative memories at the end
    #[clap(long)]
    show_am: bool,
}

fn parse_octal_u32(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s, 8).map_err(|e| format!("'{s}' is not an octal number: {e}"))
}

#[derive(Debug)]
enum Fail {
    Generic(String),
    Faulted(usize),
}

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fail::Generic(message) => f.write_str(message),
            Fail::Faulted(1) => f.write_str("1 translation faulted"),
            Fail::Faulted(n) => write!(f, "{n} translations faulted"),
        }
    }
}

impl Error for Fail {}

fn build_memory(cli: &Cli) -> Result<(MemoryUnit, DescriptorSegmentBuilder), Fail> {
    let mut mem = MemoryUnit::new(&MemoryConfiguration {
        size_words: cli.memory_words,
    });
    let highest_segno = cli
        .segments
        .iter()
        .map(|s| u32::from(s.segno))
        .max()
        .unwrap_or(0);
    let mut layout = DescriptorSegmentBuilder::new(
        &mut mem,
        cli.paged_descriptor_segment,
        AbsoluteAddress::from_truncated(DESCRIPTOR_SEGMENT_BASE),
        highest_segno + 1,
    )
    .map_err(|e| Fail::Generic(format!("failed to create the descriptor segment: {e}")))?;
    for spec in cli.segments.iter() {
        let result = if spec.paged {
            layout.add_paged_segment(&mut mem, spec.segno, &spec.sdw)
        } else {
            layout.add_unpaged_segment(&mut mem, spec.segno, &spec.sdw)
        };
        let sdw = result.map_err(|e| {
            Fail::Generic(format!("failed to create segment {:o}: {e}", spec.segno))
        })?;
        event!(Level::INFO, "segment {:>05o}: {}", spec.segno, sdw);
    }
    Ok((mem, layout))
}

fn probe() -> Result<(), Fail> {
    let cli = Cli::parse();
    // See
    // https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/fmt/index.html#filtering-events-with-environment-variables
    // for instructions on how to select which trace messages get
    // printed.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Err(e) => {
            return Err(Fail::Generic(
		format!("failed to initialise tracing filter (perhaps there is a problem with environment variables): {}", e)));
        }
        Ok(layer) => layer,
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let ring = Ring::try_from(cli.ring)
        .map_err(|_| Fail::Generic(format!("ring {:o} does not exist", cli.ring)))?;
    let psr = SegmentNumber::try_from(cli.psr)
        .map_err(|_| Fail::Generic(format!("segment number {:o} is too large", cli.psr)))?;

    let (mut mem, layout) = build_memory(&cli)?;
    let mut apu = AppendingUnit::new(&AppendingUnitConfiguration {
        sdwam: AssociativeMemoryConfiguration {
            enabled: !cli.no_sdwam,
        },
        ptwam: AssociativeMemoryConfiguration {
            enabled: !cli.no_ptwam,
        },
        panic_on_fault: PanicOnFault::No,
    });
    apu.load_dsbr(layout.dsbr_pair());
    apu.regs.ppr.psr = psr;
    apu.regs.ppr.prr = ring;

    let mut reporter = Reporter::new();
    let write_failed = |e: std::io::Error| Fail::Generic(format!("failed to write output: {e}"));
    let mut faults = 0;
    for request in cli.translations.iter() {
        let span = span!(Level::INFO, "translate", segment=%request.segno, offset=%request.offset);
        let _enter = span.enter();
        apu.regs.tpr.tsr = request.segno;
        apu.regs.tpr.trr = ring;
        let outcome = apu.translate(&mut mem, request.offset, request.cycle);
        if outcome.is_err() {
            faults += 1;
        }
        reporter
            .translation(request, &outcome)
            .map_err(write_failed)?;
    }
    if cli.show_am {
        reporter
            .sdwam(&apu.sdwam_entries())
            .map_err(write_failed)?;
        reporter
            .ptwam(&apu.ptwam_entries())
            .map_err(write_failed)?;
    }
    for status in apu
        .fault_unit()
        .get_fault_statuses()
        .into_iter()
        .filter(|s| s.count > 0)
    {
        event!(
            Level::INFO,
            "{} (fault {}) occurred {} times; most recently: {}",
            status.name,
            status.number,
            status.count,
            status.message
        );
    }
    if faults > 0 {
        Err(Fail::Faulted(faults))
    } else {
        Ok(())
    }
}

fn main() {
    match probe() {
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Ok(()) => {
            std::process::exit(0);
        }
    }
}
