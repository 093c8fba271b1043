use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rv5soc_core::decode::disasm;
use rv5soc_core::program::{load_program_file, BOOT_PROGRAM};
use rv5soc_core::{Soc, PIN_ACTIVE, PIN_FETCH, PIN_OUT0, PIN_OUT1};

#[derive(Parser, Debug)]
#[command(
    name = "rv5soc-run",
    about = "Run the five-instruction RV32 SoC and watch its output pins."
)]
struct Args {
    /// Number of instructions to execute before exiting.
    #[arg(long, default_value_t = 200)]
    instructions: u64,

    /// Hard bound on clock edges; stops the run even mid-instruction.
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,

    /// Program image to load instead of the built-in blink image: hex words
    /// (# or // comments allowed), or raw little-endian words as `.bin`.
    #[arg(long, value_name = "PATH")]
    program: Option<PathBuf>,

    /// Clock edges to hold reset asserted before execution.
    #[arg(long, default_value_t = 1)]
    reset_ticks: u64,

    /// Print each retired instruction.
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Stop once output pin 0 has changed level this many times.
    #[arg(long, value_name = "COUNT")]
    watch_led: Option<u64>,

    /// Write a machine snapshot (JSON) on exit.
    #[arg(long, value_name = "PATH")]
    snapshot_out: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    let words = match args.program.as_deref() {
        Some(path) => {
            let words = load_program_file(path)
                .with_context(|| format!("loading program image {}", path.display()))?;
            eprintln!("[program] {} words from {}", words.len(), path.display());
            words
        }
        None => {
            eprintln!("[program] built-in blink image ({} words)", BOOT_PROGRAM.len());
            BOOT_PROGRAM.to_vec()
        }
    };
    let mut soc = Soc::new(&words).context("building the machine")?;

    for _ in 0..args.reset_ticks {
        soc.tick(true);
    }

    let mut led_changes: u64 = 0;
    let mut last_pins = soc.pins();
    while soc.instr_count() < args.instructions {
        if let Some(bound) = args.ticks {
            if soc.cycle_count() >= bound {
                eprintln!("[exit] tick bound {bound} reached");
                break;
            }
        }

        let retired = soc.tick(false);
        if args.trace {
            if let Some(retired) = &retired {
                println!(
                    "[trace] #{index} cycle={cycle} pc=0x{pc:08X} -> 0x{next:08X}  {asm}",
                    index = soc.instr_count() - 1,
                    cycle = soc.cycle_count(),
                    pc = retired.pc,
                    next = retired.pc_after,
                    asm = disasm(retired.word),
                );
            }
        }

        let pins = soc.pins();
        if (pins ^ last_pins) & PIN_OUT0 != 0 {
            led_changes += 1;
            println!(
                "[led] pin0 -> {level} at cycle {cycle} (instruction {index})",
                level = u8::from(pins & PIN_OUT0 != 0),
                cycle = soc.cycle_count(),
                index = soc.instr_count(),
            );
            if args.watch_led.is_some_and(|count| led_changes >= count) {
                break;
            }
        }
        last_pins = pins;
    }

    let pins = soc.pins();
    println!(
        "[exit] cycles={cycles} instructions={instrs} out_reg=0x{out:08X}",
        cycles = soc.cycle_count(),
        instrs = soc.instr_count(),
        out = soc.bus.out.value(),
    );
    println!(
        "[exit] pins: out0={} out1={} active={} fetch={}",
        u8::from(pins & PIN_OUT0 != 0),
        u8::from(pins & PIN_OUT1 != 0),
        u8::from(pins & PIN_ACTIVE != 0),
        u8::from(pins & PIN_FETCH != 0),
    );
    for (index, value) in soc.cpu.regs().iter().enumerate() {
        if *value != 0 {
            println!("[exit] x{index}=0x{value:08X}");
        }
    }

    if let Some(path) = args.snapshot_out.as_deref() {
        soc.save_snapshot(path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        eprintln!("[snapshot] wrote {}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    run(Args::parse())
}
