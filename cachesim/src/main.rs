use std::fs::File;
use std::io::BufReader;
use std::time::Instant;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use cachelab::cache::CacheSim;
use cachelab::config::SimulationConfig;
use cachelab::io::read_trace;
use cachelab::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Reversible set-associative cache simulator"))]
struct Args {
    /// JSON cache configuration
    config: String,
    /// Trace file, one `PC ADDRESS MODE [SIZE]` record per line
    trace: String,

    /// Undo this many of the final steps before reporting
    #[arg(short, long, default_value_t = 0)]
    undo: u64,

    /// Print the valid lines and storage breakdown of every cache
    #[arg(long)]
    dump: bool,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn init_logging(debug: bool) {
    // `RUST_LOG` wins over the flag when it is set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn dump(cache: &CacheSim) {
    let config = cache.get_config();
    println!("{} ({} sets, {} ways, {} words per line)", config.name, config.sets, config.ways, config.blocks);
    let size = cache.get_cache_size();
    for component in &size.components {
        println!("  {}: {}", component.kind, component.bits);
    }
    println!("  Total: {} bits", size.bits);
    let layout = cache.get_layout();
    for (index, set) in cache.get_sets() {
        for (way, line) in set.iter().filter(|(_, line)| line.valid) {
            let dirty: Vec<String> = line.dirty_blocks.iter().map(u32::to_string).collect();
            println!(
                "  set {index:>4} way {way:>2}: 0x{:08x} counter {} mru {} dirty [{}]",
                layout.build_address(line.tag, *index, 0),
                line.counter,
                line.mru,
                dirty.join(", ")
            );
        }
    }
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    init_logging(args.debug);
    let config_file = File::open(&args.config).map_err(|e| format!("Couldn't open the config file at path {}: {e}", args.config))?;
    let config: SimulationConfig = serde_json::from_reader(BufReader::new(config_file)).map_err(|e| format!("Couldn't parse the config file: {e}"))?;
    let mut simulator = Simulator::new(&config).map_err(|e| format!("Invalid cache configuration: {e}"))?;
    let trace = read_trace(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    simulator.simulate(&trace).map_err(|e| format!("Couldn't simulate the trace: {e}"))?;
    info!(steps = simulator.steps(), caches = simulator.caches().len(), "simulated trace");
    for undone in 0..args.undo {
        if !simulator.undo_step() {
            eprintln!("Only {undone} of {} steps could be undone", args.undo);
            break;
        }
    }
    let result = simulator.result();
    println!("{}", serde_json::to_string_pretty(&result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    if args.dump {
        simulator.caches().iter().for_each(dump);
    }
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        let formatted = simulator
            .caches()
            .iter()
            .map(|cache| format!("{}: {:.4}", cache.get_config().name, cache.get_hit_rate()))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Hit rates: ({formatted})");
        println!("Steps simulated: {}", simulator.steps());
    }
    Ok(())
}
