use std::fs::{File, OpenOptions};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use memmap2::{Mmap, MmapMut};

use delta::{
    apply_delta_inplace, apply_delta_to, decode_delta, diff, encode_delta, encode_delta_inplace,
    make_inplace, place_commands, placed_summary, Algorithm, CyclePolicy, DecodedDelta,
    EncodeOptions,
};

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Greedy,
    Onepass,
    Correcting,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(a: AlgorithmArg) -> Self {
        match a {
            AlgorithmArg::Greedy => Algorithm::Greedy,
            AlgorithmArg::Onepass => Algorithm::Onepass,
            AlgorithmArg::Correcting => Algorithm::Correcting,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Localmin,
    Constant,
}

impl From<PolicyArg> for CyclePolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Localmin => CyclePolicy::Localmin,
            PolicyArg::Constant => CyclePolicy::Constant,
        }
    }
}

#[derive(Parser)]
#[command(about = "Differential compression (Ajtai, Burns, Fagin, Long & Stockmeyer, 2002)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a delta encoding of `version` against `reference`.
    Encode {
        #[arg(value_enum)]
        algorithm: AlgorithmArg,
        reference: String,
        version: String,
        delta_file: String,

        #[arg(long, default_value_t = delta::SEED_LEN)]
        seed_len: usize,

        #[arg(long, default_value_t = delta::TABLE_SIZE)]
        table_size: usize,

        /// 0 means "use --seed-len"
        #[arg(long, default_value_t = 0)]
        min_copy: usize,

        #[arg(long, default_value_t = 256)]
        buf_cap: usize,

        /// Produce an in-place reconstructible delta
        #[arg(long)]
        inplace: bool,

        #[arg(long, value_enum, default_value_t = PolicyArg::Localmin)]
        policy: PolicyArg,

        /// Use a splay tree index instead of a hash table (greedy only)
        #[arg(long)]
        splay: bool,

        /// Emit tracing diagnostics to stderr
        #[arg(long)]
        verbose: bool,
    },

    /// Reconstruct `version` from `reference` and a delta file.
    Decode { reference: String, delta_file: String, output: String },

    /// Print header fields and a command summary for a delta file.
    Info { delta_file: String },
}

/// Either a memory-mapped file or, for a zero-length file (which memmap2
/// refuses to map), an empty owned buffer.
enum MappedInput {
    Mapped(#[allow(dead_code)] File, Mmap),
    Empty,
}

impl std::ops::Deref for MappedInput {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            MappedInput::Mapped(_, mmap) => mmap,
            MappedInput::Empty => &[],
        }
    }
}

fn mmap_readonly(path: &str) -> Result<MappedInput> {
    let file = File::open(path).with_context(|| format!("opening {path}"))?;
    if file.metadata()?.len() == 0 {
        return Ok(MappedInput::Empty);
    }
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping {path}"))?;
    Ok(MappedInput::Mapped(file, mmap))
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {path}"))
}

fn create_output(path: &str, size: usize) -> Result<(File, Option<MmapMut>)> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("creating {path}"))?;
    if size == 0 {
        return Ok((file, None));
    }
    file.set_len(size as u64).with_context(|| format!("sizing {path}"))?;
    // SAFETY: the file was just created and truncated; nothing else holds it open.
    let mmap = unsafe { MmapMut::map_mut(&file) }.with_context(|| format!("mapping {path}"))?;
    Ok((file, Some(mmap)))
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            algorithm,
            reference,
            version,
            delta_file,
            seed_len,
            table_size,
            min_copy,
            buf_cap,
            inplace,
            policy,
            splay,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt().with_env_filter("delta=debug").init();
            }

            let r = read_input(&reference)?;
            let v = read_input(&version)?;
            let algo: Algorithm = algorithm.into();
            let opts = EncodeOptions { seed_len, table_size, min_copy, use_splay: splay, buf_cap, verbose };

            let t0 = Instant::now();
            let commands = diff(algo, &r, &v, &opts).context("encoding")?;

            let pol: CyclePolicy = policy.into();
            let (delta_bytes, num_copies, num_adds, cycles_broken) = if inplace {
                let (placed, stats) = make_inplace(&r, &commands, pol);
                let bytes = encode_delta_inplace(v.len(), &placed);
                let summary = placed_summary(&placed);
                (bytes, summary.num_copies, summary.num_adds, stats.cycles_broken)
            } else {
                let placed = place_commands(&commands);
                let bytes = encode_delta(v.len(), &commands);
                let summary = placed_summary(&placed);
                (bytes, summary.num_copies, summary.num_adds, 0)
            };
            let elapsed = t0.elapsed();

            std::fs::write(&delta_file, &delta_bytes).with_context(|| format!("writing {delta_file}"))?;

            let ratio = if v.is_empty() { 0.0 } else { delta_bytes.len() as f64 / v.len() as f64 };
            let algo_name = format!("{algo:?}").to_lowercase();
            println!(
                "Algorithm:    {}{}{}",
                algo_name,
                if splay { " [splay]" } else { "" },
                if inplace { " + in-place" } else { "" }
            );
            println!("Reference:    {reference} ({} bytes)", r.len());
            println!("Version:      {version} ({} bytes)", v.len());
            println!("Delta:        {delta_file} ({} bytes)", delta_bytes.len());
            println!("Compression:  {ratio:.4} (delta/version)");
            println!("Commands:     {num_copies} copies, {num_adds} adds");
            if inplace {
                println!("Cycles broken: {cycles_broken}");
            }
            println!("Time:         {:.3}s", elapsed.as_secs_f64());
        }

        Commands::Decode { reference, delta_file, output } => {
            let r_map = mmap_readonly(&reference)?;
            let r: &[u8] = &r_map;

            let delta_bytes = read_input(&delta_file)?;
            let decoded = decode_delta(&delta_bytes).context("decoding delta")?;

            let t0 = Instant::now();
            match decoded {
                DecodedDelta::Sequential { version_len, commands } => {
                    let (_out_file, out_map) = create_output(&output, version_len)?;
                    if let Some(mut mm) = out_map {
                        apply_delta_to(r, &commands, &mut mm).context("applying delta")?;
                        mm.flush().with_context(|| format!("flushing {output}"))?;
                    }
                }
                DecodedDelta::Inplace { version_len, commands } => {
                    let result = apply_delta_inplace(r, &commands, version_len).context("applying delta")?;
                    let (_out_file, out_map) = create_output(&output, version_len)?;
                    if let Some(mut mm) = out_map {
                        mm.copy_from_slice(&result);
                        mm.flush().with_context(|| format!("flushing {output}"))?;
                    }
                }
            }
            let elapsed = t0.elapsed();

            println!("Reference:    {reference} ({} bytes)", r.len());
            println!("Delta:        {delta_file} ({} bytes)", delta_bytes.len());
            println!("Output:       {output}");
            println!("Time:         {:.3}s", elapsed.as_secs_f64());
        }

        Commands::Info { delta_file } => {
            let delta_bytes = read_input(&delta_file)?;
            let decoded = decode_delta(&delta_bytes).context("decoding delta")?;

            let (fmt, version_len, summary) = match decoded {
                DecodedDelta::Sequential { version_len, commands } => {
                    ("sequential", version_len, delta::delta_summary(&commands))
                }
                DecodedDelta::Inplace { version_len, commands } => {
                    ("in-place", version_len, placed_summary(&commands))
                }
            };

            println!("Delta file:   {delta_file} ({} bytes)", delta_bytes.len());
            println!("Format:       {fmt}");
            println!("Version size: {version_len} bytes");
            println!("Commands:     {}", summary.num_commands);
            println!("  Copies:     {} ({} bytes)", summary.num_copies, summary.copy_bytes);
            println!("  Adds:       {} ({} bytes)", summary.num_adds, summary.add_bytes);
            println!("Output size:  {} bytes", summary.total_output_bytes);
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
