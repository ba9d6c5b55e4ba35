use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use slamem_rs::io::{append_to_basename, fasta};
use slamem_rs::mem::{self, sort, MemOpt};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "slamem-rs",
    author,
    version,
    about = "Find maximal exact matches (MEMs) between DNA sequences using a sampled LCP array",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find MEMs of the query sequences against every reference sequence
    Mems {
        /// Reference FASTA file (every record is indexed on its own)
        reference: PathBuf,
        /// Query FASTA file(s)
        #[arg(required = true)]
        queries: Vec<PathBuf>,
        /// Minimum MEM length
        #[arg(short = 'l', long = "min-len", default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
        min_len: u32,
        /// Output file (default: <reference basename>-mems.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also match the reverse complement of each query
        #[arg(short, long = "both-strands")]
        both_strands: bool,
        /// Discard non-ACGT letters instead of converting them to N
        #[arg(short = 'n', long = "acgt-only")]
        acgt_only: bool,
        /// Print index statistics and progress bars
        #[arg(short, long)]
        verbose: bool,
    },
    /// Sort a MEMs file by reference position (writes <basename>-sorted.txt)
    Sort {
        /// MEMs file produced by `mems`
        mems_file: PathBuf,
    },
    /// Keep only ACGT characters of a FASTA file and merge its records (writes <basename>-clean.fasta)
    Clean {
        /// FASTA file to clean
        fasta_file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Mems {
            reference,
            queries,
            min_len,
            output,
            both_strands,
            acgt_only,
            verbose,
        } => {
            let opt = MemOpt {
                min_len,
                both_strands,
                acgt_only,
                verbose,
            };
            let output = output.unwrap_or_else(|| append_to_basename(&reference, "-mems.txt"));
            mem::run_mems(&reference, &queries, &output, &opt)
        }
        Commands::Sort { mems_file } => run_sort(&mems_file),
        Commands::Clean { fasta_file } => run_clean(&fasta_file),
    }
}

fn run_sort(mems_file: &Path) -> Result<()> {
    info!("sorting MEMs from '{}' ...", mems_file.display());
    let out = sort::sort_mems_file(mems_file)?;
    info!("sorted MEMs saved to '{}'", out.display());
    Ok(())
}

fn run_clean(path: &Path) -> Result<()> {
    let out = append_to_basename(path, "-clean.fasta");
    info!("creating clean FASTA file '{}' ...", out.display());
    let stats = fasta::clean_fasta(path, &out)?;
    info!(
        "{} total chars ({} non ACGT chars removed) ; {} sequence(s) merged",
        stats.chars, stats.removed, stats.sequences
    );
    Ok(())
}
