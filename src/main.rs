use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dualtree_dist::align::{dtw_alignment, load_series};
use dualtree_dist::exchange::TracingObserver;
use dualtree_dist::{
    BoundStatistic, BruteForceNearest, ComputeOutcome, DistanceResults, DistributedDualtreeDfs,
    DistributedTable, DualtreeConfig, EuclideanMetric, GnpProblem, HeapArena, HypercubeSchedule,
    PointSet, Table, TransportChannel, TreeBuilder,
};

#[derive(Parser, Debug)]
#[command(
    name = "dualtree-dist",
    about = "Distributed dual-tree preprocessing and hypercube exchange"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the exchange over an in-process group, one thread per rank.
    Exchange {
        /// Number of ranks (must be a power of two).
        #[arg(long, default_value_t = 4)]
        ranks: usize,
        /// Total points across all ranks.
        #[arg(long, default_value_t = 1024)]
        points: usize,
        /// Dimensionality of each point.
        #[arg(long, default_value_t = 3)]
        dims: usize,
        /// Maximum points per tree leaf.
        #[arg(long, default_value_t = 16)]
        leaf_size: usize,
        /// Seed for the synthetic point generator.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Log every exchange event.
        #[arg(long)]
        verbose: bool,
    },
    /// Run the exchange with one rank per MPI process (launch with mpirun).
    #[cfg(feature = "mpi")]
    Mpi {
        /// Total points across all ranks.
        #[arg(long, default_value_t = 1024)]
        points: usize,
        /// Dimensionality of each point.
        #[arg(long, default_value_t = 3)]
        dims: usize,
        /// Maximum points per tree leaf.
        #[arg(long, default_value_t = 16)]
        leaf_size: usize,
        /// Seed for the synthetic point generator.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Log every exchange event.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the round plan of every rank.
    Schedule {
        /// Number of ranks (must be a power of two).
        #[arg(long)]
        ranks: usize,
    },
    /// Align two time series with dynamic time warping.
    Dtw {
        /// First series (one row of comma or whitespace separated values).
        x: PathBuf,
        /// Second series.
        y: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = match cli.command {
        Commands::Exchange { verbose, .. } => verbose,
        #[cfg(feature = "mpi")]
        Commands::Mpi { verbose, .. } => verbose,
        _ => false,
    };
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Exchange {
            ranks,
            points,
            dims,
            leaf_size,
            seed,
            verbose,
        } => {
            let config = DualtreeConfig::default()
                .with_leaf_size(leaf_size)
                .with_verbose(verbose);
            run_exchange(&config, ranks, points, dims, seed)?
        }
        #[cfg(feature = "mpi")]
        Commands::Mpi {
            points,
            dims,
            leaf_size,
            seed,
            verbose,
        } => {
            let config = DualtreeConfig::default()
                .with_leaf_size(leaf_size)
                .with_verbose(verbose);
            run_mpi(&config, points, dims, seed)?
        }
        Commands::Schedule { ranks } => run_schedule(ranks)?,
        Commands::Dtw { x, y } => run_dtw(x, y)?,
    }

    Ok(())
}

/// What one rank reports back to the driver.
#[derive(Debug)]
struct RankSummary {
    rank: usize,
    local_points: usize,
    outcome: ComputeOutcome,
    mean_nearest: f64,
}

fn run_exchange(
    config: &DualtreeConfig,
    ranks: usize,
    points: usize,
    dims: usize,
    seed: u64,
) -> Result<()> {
    config.validate()?;
    if dims == 0 {
        return Err(anyhow!("dims must be > 0"));
    }
    let builder = config.tree_builder()?;
    let world = config.cluster(ranks)?;
    let arena = config.arena();
    let sizes = partition_sizes(points, ranks);

    info!(ranks, points, dims, leaf_size = config.leaf_size, "starting exchange");

    let mut summaries = thread::scope(|scope| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|transport| {
                let (arena, sizes, builder) = (&arena, &sizes, &builder);
                scope.spawn(move || {
                    run_rank(&transport, arena, sizes, builder, dims, seed, config.verbose)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow!("rank thread panicked"))?
                    .context("rank failed")
            })
            .collect::<Result<Vec<_>>>()
    })?;
    summaries.sort_by_key(|summary| summary.rank);

    for summary in &summaries {
        println!("{}", summary);
    }
    println!("{}", arena.stats().report());

    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(config: &DualtreeConfig, points: usize, dims: usize, seed: u64) -> Result<()> {
    use dualtree_dist::MpiTransport;

    config.validate()?;
    if dims == 0 {
        return Err(anyhow!("dims must be > 0"));
    }
    let universe = mpi::initialize().ok_or_else(|| anyhow!("MPI is already initialized"))?;
    let transport = MpiTransport::new(universe.world(), config.verify_checksums);
    let builder = config.tree_builder()?;
    let arena = config.arena();
    let sizes = partition_sizes(points, transport.size());

    if transport.rank() == 0 {
        info!(
            ranks = transport.size(),
            points,
            dims,
            leaf_size = config.leaf_size,
            "starting exchange"
        );
    }
    let summary = run_rank(&transport, &arena, &sizes, &builder, dims, seed, config.verbose)
        .with_context(|| format!("rank {} failed", transport.rank()))?;
    println!("{}", summary);
    println!("rank {:>3}: {}", summary.rank, arena.stats().report());

    Ok(())
}

impl std::fmt::Display for RankSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rank {:>3}: {:>6} points, {} rounds, {} tables received, {} released, mean nearest distance {:.6}",
            self.rank,
            self.local_points,
            self.outcome.rounds,
            self.outcome.tables_materialized,
            self.outcome.tables_released,
            self.mean_nearest
        )
    }
}

fn run_rank<C: TransportChannel>(
    transport: &C,
    arena: &HeapArena,
    sizes: &[usize],
    builder: &TreeBuilder,
    dims: usize,
    seed: u64,
    verbose: bool,
) -> dualtree_dist::Result<RankSummary> {
    let rank = transport.rank();
    let rank_seed = seed ^ (rank as u64).wrapping_mul(0x9E37_79B9);
    let points = synthetic_points(sizes[rank], dims, rank_seed)?;
    let table = DistributedTable::new(rank, sizes, Table::build(points, builder))?;
    let mut problem: GnpProblem<BoundStatistic, DistanceResults> = GnpProblem::monochromatic(table);

    let mut results = DistanceResults::default();
    let mut hook = BruteForceNearest::new(sizes).excluding_self();
    let observer = TracingObserver;

    let mut dfs = DistributedDualtreeDfs::init(transport, arena, &mut problem)?;
    if verbose {
        dfs = dfs.with_observer(&observer);
    }
    let outcome = dfs.compute_with(&EuclideanMetric, &mut results, &mut hook)?;

    let finite: Vec<f64> = results
        .min_distances
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .collect();
    let mean_nearest = if finite.is_empty() {
        0.0
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };

    Ok(RankSummary {
        rank,
        local_points: results.len(),
        outcome,
        mean_nearest,
    })
}

fn run_schedule(ranks: usize) -> Result<()> {
    for rank in 0..ranks {
        let schedule = HypercubeSchedule::new(rank, ranks)
            .with_context(|| format!("cannot schedule {} ranks", ranks))?;
        println!("rank {} ({} rounds)", rank, schedule.num_rounds());
        for plan in schedule.rounds() {
            println!("  {}", plan);
        }
    }
    Ok(())
}

fn run_dtw(x_path: PathBuf, y_path: PathBuf) -> Result<()> {
    let x = load_series(&x_path)
        .with_context(|| format!("failed to read series from {}", x_path.display()))?;
    let y = load_series(&y_path)
        .with_context(|| format!("failed to read series from {}", y_path.display()))?;

    let alignment = dtw_alignment(&x, &y);
    println!("{}", alignment);
    Ok(())
}

/// Split `total` points as evenly as possible over `ranks`.
fn partition_sizes(total: usize, ranks: usize) -> Vec<usize> {
    let base = total / ranks.max(1);
    let extra = total % ranks.max(1);
    (0..ranks)
        .map(|rank| base + usize::from(rank < extra))
        .collect()
}

/// Deterministic points in the unit cube (splitmix64).
fn synthetic_points(count: usize, dims: usize, seed: u64) -> dualtree_dist::Result<PointSet> {
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    };
    let coords = (0..count * dims).map(|_| next()).collect();
    PointSet::new(dims, coords)
}
