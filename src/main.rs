use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use netpath::batch::{run_batch, write_outcomes, BatchSummary, QueryEngine};
use netpath::config::{ArcTypeFilter, RouteConfig};
use netpath::network;
use netpath::output::GeoJsonWriter;

#[derive(Parser)]
#[command(name = "netpath")]
#[command(about = "Shortest path queries over a vector network", long_about = None)]
struct Cli {
    /// Input network file (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Output GeoJSON file ("-" for stdout)
    #[arg(short, long)]
    output: PathBuf,

    /// File with start/end records; reads stdin when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Arc types used as network edges
    #[arg(long = "type", default_value = "line,boundary")]
    arc_type: ArcTypeFilter,

    /// Arc layer
    #[arg(long, default_value_t = 1)]
    arc_layer: u32,

    /// Node layer (category lookups for direct queries)
    #[arg(long, default_value_t = 2)]
    node_layer: u32,

    /// Arc forward/both direction cost column; metric length when omitted
    #[arg(long)]
    forward_column: Option<String>,

    /// Arc backward direction cost column
    #[arg(long)]
    backward_column: Option<String>,

    /// Node cost column
    #[arg(long)]
    node_column: Option<String>,

    /// Maximum distance to the network for coordinate endpoints
    #[arg(long, default_value_t = 1000.0)]
    dmax: f64,

    /// Use geodesic distances (longitude-latitude networks)
    #[arg(short, long)]
    geodesic: bool,

    /// Write each path as its original input segments, not one line
    #[arg(short, long)]
    segments: bool,

    /// Enforce turntable restrictions
    #[arg(short, long)]
    turntable: bool,

    /// Cost of turns without a turntable entry
    #[arg(long, default_value_t = 0.0)]
    turn_cost: f64,

    /// Abandon routes above this cumulative cost
    #[arg(long)]
    cost_ceiling: Option<f64>,
}

impl Cli {
    fn route_config(&self) -> RouteConfig {
        RouteConfig {
            arc_types: self.arc_type,
            arc_layer: self.arc_layer,
            node_layer: self.node_layer,
            forward_cost_column: self.forward_column.clone(),
            backward_cost_column: self.backward_column.clone(),
            node_cost_column: self.node_column.clone(),
            geodesic: self.geodesic,
            max_distance: self.dmax,
            turntable: self.turntable,
            segments: self.segments,
            default_turn_cost: self.turn_cost,
            cost_ceiling: self.cost_ceiling,
        }
    }
}

fn run(cli: &Cli) -> Result<BatchSummary> {
    let config = cli.route_config();

    info!(path = %cli.input.display(), "loading network");
    let net = network::load(&cli.input)
        .with_context(|| format!("failed to load network from {}", cli.input.display()))?;
    if config.geodesic && !net.latlon {
        warn!("geodesic mode requested but the network does not declare lon/lat coordinates");
    }

    let engine = QueryEngine::new(&net, config).context("failed to build the cost graph")?;
    info!(
        nodes = engine.graph().node_count(),
        arcs = engine.graph().arc_count(),
        "graph ready"
    );

    let outcomes = match &cli.file {
        Some(path) => {
            let reader = BufReader::new(
                File::open(path)
                    .with_context(|| format!("failed to open query file {}", path.display()))?,
            );
            run_batch(&engine, reader).context("failed to read query records")?
        }
        None => run_batch(&engine, io::stdin().lock()).context("failed to read query records")?,
    };

    let out: Box<dyn Write> = if cli.output.as_os_str() == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(
            File::create(&cli.output)
                .with_context(|| format!("failed to create {}", cli.output.display()))?,
        )
    };
    let mut sink = GeoJsonWriter::new(BufWriter::new(out));
    write_outcomes(&engine, &outcomes, &mut sink)
        .context("failed to write output (the result may be incomplete)")
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(summary) if summary.failed > 0 => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
