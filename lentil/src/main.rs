mod cli_common;
mod run_neighbors;
mod run_preprocess;
mod run_velocity;

use cli_common::*;
use run_neighbors::*;
use run_preprocess::*;
use run_velocity::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "RNA velocity from spliced and unspliced counts\n\
		  Data directories hold cells x genes `.mtx[.gz]` files:\n\
		  spliced, unspliced and optionally ambiguous counts."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Filter and normalize spliced/unspliced counts",
        long_about = "Preprocess count data in three stages: \n\
		      (1) Filter genes by spliced and unspliced counts\n\
		      (2) Keep the most variable genes by normalized dispersion\n\
		      (3) Normalize total counts per cell and log-transform X.\n"
    )]
    Preprocess(PreprocessArgs),

    #[command(
        about = "Estimate RNA velocity and its transition graph",
        long_about = "Estimate velocities in four stages: \n\
		      (1) Preprocess as in `lentil preprocess`\n\
		      (2) Average counts over kNN neighbourhoods (moments)\n\
		      (3) Fit steady-state ratios and take residuals as velocities\n\
		      (4) Correlate velocities with displacements to neighbours\n\
		      and turn the cosines into transition probabilities.\n\
		      Optionally project the velocities onto an embedding.\n"
    )]
    Velocity(VelocityCmdArgs),

    #[command(
        about = "Build the kNN graph and its multi-hop closures",
        long_about = "Build the kNN graph on principal components, prune it\n\
		      to a common number of neighbours per cell and expand each\n\
		      cell's neighbourhood over several hops. Writes the table\n\
		      and the closure sizes for inspection.\n"
    )]
    Neighbors(NeighborsCmdArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Preprocess(args) => {
            run_preprocess(args)?;
        }
        Commands::Velocity(args) => {
            run_velocity(args)?;
        }
        Commands::Neighbors(args) => {
            run_neighbors(args)?;
        }
    }

    info!("Done");
    Ok(())
}
