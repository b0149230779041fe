use crate::cli_common::*;
use crate::run_preprocess::{preprocess_data, PreprocessArgs};
use lentil::pp::neighbors::{CONNECTIVITIES_KEY, DISTANCES_KEY};
use lentil::pp::{neighbors, NeighborsArgs};
use matrix_util::common_io::write_lines;
use matrix_util::neighbors::{get_indices, get_iterative_indices_all};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Args, Debug)]
pub struct NeighborsCmdArgs {
    #[command(flatten)]
    pub preprocess: PreprocessArgs,

    #[arg(
        long,
        short = 'k',
        default_value_t = DEFAULT_KNN,
        help = "Number of nearest neighbours, the cell itself included"
    )]
    pub n_neighbors: usize,

    #[arg(
        long,
        short = 'p',
        default_value_t = DEFAULT_PCS,
        help = "Principal components for the neighbour search (0: use X)"
    )]
    pub n_pcs: usize,

    #[arg(
        long,
        help = "Prune each cell to this many neighbours",
        long_help = "Prune each cell to this many neighbours before writing\n\
		     the table. Capped by the fewest neighbours of any cell."
    )]
    pub prune: Option<usize>,

    #[arg(long, default_value = "distances", help = "Where to read neighbours from")]
    pub mode: NeighborModeCli,

    #[arg(long, default_value_t = 2, help = "Hops of the closure")]
    pub n_recurse_neighbors: usize,

    #[arg(long, help = "Sample at most this many cells per closure")]
    pub max_neighs: Option<usize>,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    pub seed: u64,
}

pub fn run_neighbors(args: &NeighborsCmdArgs) -> anyhow::Result<()> {
    init_logger(args.preprocess.verbose);

    let mut adata = preprocess_data(&args.preprocess)?;
    let nargs = NeighborsArgs {
        n_neighbors: args.n_neighbors,
        n_pcs: args.n_pcs,
        seed: args.seed,
        ..Default::default()
    };
    neighbors(&mut adata, &nargs)?;

    let (indices, pruned) = get_indices(
        adata.graph(DISTANCES_KEY)?,
        args.prune,
        args.mode.clone().into(),
    )?;
    info!(
        "neighbour table: {} cells, up to {} neighbours",
        indices.num_cells(),
        indices.width()
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let closures = get_iterative_indices_all(
        &indices,
        args.n_recurse_neighbors,
        args.max_neighs,
        &mut rng,
    )?;

    let out = &args.preprocess.out;
    mkdir(&out_file(out, "neighbors.tsv.gz")?)?;

    let names = adata.obs_names();
    let table: Vec<Box<str>> = names
        .iter()
        .zip(indices.rows())
        .map(|(name, row)| {
            std::iter::once(name.to_string())
                .chain(row.iter().map(|&j| names[j].to_string()))
                .collect::<Vec<_>>()
                .join("\t")
                .into_boxed_str()
        })
        .collect();
    write_lines(&table, &out_file(out, "neighbors.tsv.gz")?)?;

    let mut sizes: Vec<Box<str>> = vec!["name\tn_neighbors\tclosure_size".into()];
    sizes.extend(names.iter().zip(closures.iter()).enumerate().map(|(i, (name, c))| {
        format!("{}\t{}\t{}", name, indices.num_valid(i), c.len()).into_boxed_str()
    }));
    write_lines(&sizes, &out_file(out, "closure_sizes.tsv.gz")?)?;

    write_mtx_csr(&pruned, &out_file(out, "distances.mtx.gz")?)?;
    write_mtx_csr(
        adata.graph(CONNECTIVITIES_KEY)?,
        &out_file(out, "connectivities.mtx.gz")?,
    )?;
    Ok(())
}
