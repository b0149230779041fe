use crate::cli_common::*;
use crate::run_preprocess::{preprocess_data, write_preprocessed, PreprocessArgs};
use lentil::pp::{moments, MomentsArgs, NeighborsArgs};
use lentil::tl::{
    transition_matrix, velocity, velocity_embedding, velocity_graph, EmbeddingArgs,
    TransitionArgs, VelocityArgs, VelocityGraphArgs,
};

#[derive(Args, Debug)]
pub struct VelocityCmdArgs {
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

    #[arg(long, default_value_t = 0.01, help = "Minimum R^2 of a velocity gene")]
    pub min_r2: f32,

    #[arg(
        long,
        value_delimiter(','),
        default_value = "5,95",
        help = "Lower and upper percentiles of the cells used in the fit",
        long_help = "Lower and upper percentiles (comma-separated) of the\n\
		     normalized abundance. The steady-state ratio is fitted\n\
		     on the cells outside this range only."
    )]
    pub perc: Vec<f32>,

    #[arg(long, default_value_t = false, help = "Fit an offset with the degradation rate")]
    pub fit_offset: bool,

    #[arg(
        long,
        default_value = "distances",
        help = "Where the velocity graph reads neighbours from"
    )]
    pub mode: NeighborModeCli,

    #[arg(
        long,
        help = "Hops of the neighbour graph to search",
        long_help = "Hops of the neighbour graph to search for candidate\n\
		     transitions. Defaults to 2 on distances and 1 on\n\
		     connectivities."
    )]
    pub n_recurse_neighbors: Option<usize>,

    #[arg(long, help = "Sample at most this many candidates per cell")]
    pub max_neighs: Option<usize>,

    #[arg(long, default_value_t = false, help = "Signed square root before cosines")]
    pub sqrt_transform: bool,

    #[arg(long, default_value_t = 10., help = "Sharpness of the transition kernel")]
    pub scale: f32,

    #[arg(
        long,
        short = 'e',
        help = "Embedding to project velocities onto",
        long_help = "Tab-separated embedding with a header line and cell\n\
		     names in the first column (e.g. UMAP coordinates).\n\
		     Writes {out}/velocity_{basis}.tsv.gz"
    )]
    pub embedding: Option<Box<str>>,

    #[arg(long, default_value = "umap", help = "Name of the embedding")]
    pub basis: Box<str>,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    pub seed: u64,
}

fn percentiles(perc: &[f32]) -> anyhow::Result<Option<[f32; 2]>> {
    match perc {
        [] => Ok(None),
        [lo, hi] if lo <= hi => Ok(Some([*lo, *hi])),
        _ => anyhow::bail!("expected two increasing percentiles, got {:?}", perc),
    }
}

pub fn run_velocity(args: &VelocityCmdArgs) -> anyhow::Result<()> {
    let verbose = args.preprocess.verbose;
    init_logger(verbose);

    // 1. preprocessing
    let mut adata = preprocess_data(&args.preprocess)?;

    // 2. neighbours and moments
    let moments_args = MomentsArgs {
        n_neighbors: Some(args.n_neighbors),
        neighbors: NeighborsArgs {
            n_neighbors: args.n_neighbors,
            n_pcs: args.n_pcs,
            seed: args.seed,
            ..Default::default()
        },
        ..Default::default()
    };
    moments(&mut adata, &moments_args)?;

    // 3. velocity and its graph
    let velocity_args = VelocityArgs {
        perc: percentiles(&args.perc)?,
        min_r2: args.min_r2,
        fit_offset: args.fit_offset,
        ..Default::default()
    };
    velocity(&mut adata, &velocity_args)?;

    let graph_args = VelocityGraphArgs {
        vkey: velocity_args.vkey.clone(),
        n_recurse_neighbors: args.n_recurse_neighbors,
        max_neighs: args.max_neighs,
        mode: args.mode.clone().into(),
        sqrt_transform: args.sqrt_transform,
        seed: args.seed,
        show_progress: !verbose,
        ..Default::default()
    };
    velocity_graph(&mut adata, &graph_args)?;

    // 4. transitions
    let transition_args = TransitionArgs {
        vkey: velocity_args.vkey.clone(),
        scale: args.scale,
        ..Default::default()
    };
    let tt = transition_matrix(&adata, &transition_args)?;

    // 5. outputs
    let out = &args.preprocess.out;
    write_preprocessed(&adata, out)?;
    for key in ["velocity_graph", "velocity_graph_neg"] {
        write_mtx_csr(adata.graph(key)?, &out_file(out, &format!("{}.mtx.gz", key))?)?;
    }
    write_mtx_csr(&tt, &out_file(out, "transition.mtx.gz")?)?;

    if let Some(emb_file) = &args.embedding {
        let key = format!("X_{}", args.basis);
        read_embedding(&mut adata, &key, emb_file)?;

        let emb_args = EmbeddingArgs {
            basis: args.basis.to_string(),
            vkey: velocity_args.vkey.clone(),
            transition: transition_args,
        };
        let v_emb = velocity_embedding(&mut adata, &emb_args)?;

        let dims: Vec<Box<str>> = (0..v_emb.ncols())
            .map(|d| format!("{}{}", args.basis, d + 1).into_boxed_str())
            .collect();
        let emb_out = out_file(out, &format!("velocity_{}.tsv.gz", args.basis))?;
        write_tsv_with_names(&v_emb, adata.obs_names(), &dims, &emb_out)?;
        info!("wrote {}", emb_out);
    }

    Ok(())
}
