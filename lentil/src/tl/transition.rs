use crate::tl::utils::normalize_sparse;
use crate::tl::velocity_graph::{graph_key, graph_neg_key};
use anno_data::AnnotatedData;
use log::info;
use matrix_util::geometric::geometric_matrix_sum;
use matrix_util::traits::MatTriplets;
use matrix_util::utils::percentile;
use nalgebra_sparse::CsrMatrix;

#[derive(Clone, Debug)]
pub struct TransitionArgs {
    /// velocity key whose graphs are turned into probabilities
    pub vkey: String,
    /// sharpness of the exponential kernel
    pub scale: f32,
    /// let cells with little confidence in any direction stay put
    pub self_transitions: bool,
    /// treat negative cosines as transitions away from a cell
    pub use_negative_cosines: bool,
    /// reverse the direction of every transition
    pub backward: bool,
    /// sum the powers of the kernel up to this many steps
    pub n_recurse: Option<usize>,
}

impl Default for TransitionArgs {
    fn default() -> Self {
        Self {
            vkey: "velocity".into(),
            scale: 10.,
            self_transitions: true,
            use_negative_cosines: false,
            backward: false,
            n_recurse: None,
        }
    }
}

/// `clip(p98(confidence) - confidence, 0, 1)` where the confidence of a
/// cell is its largest cosine
fn self_probabilities(graph: &CsrMatrix<f32>) -> Vec<f32> {
    let confidence: Vec<f32> = graph
        .row_iter()
        .map(|r| r.values().iter().copied().fold(0_f32, f32::max))
        .collect();
    let ub = percentile(&confidence, 98.).unwrap_or(0.);
    confidence
        .iter()
        .map(|&c| (ub - c).clamp(0., 1.))
        .collect()
}

/// Row-stochastic transition matrix from the velocity graph.
///
/// Each positive cosine `g` becomes `exp(scale * g)`. Negative cosines
/// enter the same way, or with `use_negative_cosines` as the negative
/// weight `-expm1(-scale * g)` against a kernel of `expm1(scale * g)`.
/// Rows are then divided by their absolute sums.
pub fn transition_matrix<A>(adata: &A, args: &TransitionArgs) -> anyhow::Result<CsrMatrix<f32>>
where
    A: AnnotatedData + ?Sized,
{
    let graph = adata.graph(&graph_key(&args.vkey))?;
    let graph_neg = adata.graph(&graph_neg_key(&args.vkey))?;
    let nn = graph.nrows();
    let s = args.scale;

    let positive_kernel = |g: f32| {
        if args.use_negative_cosines {
            (s * g).exp_m1()
        } else {
            (s * g).exp()
        }
    };
    let negative_kernel = |g: f32| {
        if args.use_negative_cosines {
            -(-s * g).exp_m1()
        } else {
            (s * g).exp()
        }
    };

    let mut triplets = Vec::with_capacity(graph.nnz() + graph_neg.nnz() + nn);
    triplets.extend(
        graph
            .triplet_iter()
            .filter(|&(i, j, _)| i != j)
            .map(|(i, j, &g)| (i, j, positive_kernel(g))),
    );
    triplets.extend(
        graph_neg
            .triplet_iter()
            .filter(|&(i, j, _)| i != j)
            .map(|(i, j, &g)| (i, j, negative_kernel(g))),
    );

    if args.self_transitions {
        let self_prob = self_probabilities(graph);
        triplets.extend(
            self_prob
                .into_iter()
                .enumerate()
                .filter(|&(_, p)| p > 0.)
                .map(|(i, p)| (i, i, positive_kernel(p))),
        );
    }

    let mut tt = CsrMatrix::<f32>::from_nonzero_triplets(nn, nn, triplets)?;
    if args.backward {
        tt = tt.transpose();
    }
    let mut tt = normalize_sparse(&tt);

    if let Some(n) = args.n_recurse.filter(|&n| n > 1) {
        tt = normalize_sparse(&geometric_matrix_sum(&tt, n));
    }

    info!("transition matrix: {} cells, {} transitions", nn, tt.nnz());
    Ok(tt)
}
