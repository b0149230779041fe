use crate::pp::neighbors::get_connectivities;
use crate::tl::embedding::{velocity_embedding, EmbeddingArgs};
use crate::tl::velocity_graph::{velocity_graph, VelocityGraphArgs};
use anno_data::{AnnError, AnnotatedData, Axis, Layer};
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use log::info;
use matrix_util::neighbors::NeighborMode;
use matrix_util::sparse_util::{from_dense, map_values, row_sums, scale_rows};
use matrix_util::utils::percentile;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use std::hash::Hash;

/// Coefficient of determination of each column, `1 - |res|^2 / |tot|^2`.
/// Undefined ratios (`0 / 0`) give zero.
#[allow(non_snake_case)]
pub fn R_squared(residual: &DMatrix<f32>, total: &DMatrix<f32>) -> Vec<f32> {
    residual
        .column_iter()
        .zip(total.column_iter())
        .map(|(r, t)| {
            let r2 = 1. - r.norm_squared() / t.norm_squared();
            if r2.is_nan() {
                0.
            } else {
                r2
            }
        })
        .collect()
}

/// Cosine between each row of `dx`, centred by its own mean, and `v`.
/// All zeros if `v` is zero; a row that is constant gets zero too.
pub fn cosine_correlation(dx: &DMatrix<f32>, v: &[f32]) -> Vec<f32> {
    let v_norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if v_norm == 0. {
        return vec![0.; dx.nrows()];
    }

    dx.row_iter()
        .map(|row| {
            let mu = row.mean();
            let (dot, ss) = row
                .iter()
                .zip(v.iter())
                .fold((0_f32, 0_f32), |(dot, ss), (&x, &vj)| {
                    let x = x - mu;
                    (dot + x * vj, ss + x * x)
                });
            let denom = ss.sqrt() * v_norm;
            if denom > 0. {
                dot / denom
            } else {
                0.
            }
        })
        .collect()
}

/// Divide each row by its sum; zero rows stay zero
pub fn normalize_dense(xx: &DMatrix<f32>) -> DMatrix<f32> {
    let mut ret = xx.clone();
    for mut row in ret.row_iter_mut() {
        let s = row.sum();
        if s != 0. {
            row /= s;
        }
    }
    ret
}

/// Divide each row by the sum of its absolute values
pub fn normalize_sparse(xx: &CsrMatrix<f32>) -> CsrMatrix<f32> {
    let inv: Vec<f32> = xx
        .row_iter()
        .map(|r| {
            let s: f32 = r.values().iter().map(|x| x.abs()).sum();
            if s > 0. {
                1. / s
            } else {
                0.
            }
        })
        .collect();
    scale_rows(xx, &inv)
}

/// Row normalization: by the row sum when dense, by the absolute row
/// sum when sparse
pub fn normalize(xx: &Layer) -> Layer {
    match xx {
        Layer::Dense(x) => Layer::Dense(normalize_dense(x)),
        Layer::Sparse(x) => Layer::Sparse(normalize_sparse(x)),
    }
}

/// Shift and stretch the finite values onto `[min, max]`; non-finite
/// values pass through shifted and scaled the same way
pub fn scale(x: &[f32], min: f32, max: f32) -> Vec<f32> {
    let finite = x.iter().copied().filter(|v| v.is_finite());
    let Some(lo) = finite.clone().reduce(f32::min) else {
        return x.to_vec();
    };
    let shifted: Vec<f32> = x.iter().map(|&v| v - lo + min).collect();
    let hi = finite.map(|v| v - lo + min).fold(f32::NEG_INFINITY, f32::max);
    shifted
        .into_iter()
        .map(|v| if hi != 0. { v / hi * max } else { v * max })
        .collect()
}

/// Cells whose group label is among `groups`.
///
/// Labels are read from `groupby` if it is an obs attribute, else from
/// `clusters`, else from `louvain`.
pub fn groups_to_bool<A>(adata: &A, groups: &[&str], groupby: Option<&str>) -> anyhow::Result<Vec<bool>>
where
    A: AnnotatedData + ?Sized,
{
    let key = groupby
        .into_iter()
        .chain(["clusters", "louvain"])
        .find(|k| adata.has_attr(Axis::Obs, k))
        .ok_or(AnnError::InvalidConfig("groupby attribute not valid".into()))?;

    Ok(adata
        .attr(Axis::Obs, key)?
        .labels()
        .iter()
        .map(|l| groups.contains(&l.as_ref()))
        .collect())
}

/// Most frequent item, ignoring `"nan"`; ties go to the item seen first
pub fn most_common_in_list<S: AsRef<str>>(list: &[S]) -> Option<Box<str>> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::default();
    for (pos, item) in list.iter().map(|s| s.as_ref()).enumerate() {
        if item == "nan" {
            continue;
        }
        counts.entry(item).or_insert((0, pos)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(item, _)| item.into())
}

/// Shuffle every column of `vv` across rows and flip the sign of each
/// entry at random
pub fn randomize_columns<R: Rng>(vv: &DMatrix<f32>, rng: &mut R) -> DMatrix<f32> {
    let mut ret = vv.clone();
    for mut col in ret.column_iter_mut() {
        let mut values: Vec<f32> = col.iter().copied().collect();
        values.shuffle(rng);
        for (x, v) in col.iter_mut().zip(values) {
            *x = if rng.random_bool(0.5) { v } else { -v };
        }
    }
    ret
}

/// Store a randomized copy of the `vkey` layer as `add_key` and build
/// its velocity graph (and embedding), as a null model for the real
/// velocities
pub fn randomized_velocity<A, R>(
    adata: &mut A,
    vkey: &str,
    add_key: &str,
    rng: &mut R,
) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
    R: Rng,
{
    let vv = adata.layer(vkey)?.to_dense();
    let random = randomize_columns(&vv, rng);
    let seed = rng.random();
    with_derived_velocity(adata, vkey, add_key, Layer::Dense(random), seed)
}

/// Store `layer` as `add_key`, then build its velocity graph on the
/// genes of `vkey` (all genes if `vkey` flags none) and project it onto
/// `X_umap` when that embedding exists. The container keeps its former
/// `add_key` layer if the graph cannot be built.
fn with_derived_velocity<A>(
    adata: &mut A,
    vkey: &str,
    add_key: &str,
    layer: Layer,
    seed: u64,
) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let genes_key = format!("{}_genes", vkey);
    let args = VelocityGraphArgs {
        vkey: add_key.into(),
        genes_key: adata.has_attr(Axis::Var, &genes_key).then_some(genes_key),
        seed,
        ..Default::default()
    };

    let previous = adata.remove_layer(add_key);
    adata.set_layer(add_key, layer)?;
    if let Err(err) = velocity_graph(adata, &args) {
        adata.remove_layer(add_key);
        if let Some(previous) = previous {
            adata.set_layer(add_key, previous)?;
        }
        return Err(err);
    }

    let emb_args = EmbeddingArgs {
        vkey: add_key.into(),
        ..Default::default()
    };
    if adata.obsm(&format!("X_{}", emb_args.basis)).is_ok() {
        velocity_embedding(adata, &emb_args)?;
    }
    Ok(())
}

/// All digits of each string read as one integer, `-1` if there are
/// none
pub fn extract_int_from_str<S: AsRef<str>>(items: &[S]) -> Vec<i64> {
    items
        .iter()
        .map(|s| {
            let digits: String = s.as_ref().chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<i64>().unwrap_or(-1)
        })
        .collect()
}

/// Per gene, `x / max(x) + y / max(y)` with maxima floored at `1e-3`
pub(crate) fn xy_norm(xx: &DMatrix<f32>, yy: &DMatrix<f32>) -> DMatrix<f32> {
    let mut ret = DMatrix::<f32>::zeros(xx.nrows(), xx.ncols());
    for (j, mut col) in ret.column_iter_mut().enumerate() {
        let x = xx.column(j);
        let y = yy.column(j);
        let x_max = x.max().max(1e-3);
        let y_max = y.max().max(1e-3);
        for (i, r) in col.iter_mut().enumerate() {
            *r = x[i] / x_max + y[i] / y_max;
        }
    }
    ret
}

/// Zero the velocities of cells whose normalized abundance in a gene
/// is below `frac_of_max` of the 98th percentile, store the result as
/// `key_added` and build its velocity graph (and embedding)
pub fn cutoff_small_velocities<A>(
    adata: &mut A,
    vkey: &str,
    key_added: &str,
    frac_of_max: f32,
    use_raw: bool,
) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let (xkey, ykey) = if use_raw {
        ("spliced", "unspliced")
    } else {
        ("Ms", "Mu")
    };
    let xx = adata.layer(xkey)?.to_dense();
    let yy = adata.layer(ykey)?.to_dense();
    let norm = xy_norm(&xx, &yy);

    let mut vv = adata.layer(vkey)?.to_dense();
    for (j, mut v) in vv.column_iter_mut().enumerate() {
        let col: Vec<f32> = norm.column(j).iter().copied().collect();
        let cutoff = percentile(&col, 98.).unwrap_or(f32::INFINITY) * frac_of_max;
        for (x, &w) in v.iter_mut().zip(col.iter()) {
            if w.is_nan() || w < cutoff {
                *x = 0.;
            }
        }
    }

    let cut = from_dense(&vv);
    info!("{} of {} velocities kept", cut.nnz(), vv.len());
    with_derived_velocity(adata, vkey, key_added, Layer::Sparse(cut), 0)
}

/// Keep each cell with probability `fraction`; returns the mask used
pub fn random_subsample<A, R>(adata: &mut A, fraction: f32, rng: &mut R) -> anyhow::Result<Vec<bool>>
where
    A: AnnotatedData + ?Sized,
    R: Rng,
{
    let coin = Bernoulli::new(fraction as f64)
        .map_err(|_| AnnError::InvalidConfig(format!("fraction {} not in [0, 1]", fraction)))?;
    let mask: Vec<bool> = (0..adata.n_obs()).map(|_| coin.sample(rng)).collect();
    adata.subset(&mask, Axis::Obs)?;
    Ok(mask)
}

/// Items occurring more than once, in order of first occurrence
pub fn get_duplicates<T: Eq + Hash + Clone>(items: &[T]) -> Vec<T> {
    let mut counts: HashMap<&T, usize> = HashMap::default();
    for x in items {
        *counts.entry(x).or_default() += 1;
    }
    let mut seen: HashSet<&T> = HashSet::default();
    items
        .iter()
        .filter(|&x| counts[&x] > 1 && seen.insert(x))
        .cloned()
        .collect()
}

/// Membership of each element of `x` in `y`
pub fn isin<T: Eq + Hash>(x: &[T], y: &[T]) -> Vec<bool> {
    let y: HashSet<&T> = y.iter().collect();
    x.iter().map(|v| y.contains(v)).collect()
}

/// Mask of length `n` that is true at `indices`
pub fn indices_to_bool(indices: &[usize], n: usize) -> Vec<bool> {
    let mut ret = vec![false; n];
    for &i in indices.iter().filter(|&&i| i < n) {
        ret[i] = true;
    }
    ret
}

/// Average `x` (cells x features) over neighbourhoods. Columns holding
/// a NaN come back as all NaN.
pub fn convolve<A>(adata: &A, x: &DMatrix<f32>) -> anyhow::Result<DMatrix<f32>>
where
    A: AnnotatedData + ?Sized,
{
    let conn = get_connectivities(adata, NeighborMode::Connectivities, None, false)?;
    if conn.ncols() != x.nrows() {
        return Err(AnnError::shape("convolved rows", conn.ncols(), x.nrows()).into());
    }

    let valid: Vec<usize> = (0..x.ncols())
        .filter(|&j| !x.column(j).sum().is_nan())
        .collect();
    let smoothed = &conn * &x.select_columns(&valid);

    let mut ret = DMatrix::<f32>::from_element(x.nrows(), x.ncols(), f32::NAN);
    for (k, &j) in valid.iter().enumerate() {
        ret.set_column(j, &smoothed.column(k));
    }
    Ok(ret)
}

/// `S + dt * V` with `S` the spliced counts (`use_raw`) or their
/// moments. With `dropna` genes with a non-finite result are dropped;
/// otherwise non-finite velocities count as zero.
pub fn get_extrapolated_state<A>(
    adata: &A,
    vkey: &str,
    dt: f32,
    use_raw: bool,
    dropna: bool,
) -> anyhow::Result<DMatrix<f32>>
where
    A: AnnotatedData + ?Sized,
{
    let ss = adata.layer(if use_raw { "spliced" } else { "Ms" })?.to_dense();
    let vv = adata.layer(vkey)?.to_dense();
    if ss.shape() != vv.shape() {
        return Err(AnnError::shape(
            vkey,
            format!("{:?}", ss.shape()),
            format!("{:?}", vv.shape()),
        )
        .into());
    }

    if dropna {
        let st = &ss + &vv * dt;
        let finite: Vec<usize> = (0..st.ncols())
            .filter(|&j| st.column(j).sum().is_finite())
            .collect();
        Ok(st.select_columns(&finite))
    } else {
        let vv = vv.map(|v| if v.is_finite() { v } else { 0. });
        Ok(ss + vv * dt)
    }
}

/// Scaled mean expression of the 200 genes with the highest
/// `gene_count_corr`, each divided by its maximum
pub fn get_plasticity_score<A>(adata: &A, modality: &str) -> anyhow::Result<Vec<f32>>
where
    A: AnnotatedData + ?Sized,
{
    let corr = adata
        .attr(Axis::Var, "gene_count_corr")?
        .to_f32()
        .ok_or(AnnError::InvalidConfig("gene_count_corr is not numeric".into()))?;

    let key = |j: &usize| {
        let c = corr[*j];
        if c.is_nan() {
            f32::NEG_INFINITY
        } else {
            c
        }
    };
    let mut top: Vec<usize> = (0..corr.len()).collect();
    top.sort_by(|a, b| key(b).total_cmp(&key(a)));
    top.truncate(200);

    let xx = adata.layer(modality)?.select_columns(&top).to_dense();
    let col_max: Vec<f32> = xx.column_iter().map(|c| c.max()).collect();

    let ncols = xx.ncols().max(1) as f32;
    let mean: Vec<f32> = xx
        .row_iter()
        .map(|r| {
            r.iter()
                .zip(col_max.iter())
                .filter(|&(_, &m)| m != 0.)
                .map(|(&x, &m)| x / m)
                .sum::<f32>()
                / ncols
        })
        .collect();
    Ok(scale(&mean, 0., 1.))
}

/// Row sums of the absolute values (used to check stochastic rows)
pub fn abs_row_sums(xx: &CsrMatrix<f32>) -> Vec<f32> {
    row_sums(&map_values(xx, f32::abs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pp::neighbors::{neighbors, NeighborsArgs};
    use anno_data::{AnnMatrix, Column};
    use approx::assert_abs_diff_eq;
    use matrix_util::traits::MatTriplets;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// cells on a line, all but the first moving right; no gene flags
    fn moving_line(n: usize) -> anyhow::Result<AnnMatrix> {
        let xs: Vec<f32> = (0..n).flat_map(|i| [i as f32, 0.]).collect();
        let ms = DMatrix::from_row_slice(n, 2, &xs);
        let vv = DMatrix::from_fn(n, 2, |i, j| if j == 0 && i > 0 { 1. } else { 0. });

        let mut adata = AnnMatrix::from_layer(Layer::Dense(ms.clone()));
        adata.set_layer("Ms", Layer::Dense(ms.clone()))?;
        adata.set_layer("Mu", Layer::Dense(ms))?;
        adata.set_layer("velocity", Layer::Dense(vv))?;
        let args = NeighborsArgs {
            n_neighbors: 3,
            n_pcs: 0,
            ..Default::default()
        };
        neighbors(&mut adata, &args)?;
        Ok(adata)
    }

    #[test]
    fn r_squared_per_column() {
        let res = DMatrix::from_row_slice(2, 3, &[1., 0., 1., 1., 0., 0.]);
        let tot = DMatrix::from_row_slice(2, 3, &[2., 0., 1., 2., 0., 0.]);
        let r2 = R_squared(&res, &tot);
        assert_abs_diff_eq!(r2[0], 0.75);
        assert_eq!(r2[1], 0.);
        assert_eq!(r2[2], 0.);
    }

    #[test]
    fn cosine_of_centred_rows() {
        let dx = DMatrix::from_row_slice(3, 3, &[1., 2., 3., 3., 2., 1., 5., 5., 5.]);
        let cos = cosine_correlation(&dx, &[-1., 0., 1.]);
        assert_abs_diff_eq!(cos[0], 1., epsilon = 1e-6);
        assert_abs_diff_eq!(cos[1], -1., epsilon = 1e-6);
        assert_eq!(cos[2], 0.);
        assert_eq!(cosine_correlation(&dx, &[0., 0., 0.]), vec![0.; 3]);
    }

    #[test]
    fn row_normalization() {
        let xx = DMatrix::from_row_slice(2, 2, &[1., 3., -1., 3.]);
        let dense = normalize_dense(&xx);
        assert_abs_diff_eq!(dense[(0, 0)], 0.25);
        assert_abs_diff_eq!(dense[(1, 0)], -0.5);
        let sparse = normalize_sparse(&from_dense(&xx));
        assert_eq!(abs_row_sums(&sparse), vec![1., 1.]);
    }

    #[test]
    fn min_max_scaling() {
        let out = scale(&[1., 3., f32::NAN, 5.], 0., 1.);
        assert_abs_diff_eq!(out[0], 0.);
        assert_abs_diff_eq!(out[1], 0.5);
        assert!(out[2].is_nan());
        assert_abs_diff_eq!(out[3], 1.);
        assert_eq!(scale(&[2., 2.], 0., 1.), vec![0., 0.]);
    }

    #[test]
    fn group_fallbacks() -> anyhow::Result<()> {
        let mut adata = AnnMatrix::from_layer(Layer::Dense(DMatrix::zeros(3, 1)));
        let err = groups_to_bool(&adata, &["a"], None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnnError>(),
            Some(AnnError::InvalidConfig(_))
        ));

        adata.set_attr(
            Axis::Obs,
            "clusters",
            Column::Str(vec!["a".into(), "b".into(), "a".into()]),
        )?;
        assert_eq!(
            groups_to_bool(&adata, &["a"], Some("missing"))?,
            vec![true, false, true]
        );
        Ok(())
    }

    #[test]
    fn most_common_skips_nan() {
        let list = ["nan", "nan", "nan", "b", "a", "a", "b"];
        assert_eq!(most_common_in_list(&list), Some("b".into()));
        assert_eq!(most_common_in_list(&["nan"]), None);
    }

    #[test]
    fn randomized_columns_keep_magnitudes() {
        let vv = DMatrix::from_row_slice(3, 2, &[1., -4., 2., 5., 3., 6.]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = randomize_columns(&vv, &mut rng);
        for j in 0..2 {
            let mut a: Vec<f32> = vv.column(j).iter().map(|x| x.abs()).collect();
            let mut b: Vec<f32> = out.column(j).iter().map(|x| x.abs()).collect();
            a.sort_by(|x, y| x.total_cmp(y));
            b.sort_by(|x, y| x.total_cmp(y));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn integers_in_strings() {
        assert_eq!(
            extract_int_from_str(&["cluster_12", "c3b4", "none"]),
            vec![12, 34, -1]
        );
    }

    #[test]
    fn duplicates_and_membership() {
        assert_eq!(get_duplicates(&[3, 1, 3, 2, 1, 3]), vec![3, 1]);
        assert_eq!(isin(&["a", "b", "c"], &["c", "a"]), vec![true, false, true]);
        assert_eq!(indices_to_bool(&[0, 2, 9], 4), vec![true, false, true, false]);
    }

    #[test]
    fn subsample_keeps_masked_cells() -> anyhow::Result<()> {
        let mut adata = AnnMatrix::from_layer(Layer::Dense(DMatrix::zeros(100, 2)));
        let mut rng = StdRng::seed_from_u64(3);
        let mask = random_subsample(&mut adata, 0.3, &mut rng)?;
        let kept = mask.iter().filter(|&&b| b).count();
        assert_eq!(adata.n_obs(), kept);
        assert!(kept > 10 && kept < 60);

        assert!(random_subsample(&mut adata, 1.5, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn extrapolation_drops_or_zeroes_non_finite() -> anyhow::Result<()> {
        let ms = DMatrix::from_row_slice(2, 2, &[1., 1., 2., 2.]);
        let vv = DMatrix::from_row_slice(2, 2, &[1., f32::NAN, -1., 1.]);
        let mut adata = AnnMatrix::from_layer(Layer::Dense(ms.clone()));
        adata.set_layer("Ms", Layer::Dense(ms))?;
        adata.set_layer("velocity", Layer::Dense(vv))?;

        let st = get_extrapolated_state(&adata, "velocity", 0.5, false, true)?;
        assert_eq!(st.shape(), (2, 1));
        assert_abs_diff_eq!(st[(1, 0)], 1.5);

        let st = get_extrapolated_state(&adata, "velocity", 0.5, false, false)?;
        assert_eq!(st.shape(), (2, 2));
        assert_abs_diff_eq!(st[(0, 1)], 1.);
        Ok(())
    }

    #[test]
    fn plasticity_is_scaled() -> anyhow::Result<()> {
        let ms = DMatrix::from_row_slice(3, 2, &[1., 0., 2., 4., 4., 2.]);
        let mut adata = AnnMatrix::from_layer(Layer::Dense(ms.clone()));
        adata.set_layer("Ms", Layer::Dense(ms))?;
        adata.set_attr(Axis::Var, "gene_count_corr", Column::Float(vec![0.5, 0.1]))?;
        let score = get_plasticity_score(&adata, "Ms")?;
        // row means of [0.25, 0], [0.5, 1], [1, 0.5]
        assert_abs_diff_eq!(score[0], 0.);
        assert_abs_diff_eq!(score[1], 1.);
        assert_abs_diff_eq!(score[2], 1.);
        Ok(())
    }

    #[test]
    fn randomized_velocity_gets_its_own_graphs() -> anyhow::Result<()> {
        let mut adata = moving_line(6)?;
        let umap = adata.layer("Ms")?.to_dense();
        adata.set_obsm("X_umap", umap)?;

        let mut rng = StdRng::seed_from_u64(11);
        randomized_velocity(&mut adata, "velocity", "velocity_rnd", &mut rng)?;

        assert!(adata.graph("velocity_rnd_graph").is_ok());
        assert!(adata.graph("velocity_rnd_graph_neg").is_ok());
        assert_eq!(adata.obsm("velocity_rnd_umap")?.shape(), (6, 2));

        let rnd = adata.layer("velocity_rnd")?.to_dense();
        let magnitude: f32 = rnd.column(0).iter().map(|x| x.abs()).sum();
        assert_abs_diff_eq!(magnitude, 5.);
        assert!(rnd.column(1).iter().all(|&x| x == 0.));
        Ok(())
    }

    #[test]
    fn small_velocities_are_zeroed_and_regraphed() -> anyhow::Result<()> {
        let mut adata = moving_line(6)?;
        cutoff_small_velocities(&mut adata, "velocity", "velocity_cut", 0.5, false)?;

        // abundance 2i/5 against half its 98th percentile, 0.98
        let cut = adata.layer("velocity_cut")?.to_dense();
        let vv = adata.layer("velocity")?.to_dense();
        for i in 0..3 {
            assert_eq!(cut[(i, 0)], 0.);
        }
        for i in 3..6 {
            assert_eq!(cut[(i, 0)], vv[(i, 0)]);
        }

        let graph = adata.graph("velocity_cut_graph")?;
        assert!((0..3).all(|i| graph.row(i).nnz() == 0));
        assert!(graph.row(3).nnz() > 0);
        Ok(())
    }

    #[test]
    fn failed_cutoff_keeps_the_container() -> anyhow::Result<()> {
        let mut adata = moving_line(5)?;
        adata.set_attr(Axis::Var, "velocity_genes", Column::Bool(vec![false, false]))?;
        let res = cutoff_small_velocities(&mut adata, "velocity", "velocity_cut", 0.5, false);
        assert!(res.is_err());
        assert!(!adata.has_layer("velocity_cut"));
        Ok(())
    }

    #[test]
    fn convolution_averages_neighbourhoods() -> anyhow::Result<()> {
        let mut adata = AnnMatrix::from_layer(Layer::Dense(DMatrix::zeros(3, 1)));
        let conn = CsrMatrix::<f32>::from_nonzero_triplets(
            3,
            3,
            vec![(0_usize, 1_usize, 1.), (1, 0, 1.), (1, 2, 1.), (2, 1, 1.)],
        )?;
        adata.set_graph("connectivities", conn)?;

        // self loops added: {0, 1}, {0, 1, 2}, {1, 2}
        let x = DMatrix::from_row_slice(3, 2, &[1., f32::NAN, 2., 1., 4., 1.]);
        let out = convolve(&adata, &x)?;
        assert_abs_diff_eq!(out[(0, 0)], 1.5);
        assert_abs_diff_eq!(out[(1, 0)], 7. / 3., epsilon = 1e-6);
        assert_abs_diff_eq!(out[(2, 0)], 3.);
        assert!(out.column(1).iter().all(|x| x.is_nan()));
        Ok(())
    }
}
