use anno_data::{AnnError, AnnotatedData, Axis, Categorical, Column};
use fnv::FnvHashMap as HashMap;
use log::info;

/// Turn label-like attributes into categoricals when they have more
/// than one and fewer than `min(n, 100)` distinct values: string,
/// integer and boolean columns of obs, string columns of var.
pub fn strings_to_categoricals<A>(adata: &mut A) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    for axis in [Axis::Obs, Axis::Var] {
        for key in adata.attr_keys(axis) {
            let column = adata.attr(axis, &key)?;
            let convertible = match (axis, column) {
                (_, Column::Str(_)) => true,
                (Axis::Obs, Column::Int(_) | Column::Bool(_)) => true,
                _ => false,
            };
            if !convertible {
                continue;
            }

            let cat = Categorical::from_labels(&column.labels());
            let ncat = cat.categories().len();
            if 1 < ncat && ncat < cat.len().min(100) {
                adata.set_attr(axis, &key, Column::Categorical(cat))?;
                info!("{} attribute {} has {} categories", axis, key, ncat);
            }
        }
    }
    Ok(())
}

/// The categorical view of an obs attribute
fn obs_categorical<A>(adata: &A, key: &str) -> anyhow::Result<Categorical>
where
    A: AnnotatedData + ?Sized,
{
    let column = adata.attr(Axis::Obs, key)?;
    Ok(match column.as_categorical() {
        Some(cat) => cat.clone(),
        None => Categorical::from_labels(&column.labels()),
    })
}

fn colors_of(value: &serde_json::Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|c| c.as_str().map(str::to_string))
        .collect()
}

/// Merge the categories of the obs attribute `key` into coarser groups.
///
/// * `map_groups` - each new group with the old categories it absorbs;
///   categories not listed keep their own name
/// * `key_added` - obs key of the result (`<key>_coarse` by default)
/// * `map_colors` - colors of the new groups; groups without one keep
///   the color of the old category of the same name. Without it, each
///   new group takes the color of its largest old category.
///
/// Colors are read from and written to the unstructured store under
/// `<key>_colors` and `<key_added>_colors`.
pub fn merge_groups<A>(
    adata: &mut A,
    key: &str,
    map_groups: &[(&str, Vec<&str>)],
    key_added: Option<&str>,
    map_colors: Option<&HashMap<&str, &str>>,
) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    strings_to_categoricals(adata)?;
    let old = obs_categorical(adata, key)?;

    let coarse: Vec<Box<str>> = old
        .categories()
        .iter()
        .map(|c| {
            map_groups
                .iter()
                .find(|(_, members)| members.iter().any(|m| *m == c.as_ref()))
                .map(|(group, _)| (*group).into())
                .unwrap_or_else(|| c.clone())
        })
        .collect();

    let labels: Vec<&str> = old.codes().iter().map(|&k| coarse[k].as_ref()).collect();
    let new = Categorical::from_labels(&labels);

    let key_added = key_added
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_coarse", key));
    adata.set_attr(Axis::Obs, &key_added, Column::Categorical(new.clone()))?;
    info!(
        "merged {} categories of {} into {}",
        old.categories().len(),
        key,
        new.categories().len()
    );

    let old_colors = adata
        .uns(&format!("{}_colors", key))
        .ok()
        .and_then(colors_of);

    let new_colors: Option<Vec<String>> = match (map_colors, old_colors) {
        (Some(map_colors), old_colors) => Some(
            new.categories()
                .iter()
                .map(|group| {
                    if let Some(&c) = map_colors.get(group.as_ref()) {
                        return Ok(c.to_string());
                    }
                    old.category_index(group)
                        .and_then(|k| old_colors.as_ref().and_then(|oc| oc.get(k).cloned()))
                        .ok_or(AnnError::InvalidConfig(format!("no color for {}", group)))
                })
                .collect::<Result<_, _>>()?,
        ),
        (None, Some(old_colors)) => {
            let counts = old.counts();
            Some(
                new.categories()
                    .iter()
                    .map(|group| {
                        // largest old category of the group, lowest index on ties
                        let largest = (0..coarse.len())
                            .filter(|&k| coarse[k] == *group)
                            .fold(None, |best: Option<usize>, k| match best {
                                Some(b) if counts[b] >= counts[k] => Some(b),
                                _ => Some(k),
                            });
                        largest
                            .and_then(|k| old_colors.get(k).cloned())
                            .ok_or(AnnError::InvalidConfig(format!("no color for {}", group)))
                    })
                    .collect::<Result<_, _>>()?,
            )
        }
        (None, None) => None,
    };

    if let Some(colors) = new_colors {
        adata.set_uns(&format!("{}_colors", key_added), serde_json::json!(colors));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anno_data::{AnnMatrix, Layer};
    use nalgebra::DMatrix;

    fn clustered() -> anyhow::Result<AnnMatrix> {
        let mut adata = AnnMatrix::from_layer(Layer::Dense(DMatrix::zeros(6, 1)));
        let labels = ["a", "b", "b", "c", "c", "c"];
        adata.set_attr(
            Axis::Obs,
            "clusters",
            Column::Str(labels.iter().map(|&s| s.into()).collect()),
        )?;
        adata.set_uns("clusters_colors", serde_json::json!(["red", "green", "blue"]));
        Ok(adata)
    }

    #[test]
    fn labels_become_categories() -> anyhow::Result<()> {
        let mut adata = clustered()?;
        adata.set_attr(Axis::Obs, "batch", Column::Int(vec![1, 1, 1, 1, 1, 1]))?;
        adata.set_attr(Axis::Obs, "id", Column::Int(vec![0, 1, 2, 3, 4, 5]))?;
        strings_to_categoricals(&mut adata)?;

        let cat = adata.attr(Axis::Obs, "clusters")?.as_categorical().cloned();
        assert_eq!(cat.map(|c| c.counts()), Some(vec![1, 2, 3]));
        // a single category, or as many as cells, stays as it is
        assert!(matches!(adata.attr(Axis::Obs, "batch")?, Column::Int(_)));
        assert!(matches!(adata.attr(Axis::Obs, "id")?, Column::Int(_)));
        Ok(())
    }

    #[test]
    fn groups_merge_with_colors_of_largest_member() -> anyhow::Result<()> {
        let mut adata = clustered()?;
        merge_groups(&mut adata, "clusters", &[("bc", vec!["b", "c"])], None, None)?;

        let merged = adata.attr(Axis::Obs, "clusters_coarse")?;
        let labels: Vec<String> = merged.labels().iter().map(|s| s.to_string()).collect();
        assert_eq!(labels, ["a", "bc", "bc", "bc", "bc", "bc"]);
        assert_eq!(
            adata.uns("clusters_coarse_colors")?,
            &serde_json::json!(["red", "blue"])
        );
        Ok(())
    }

    #[test]
    fn explicit_colors_and_missing_ones() -> anyhow::Result<()> {
        let mut adata = clustered()?;
        let mut colors = HashMap::default();
        colors.insert("bc", "black");
        merge_groups(
            &mut adata,
            "clusters",
            &[("bc", vec!["b", "c"])],
            Some("coarse"),
            Some(&colors),
        )?;
        assert_eq!(
            adata.uns("coarse_colors")?,
            &serde_json::json!(["red", "black"])
        );

        adata.remove_uns("clusters_colors");
        assert!(merge_groups(
            &mut adata,
            "clusters",
            &[("bc", vec!["b", "c"])],
            Some("coarse"),
            Some(&colors),
        )
        .is_err());
        Ok(())
    }
}
