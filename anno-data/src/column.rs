use fnv::FnvHashMap as HashMap;

/// Codes into a sorted list of category labels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Categorical {
    codes: Vec<usize>,
    categories: Vec<Box<str>>,
}

impl Categorical {
    /// Categories are the sorted distinct labels
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut categories: Vec<Box<str>> = labels.iter().map(|s| s.as_ref().into()).collect();
        categories.sort();
        categories.dedup();
        Self::with_categories(labels, categories)
    }

    /// Codes against a given category order; labels missing from
    /// `categories` are appended in first-seen order
    pub fn with_categories<S: AsRef<str>>(labels: &[S], mut categories: Vec<Box<str>>) -> Self {
        let mut lookup: HashMap<Box<str>, usize> = categories
            .iter()
            .enumerate()
            .map(|(k, c)| (c.clone(), k))
            .collect();

        let codes = labels
            .iter()
            .map(|s| {
                let s = s.as_ref();
                match lookup.get(s) {
                    Some(&k) => k,
                    None => {
                        let k = categories.len();
                        categories.push(s.into());
                        lookup.insert(s.into(), k);
                        k
                    }
                }
            })
            .collect();

        Self { codes, categories }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn categories(&self) -> &[Box<str>] {
        &self.categories
    }

    pub fn label(&self, i: usize) -> &str {
        &self.categories[self.codes[i]]
    }

    pub fn labels(&self) -> Vec<Box<str>> {
        self.codes.iter().map(|&k| self.categories[k].clone()).collect()
    }

    /// Position of `label` among the categories
    pub fn category_index(&self, label: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.as_ref() == label)
    }

    /// Number of elements per category
    pub fn counts(&self) -> Vec<usize> {
        let mut ret = vec![0; self.categories.len()];
        for &k in &self.codes {
            ret[k] += 1;
        }
        ret
    }

    fn select(&self, idx: &[usize]) -> Self {
        Self {
            codes: idx.iter().map(|&i| self.codes[i]).collect(),
            categories: self.categories.clone(),
        }
    }
}

/// A per-cell or per-gene attribute
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Float(Vec<f32>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<Box<str>>),
    Categorical(Categorical),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Categorical(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Bool(_) => "bool",
            Column::Str(_) => "str",
            Column::Categorical(_) => "categorical",
        }
    }

    /// Keep the elements at `idx` (in that order)
    pub fn select(&self, idx: &[usize]) -> Column {
        fn pick<T: Clone>(v: &[T], idx: &[usize]) -> Vec<T> {
            idx.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            Column::Float(v) => Column::Float(pick(v, idx)),
            Column::Int(v) => Column::Int(pick(v, idx)),
            Column::Bool(v) => Column::Bool(pick(v, idx)),
            Column::Str(v) => Column::Str(pick(v, idx)),
            Column::Categorical(c) => Column::Categorical(c.select(idx)),
        }
    }

    /// Numeric view of float, int and bool columns
    pub fn to_f32(&self) -> Option<Vec<f32>> {
        match self {
            Column::Float(v) => Some(v.clone()),
            Column::Int(v) => Some(v.iter().map(|&x| x as f32).collect()),
            Column::Bool(v) => Some(v.iter().map(|&x| if x { 1. } else { 0. }).collect()),
            _ => None,
        }
    }

    /// Every element rendered as a label
    pub fn labels(&self) -> Vec<Box<str>> {
        match self {
            Column::Float(v) => v.iter().map(|x| x.to_string().into()).collect(),
            Column::Int(v) => v.iter().map(|x| x.to_string().into()).collect(),
            Column::Bool(v) => v.iter().map(|x| x.to_string().into()).collect(),
            Column::Str(v) => v.clone(),
            Column::Categorical(c) => c.labels(),
        }
    }

    pub fn as_categorical(&self) -> Option<&Categorical> {
        match self {
            Column::Categorical(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match self {
            Column::Bool(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_sorted_and_coded() {
        let c = Categorical::from_labels(&["b", "a", "b", "c"]);
        assert_eq!(c.categories(), &["a".into(), "b".into(), "c".into()] as &[Box<str>]);
        assert_eq!(c.codes(), &[1, 0, 1, 2]);
        assert_eq!(c.label(3), "c");
        assert_eq!(c.counts(), vec![1, 2, 1]);
        assert_eq!(c.category_index("b"), Some(1));
    }

    #[test]
    fn unknown_labels_are_appended() {
        let c = Categorical::with_categories(&["x", "y", "x"], vec!["y".into()]);
        assert_eq!(c.categories().len(), 2);
        assert_eq!(c.codes(), &[1, 0, 1]);
    }

    #[test]
    fn selection_keeps_categories() {
        let col = Column::Categorical(Categorical::from_labels(&["b", "a", "c"]));
        let sub = col.select(&[2, 2]);
        assert_eq!(sub.len(), 2);
        let c = sub.as_categorical().unwrap();
        assert_eq!(c.categories().len(), 3);
        assert_eq!(sub.labels(), vec!["c".into(), "c".into()] as Vec<Box<str>>);

        let ints = Column::Int(vec![3, 4, 5]).select(&[0, 2]);
        assert_eq!(ints.to_f32(), Some(vec![3., 5.]));
    }
}
