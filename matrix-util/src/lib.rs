pub mod common_io; // gz-aware line readers and writers
pub mod connectivity; // fuzzy (UMAP-style) kernel on kNN distances
pub mod dmatrix_io; // delimited text io for dense matrices
pub mod dmatrix_rsvd; // randomized SVD
pub mod dmatrix_util; // sampling and column scaling
pub mod geometric; // C + C^2 + ... + C^n
pub mod knn; // exact k-nearest neighbour distances
pub mod mtx_io; // MatrixMarket triplets
pub mod ndarray_stat; // running sufficient statistics
pub mod neighbors; // neighbour pruning and multi-hop closure
pub mod sparse_util; // CSR helpers
pub mod traits;
pub mod utils;
