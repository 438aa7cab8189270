//! Ordination and site-distance statistics for microbial community
//! dissimilarity matrices.
//!
//! The pipeline loads a precomputed pairwise Bray-Curtis distance matrix,
//! sample metadata (collection latitude/longitude) and an ITS2 profile
//! abundance table, runs a principal coordinates analysis on the distance
//! matrix, summarises mean/stdev pairwise distances within and between
//! collection sites, and renders a three-panel figure (PC1xPC2, PC1xPC3,
//! site-distance heatmap) to PNG and SVG.

pub mod error;
pub mod matrix;
pub mod meta;
pub mod pcoa;
pub mod plot;
pub mod stats;
