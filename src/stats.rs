//! Mean and standard deviation of pairwise sample distances within and
//! between collection sites.

use crate::error::{AppError, Result};
use crate::matrix::DistanceMatrix;
use crate::meta::SiteMap;
use rayon::prelude::*;

/// Display name of the aggregate "distance to all other sites" column.
pub const BETWEEN_ALL: &str = "between_all";

/// Square site-by-site distance summary plus the aggregate column.
///
/// Rows are indexed by site; columns are the sites in the same order followed
/// by [`BETWEEN_ALL`]. Each cell holds the mean (and population standard
/// deviation) of the underlying pairwise sample distances.
#[derive(Debug, Clone)]
pub struct SiteStats {
    /// Site display names, row order.
    pub names: Vec<String>,
    /// names.len() x (names.len() + 1) means.
    pub mean: Vec<Vec<f64>>,
    /// Same shape, population standard deviations.
    pub stdev: Vec<Vec<f64>>,
}

impl SiteStats {
    pub fn n_sites(&self) -> usize {
        self.names.len()
    }

    /// Column names: the sites in row order plus the aggregate column.
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = self.names.clone();
        columns.push(BETWEEN_ALL.to_string());
        columns
    }
}

/// Compute the per-site distance summary.
///
/// Within-site cells average over all unordered sample pairs (combinations,
/// each pair once); between-site cells over the full cross product; the
/// aggregate column over site x complement. A site with a single sample has
/// no within-site pairs and fails explicitly.
pub fn site_distance_stats(dist: &DistanceMatrix, sites: &SiteMap) -> Result<SiteStats> {
    let names: Vec<String> = sites.sites.iter().map(|s| s.name.clone()).collect();

    let rows: Vec<(Vec<f64>, Vec<f64>)> = sites
        .sites
        .par_iter()
        .map(|site_self| -> Result<(Vec<f64>, Vec<f64>)> {
            let mut mean_row = Vec::with_capacity(sites.sites.len() + 1);
            let mut stdev_row = Vec::with_capacity(sites.sites.len() + 1);
            for site_compare in &sites.sites {
                let distances = if site_self.key == site_compare.key {
                    within_site_distances(dist, &site_self.samples)?
                } else {
                    cross_distances(dist, &site_self.samples, &site_compare.samples)?
                };
                if distances.is_empty() {
                    return Err(AppError::SingletonSite(site_self.name.clone()));
                }
                mean_row.push(mean(&distances));
                stdev_row.push(population_stdev(&distances));
            }

            let others = sites.complement(site_self);
            if others.is_empty() {
                return Err(AppError::NoComplement(site_self.name.clone()));
            }
            let mut distances = Vec::with_capacity(site_self.samples.len() * others.len());
            for s in &site_self.samples {
                for o in &others {
                    distances.push(dist.get(s, o)?);
                }
            }
            mean_row.push(mean(&distances));
            stdev_row.push(population_stdev(&distances));
            Ok((mean_row, stdev_row))
        })
        .collect::<Result<_>>()?;

    let (mean, stdev) = rows.into_iter().unzip();
    Ok(SiteStats { names, mean, stdev })
}

/// Distances over all unordered pairs within one site.
fn within_site_distances(dist: &DistanceMatrix, samples: &[String]) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(samples.len().saturating_sub(1) * samples.len() / 2);
    for (i, a) in samples.iter().enumerate() {
        for b in &samples[i + 1..] {
            out.push(dist.get(a, b)?);
        }
    }
    Ok(out)
}

/// Distances over the full cross product of two sample groups.
fn cross_distances(dist: &DistanceMatrix, a: &[String], b: &[String]) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(a.len() * b.len());
    for s_in in a {
        for s_out in b {
            out.push(dist.get(s_in, s_out)?);
        }
    }
    Ok(out)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0).
fn population_stdev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{SampleRecord, SiteMap};
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn matrix_from(labels: &[&str], cells: &[&[f64]]) -> DistanceMatrix {
        let mut file = NamedTempFile::new().unwrap();
        for (i, label) in labels.iter().enumerate() {
            write!(file, "{}\t{}", label, i + 100).unwrap();
            for v in cells[i] {
                write!(file, "\t{}", v).unwrap();
            }
            writeln!(file).unwrap();
        }
        file.flush().unwrap();
        DistanceMatrix::load(file.path()).unwrap()
    }

    fn two_site_map(site_a: &[&str], site_b: &[&str]) -> SiteMap {
        let mut records = Vec::new();
        for s in site_a {
            records.push(SampleRecord {
                sample: s.to_string(),
                latitude: 28.0,
                location: "28.0,34.0".to_string(),
            });
        }
        for s in site_b {
            records.push(SampleRecord {
                sample: s.to_string(),
                latitude: 18.0,
                location: "18.0,41.0".to_string(),
            });
        }
        SiteMap::assign(&records, &["A".to_string(), "B".to_string()]).unwrap()
    }

    /// Hand-computed 4-sample fixture: s1,s2 in site A; s3,s4 in site B.
    fn fixture() -> (DistanceMatrix, SiteMap) {
        let dist = matrix_from(
            &["s1", "s2", "s3", "s4"],
            &[
                &[0.0, 0.2, 0.5, 0.7],
                &[0.2, 0.0, 0.4, 0.6],
                &[0.5, 0.4, 0.0, 0.1],
                &[0.7, 0.6, 0.1, 0.0],
            ],
        );
        (dist, two_site_map(&["s1", "s2"], &["s3", "s4"]))
    }

    #[test]
    fn matches_hand_computed_values() {
        let (dist, sites) = fixture();
        let stats = site_distance_stats(&dist, &sites).unwrap();
        assert_eq!(stats.names, vec!["A", "B"]);
        assert_eq!(stats.n_sites(), 2);
        assert_eq!(stats.column_names(), vec!["A", "B", "between_all"]);

        // Within A: only pair (s1,s2) = 0.2. Within B: (s3,s4) = 0.1.
        assert_relative_eq!(stats.mean[0][0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(stats.stdev[0][0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(stats.mean[1][1], 0.1, epsilon = 1e-12);

        // A x B = {0.5, 0.7, 0.4, 0.6}: mean 0.55, population stdev
        // sqrt(((0.05)^2 + (0.15)^2 + (0.15)^2 + (0.05)^2) / 4).
        let expected_std = (0.0125f64).sqrt();
        assert_relative_eq!(stats.mean[0][1], 0.55, epsilon = 1e-12);
        assert_relative_eq!(stats.stdev[0][1], expected_std, epsilon = 1e-12);
        assert_relative_eq!(stats.mean[1][0], 0.55, epsilon = 1e-12);

        // between_all of A is A x complement(A) = A x B here.
        assert_relative_eq!(stats.mean[0][2], 0.55, epsilon = 1e-12);
        assert_relative_eq!(stats.stdev[0][2], expected_std, epsilon = 1e-12);
        assert_relative_eq!(stats.mean[1][2], 0.55, epsilon = 1e-12);
    }

    #[test]
    fn within_group_mean_is_relabel_invariant() {
        let (dist, _) = fixture();
        let forward = two_site_map(&["s1", "s2"], &["s3", "s4"]);
        let swapped = two_site_map(&["s2", "s1"], &["s4", "s3"]);
        let a = site_distance_stats(&dist, &forward).unwrap();
        let b = site_distance_stats(&dist, &swapped).unwrap();
        for i in 0..2 {
            for j in 0..3 {
                assert_relative_eq!(a.mean[i][j], b.mean[i][j], epsilon = 1e-12);
                assert_relative_eq!(a.stdev[i][j], b.stdev[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn between_all_matches_brute_force() {
        let (dist, sites) = fixture();
        let stats = site_distance_stats(&dist, &sites).unwrap();

        // Brute-force double loop over A x complement(A).
        let a = &sites.sites[0];
        let mut total = 0.0;
        let mut count = 0;
        for s in &a.samples {
            for o in sites.complement(a) {
                total += dist.get(s, o).unwrap();
                count += 1;
            }
        }
        assert_relative_eq!(stats.mean[0][2], total / count as f64, epsilon = 1e-12);
    }

    #[test]
    fn singleton_site_fails_explicitly() {
        let dist = matrix_from(
            &["s1", "s2", "s3"],
            &[
                &[0.0, 0.2, 0.5],
                &[0.2, 0.0, 0.4],
                &[0.5, 0.4, 0.0],
            ],
        );
        let sites = two_site_map(&["s1", "s2"], &["s3"]);
        let err = site_distance_stats(&dist, &sites).unwrap_err();
        assert!(matches!(err, AppError::SingletonSite(name) if name == "B"));
    }
}
