//! End-to-end pipeline test on synthetic SymPortal-style input files:
//! distance matrix -> exclusion -> site assignment -> PCoA and group
//! statistics, with hand-computed expectations.

use approx::assert_relative_eq;
use ordifig::matrix::DistanceMatrix;
use ordifig::meta::{load_highlight_samples, load_metadata, SiteMap};
use ordifig::pcoa::pcoa;
use ordifig::stats::site_distance_stats;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Six samples: s1,s2 plus the blank "neg" at a northern site, s3,s4 at a
/// southern site. Distances are chosen so group statistics are easy to
/// verify by hand once "neg" is dropped.
fn write_fixtures(dir: &TempDir) -> (PathBuf, PathBuf, PathBuf) {
    let dist_path = dir.path().join("samples.dist");
    let meta_path = dir.path().join("meta.txt");
    let profile_path = dir.path().join("profiles.txt");

    //          s1   s2   neg  s3   s4
    let dist = "\
s1\t101\t0.0\t0.2\t0.9\t0.5\t0.7
s2\t102\t0.2\t0.0\t0.9\t0.4\t0.6
neg\t103\t0.9\t0.9\t0.0\t0.9\t0.9
s3\t104\t0.5\t0.4\t0.9\t0.0\t0.1
s4\t105\t0.7\t0.6\t0.9\t0.1\t0.0
";
    fs::write(&dist_path, dist).unwrap();

    let meta = "\
sample_name\tcollection_latitude\tcollection_longitude
s3\t18.2\t41.4
s1\t28.5\t34.6
neg\t28.5\t34.6
s2\t28.5\t34.6
s4\t18.2\t41.4
seq_accessions\t\t
seq_annotations\t\t
study_info\t\t
";
    fs::write(&meta_path, meta).unwrap();

    let mut profile = String::new();
    for i in 0..6 {
        profile.push_str(&format!("preamble {}\n", i));
    }
    profile.push_str("uid\tsample\tA1\tC3\n");
    profile.push_str("1\ts1\t250\t0\n");
    profile.push_str("2\ts2\t0\t10\n");
    profile.push_str("3\ts3\t0\t0\n");
    profile.push_str("4\ts4\t12\t4\n");
    profile.push_str("footer\t\t\t\n");
    profile.push_str("footer\t\t\t\n");
    fs::write(&profile_path, profile).unwrap();

    (dist_path, meta_path, profile_path)
}

#[test]
fn pipeline_matches_hand_computed_statistics() {
    let dir = TempDir::new().unwrap();
    let (dist_path, meta_path, profile_path) = write_fixtures(&dir);
    let exclude = vec!["neg".to_string()];

    let dist = DistanceMatrix::load(&dist_path).unwrap();
    assert_eq!(dist.n(), 5);
    let dist = dist.drop_samples(&exclude).unwrap();
    assert_eq!(dist.labels(), &["s1", "s2", "s3", "s4"]);

    let records = load_metadata(&meta_path, &exclude).unwrap();
    // Descending latitude: the northern site first, original file order
    // within each site preserved by the stable sort.
    let order: Vec<&str> = records.iter().map(|r| r.sample.as_str()).collect();
    assert_eq!(order, vec!["s1", "s2", "s3", "s4"]);

    let names = vec!["North".to_string(), "South".to_string()];
    let sites = SiteMap::assign(&records, &names).unwrap();
    assert_eq!(sites.sites[0].samples, vec!["s1", "s2"]);
    assert_eq!(sites.sites[1].samples, vec!["s3", "s4"]);

    let stats = site_distance_stats(&dist, &sites).unwrap();
    // Within North: only (s1,s2) = 0.2. Within South: (s3,s4) = 0.1.
    assert_relative_eq!(stats.mean[0][0], 0.2, epsilon = 1e-12);
    assert_relative_eq!(stats.stdev[0][0], 0.0, epsilon = 1e-12);
    assert_relative_eq!(stats.mean[1][1], 0.1, epsilon = 1e-12);
    // North x South = {0.5, 0.7, 0.4, 0.6}.
    assert_relative_eq!(stats.mean[0][1], 0.55, epsilon = 1e-12);
    assert_relative_eq!(stats.stdev[0][1], 0.0125f64.sqrt(), epsilon = 1e-12);
    // With two sites the aggregate column equals the cross-site cell.
    assert_relative_eq!(stats.mean[0][2], stats.mean[0][1], epsilon = 1e-12);
    assert_relative_eq!(stats.mean[1][2], stats.mean[1][0], epsilon = 1e-12);
}

#[test]
fn pipeline_highlight_subset_follows_matrix_order() {
    let dir = TempDir::new().unwrap();
    let (dist_path, _, profile_path) = write_fixtures(&dir);
    let exclude = vec!["neg".to_string()];

    let dist = DistanceMatrix::load(&dist_path)
        .unwrap()
        .drop_samples(&exclude)
        .unwrap();
    let highlighted = load_highlight_samples(&profile_path, "A1").unwrap();
    assert_eq!(highlighted, vec!["s1", "s4"]);

    let in_matrix_order: Vec<String> = dist
        .labels()
        .iter()
        .filter(|l| highlighted.contains(*l))
        .cloned()
        .collect();
    assert_eq!(in_matrix_order, vec!["s1", "s4"]);
}

#[test]
fn pipeline_ordination_separates_the_sites() {
    let dir = TempDir::new().unwrap();
    let (dist_path, meta_path, _) = write_fixtures(&dir);
    let exclude = vec!["neg".to_string()];

    let dist = DistanceMatrix::load(&dist_path)
        .unwrap()
        .drop_samples(&exclude)
        .unwrap();
    let records = load_metadata(&meta_path, &exclude).unwrap();
    let names = vec!["North".to_string(), "South".to_string()];
    let sites = SiteMap::assign(&records, &names).unwrap();

    let ordination = pcoa(&dist, 3).unwrap();
    assert_eq!(ordination.n_axes(), 3);

    // PC1 should place the two within-site pairs on opposite sides: the
    // between-site distances dominate the within-site ones.
    let pc1 = |s: &str| ordination.coordinate(s, 0).unwrap();
    let north = &sites.sites[0].samples;
    let south = &sites.sites[1].samples;
    let north_mean = north.iter().map(|s| pc1(s)).sum::<f64>() / north.len() as f64;
    let south_mean = south.iter().map(|s| pc1(s)).sum::<f64>() / south.len() as f64;
    assert!(
        (north_mean - south_mean).abs() > 0.3,
        "sites not separated on PC1: {} vs {}",
        north_mean,
        south_mean
    );
}
