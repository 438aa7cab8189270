use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Symmetric pairwise dissimilarity matrix keyed by sample name on both axes.
///
/// The on-disk format is one line per sample:
/// `sample_name <TAB> sample_uid <TAB> d0 <TAB> d1 ...`
/// where the row order also defines the column order. Values are assumed
/// pre-transformed (e.g. square-root Bray-Curtis); no transformation is
/// applied here.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    /// Row-major n*n values.
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Load a distance matrix from a tab-separated `.dist` file.
    ///
    /// Fails if any row has a different number of distance columns than there
    /// are rows, or if a value does not parse as a float.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let file = File::open(&path)?;
        let reader = BufReader::new(file);

        let mut labels: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.trim_end().split('\t').collect();
            if fields.len() < 3 {
                return Err(AppError::Parse {
                    path: path_str,
                    line: line_no + 1,
                    message: format!(
                        "expected sample name, sample uid and distances, got {} fields",
                        fields.len()
                    ),
                });
            }
            labels.push(fields[0].to_string());
            // fields[1] is the sequencing UID, not used beyond the file format.
            let mut row = Vec::with_capacity(fields.len() - 2);
            for value in &fields[2..] {
                let parsed = value.parse::<f64>().map_err(|e| AppError::Parse {
                    path: path_str.clone(),
                    line: line_no + 1,
                    message: format!("invalid distance '{}': {}", value, e),
                })?;
                row.push(parsed);
            }
            rows.push(row);
        }

        let n = labels.len();
        if n == 0 {
            return Err(AppError::MatrixShape(format!("{} is empty", path_str)));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(AppError::MatrixShape(format!(
                    "row '{}' has {} distance columns for {} samples",
                    labels[i],
                    row.len(),
                    n
                )));
            }
        }

        let mut values = Vec::with_capacity(n * n);
        for row in rows {
            values.extend(row);
        }
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Ok(Self {
            labels,
            index,
            values,
        })
    }

    /// Remove the given samples from both axes.
    ///
    /// Every name in `drop` must be present; a stale exclusion list is a
    /// sample-set mismatch and fails rather than being silently ignored.
    pub fn drop_samples(&self, drop: &[String]) -> Result<Self> {
        for name in drop {
            if !self.index.contains_key(name) {
                return Err(AppError::UnknownSample(name.clone()));
            }
        }

        let keep: Vec<usize> = (0..self.labels.len())
            .filter(|&i| !drop.iter().any(|d| d == &self.labels[i]))
            .collect();
        let labels: Vec<String> = keep.iter().map(|&i| self.labels[i].clone()).collect();
        let n_old = self.labels.len();
        let mut values = Vec::with_capacity(keep.len() * keep.len());
        for &i in &keep {
            for &j in &keep {
                values.push(self.values[i * n_old + j]);
            }
        }
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Ok(Self {
            labels,
            index,
            values,
        })
    }

    /// Number of samples.
    pub fn n(&self) -> usize {
        self.labels.len()
    }

    /// Sample names in row (== column) order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, sample: &str) -> bool {
        self.index.contains_key(sample)
    }

    /// Distance between two samples by name.
    pub fn get(&self, a: &str, b: &str) -> Result<f64> {
        let i = *self
            .index
            .get(a)
            .ok_or_else(|| AppError::UnknownSample(a.to_string()))?;
        let j = *self
            .index
            .get(b)
            .ok_or_else(|| AppError::UnknownSample(b.to_string()))?;
        Ok(self.values[i * self.labels.len() + j])
    }

    /// Distance between two samples by row/column index.
    pub fn get_by_index(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.labels.len() + j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_dist(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_square_matrix() {
        let file = write_dist(
            "s1\t101\t0.0\t0.3\t0.5\n\
             s2\t102\t0.3\t0.0\t0.4\n\
             s3\t103\t0.5\t0.4\t0.0\n",
        );
        let dist = DistanceMatrix::load(file.path()).unwrap();
        assert_eq!(dist.n(), 3);
        assert_eq!(dist.labels(), &["s1", "s2", "s3"]);
        assert_eq!(dist.get("s1", "s3").unwrap(), 0.5);
        assert_eq!(dist.get("s3", "s2").unwrap(), 0.4);
        assert_eq!(dist.get_by_index(1, 1), 0.0);
    }

    #[test]
    fn rejects_ragged_rows() {
        let file = write_dist(
            "s1\t101\t0.0\t0.3\n\
             s2\t102\t0.3\t0.0\t0.9\n",
        );
        let err = DistanceMatrix::load(file.path()).unwrap_err();
        assert!(matches!(err, AppError::MatrixShape(_)));
    }

    #[test]
    fn rejects_non_numeric_value() {
        let file = write_dist("s1\t101\t0.0\tabc\ns2\t102\t0.3\t0.0\n");
        let err = DistanceMatrix::load(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }

    #[test]
    fn drop_removes_both_axes() {
        let file = write_dist(
            "s1\t101\t0.0\t0.3\t0.5\n\
             neg\t102\t0.3\t0.0\t0.4\n\
             s3\t103\t0.5\t0.4\t0.0\n",
        );
        let dist = DistanceMatrix::load(file.path()).unwrap();
        let dist = dist.drop_samples(&["neg".to_string()]).unwrap();
        assert_eq!(dist.labels(), &["s1", "s3"]);
        assert!(!dist.contains("neg"));
        // Row and column label sets stay equal and the kept value survives.
        assert_eq!(dist.get("s1", "s3").unwrap(), 0.5);
        assert_eq!(dist.get("s3", "s1").unwrap(), 0.5);
    }

    #[test]
    fn drop_of_unknown_sample_fails() {
        let file = write_dist("s1\t101\t0.0\t0.3\ns2\t102\t0.3\t0.0\n");
        let dist = DistanceMatrix::load(file.path()).unwrap();
        let err = dist.drop_samples(&["ghost".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::UnknownSample(_)));
    }
}
