use crate::error::{AppError, Result};
use plotters::style::RGBColor;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Trailer rows appended below the data block of the SymPortal metadata table.
const META_FOOTER_ROWS: usize = 3;
/// Preamble rows above the header of the SymPortal profile table.
const PROFILE_PREAMBLE_ROWS: usize = 6;
/// Trailer rows below the data block of the profile table.
const PROFILE_FOOTER_ROWS: usize = 2;

/// Marker shapes used to differentiate sites, in addition to colour, for
/// colour-blind readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Circle,
    Square,
    Cross,
    TriangleUp,
    TriangleDown,
}

/// Marker palette, northernmost site last once reversed.
pub const SITE_MARKERS: [MarkerShape; 5] = [
    MarkerShape::Circle,
    MarkerShape::Square,
    MarkerShape::Cross,
    MarkerShape::TriangleUp,
    MarkerShape::TriangleDown,
];

/// First five colours of the matplotlib default property cycle.
pub const SITE_COLORS: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];

/// One metadata row: sample name plus its collection coordinates.
///
/// `location` is the literal `"{latitude},{longitude}"` join of the raw field
/// text and acts as the grouping key for sites.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub sample: String,
    pub latitude: f64,
    pub location: String,
}

/// Load the sample metadata table, drop excluded samples and sort the records
/// by descending collection latitude (stable, so ties keep file order).
///
/// The table is tab-separated with a header row naming `sample_name`,
/// `collection_latitude` and `collection_longitude`; the last three rows are a
/// SymPortal footer and are discarded. An exclusion name absent from the
/// table is an error, matching the fail-fast handling of the distance matrix.
pub fn load_metadata<P: AsRef<Path>>(path: P, exclude: &[String]) -> Result<Vec<SampleRecord>> {
    let path_str = path.as_ref().display().to_string();
    let file = File::open(&path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header = lines.next().ok_or_else(|| AppError::Parse {
        path: path_str.clone(),
        line: 1,
        message: "empty metadata file".to_string(),
    })??;
    let columns: Vec<&str> = header.trim_end().split('\t').collect();
    let sample_col = find_column(&columns, "sample_name", &path_str)?;
    let lat_col = find_column(&columns, "collection_latitude", &path_str)?;
    let lon_col = find_column(&columns, "collection_longitude", &path_str)?;

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (line_no, line_result) in lines.enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = line
            .trim_end()
            .split('\t')
            .map(|s| s.to_string())
            .collect();
        rows.push((line_no + 2, fields));
    }
    if rows.len() <= META_FOOTER_ROWS {
        return Err(AppError::Parse {
            path: path_str,
            line: rows.len() + 1,
            message: format!(
                "expected at least {} rows plus data, got {}",
                META_FOOTER_ROWS,
                rows.len()
            ),
        });
    }
    rows.truncate(rows.len() - META_FOOTER_ROWS);

    let needed = sample_col.max(lat_col).max(lon_col);
    let mut records = Vec::with_capacity(rows.len());
    for (line_no, fields) in rows {
        if fields.len() <= needed {
            return Err(AppError::Parse {
                path: path_str.clone(),
                line: line_no,
                message: format!("expected at least {} fields, got {}", needed + 1, fields.len()),
            });
        }
        let sample = fields[sample_col].clone();
        let lat_raw = &fields[lat_col];
        let lon_raw = &fields[lon_col];
        let latitude = lat_raw.parse::<f64>().map_err(|e| AppError::Parse {
            path: path_str.clone(),
            line: line_no,
            message: format!("invalid latitude '{}': {}", lat_raw, e),
        })?;
        records.push(SampleRecord {
            sample,
            latitude,
            location: format!("{},{}", lat_raw, lon_raw),
        });
    }

    for name in exclude {
        if !records.iter().any(|r| &r.sample == name) {
            return Err(AppError::UnknownSample(name.clone()));
        }
    }
    records.retain(|r| !exclude.iter().any(|d| d == &r.sample));

    records.sort_by(|a, b| b.latitude.total_cmp(&a.latitude));
    Ok(records)
}

/// Load the profile abundance table and return the samples with a nonzero
/// count in the designated profile column.
///
/// The table carries six preamble rows above the header, the sample name in
/// the second column, and two footer rows below the data block. Counts are
/// parsed as floats and truncated to integers, matching the upstream export.
pub fn load_highlight_samples<P: AsRef<Path>>(path: P, profile: &str) -> Result<Vec<String>> {
    let path_str = path.as_ref().display().to_string();
    let file = File::open(&path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines().enumerate();

    // Skip the preamble; the next line is the header.
    let mut header = None;
    for _ in 0..=PROFILE_PREAMBLE_ROWS {
        header = lines.next();
    }
    let (_, header_line) = header.ok_or_else(|| AppError::Parse {
        path: path_str.clone(),
        line: PROFILE_PREAMBLE_ROWS + 1,
        message: "profile table ends before the header row".to_string(),
    })?;
    let header_line = header_line?;
    let columns: Vec<&str> = header_line.trim_end().split('\t').collect();
    let profile_col = columns
        .iter()
        .position(|c| *c == profile)
        .ok_or_else(|| AppError::MissingColumn {
            path: path_str.clone(),
            column: profile.to_string(),
        })?;

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (line_no, line_result) in lines {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = line
            .trim_end()
            .split('\t')
            .map(|s| s.to_string())
            .collect();
        rows.push((line_no + 1, fields));
    }
    if rows.len() <= PROFILE_FOOTER_ROWS {
        return Err(AppError::Parse {
            path: path_str,
            line: 0,
            message: "profile table has no data rows".to_string(),
        });
    }
    rows.truncate(rows.len() - PROFILE_FOOTER_ROWS);

    let mut highlighted = Vec::new();
    for (line_no, fields) in rows {
        if fields.len() <= profile_col.max(1) {
            return Err(AppError::Parse {
                path: path_str.clone(),
                line: line_no,
                message: format!(
                    "expected at least {} fields, got {}",
                    profile_col.max(1) + 1,
                    fields.len()
                ),
            });
        }
        // Column 0 is the sequencing UID; column 1 is the sample name.
        let raw = &fields[profile_col];
        let count = raw.parse::<f64>().map_err(|e| AppError::Parse {
            path: path_str.clone(),
            line: line_no,
            message: format!("invalid abundance '{}': {}", raw, e),
        })? as i64;
        if count != 0 {
            highlighted.push(fields[1].clone());
        }
    }
    Ok(highlighted)
}

/// One collection site: its location key, display name, figure styling and
/// member samples in metadata order.
#[derive(Debug, Clone)]
pub struct Site {
    pub key: String,
    pub name: String,
    pub color: RGBColor,
    pub marker: MarkerShape,
    pub samples: Vec<String>,
}

/// Ordered site grouping, northernmost first.
#[derive(Debug, Clone)]
pub struct SiteMap {
    pub sites: Vec<Site>,
}

impl SiteMap {
    /// Group the (latitude-sorted) metadata records by location key and
    /// assign display names and figure styling positionally.
    ///
    /// The unique location count must equal the site-name count; a mismatch
    /// fails loudly instead of silently truncating the zip. Markers and
    /// colours come from fixed palettes sized to the name list and consumed
    /// in reverse order.
    pub fn assign(records: &[SampleRecord], site_names: &[String]) -> Result<Self> {
        let mut keys: Vec<String> = Vec::new();
        for record in records {
            if !keys.contains(&record.location) {
                keys.push(record.location.clone());
            }
        }
        if keys.len() != site_names.len() {
            return Err(AppError::SiteCountMismatch {
                locations: keys.len(),
                names: site_names.len(),
            });
        }
        if keys.len() > SITE_MARKERS.len() {
            return Err(AppError::PaletteExhausted {
                sites: keys.len(),
                palette: SITE_MARKERS.len(),
            });
        }

        let markers: Vec<MarkerShape> = SITE_MARKERS[..keys.len()].iter().rev().copied().collect();
        let colors: Vec<RGBColor> = SITE_COLORS[..keys.len()].iter().rev().copied().collect();

        let sites = keys
            .iter()
            .enumerate()
            .map(|(i, key)| Site {
                key: key.clone(),
                name: site_names[i].clone(),
                color: colors[i],
                marker: markers[i],
                samples: records
                    .iter()
                    .filter(|r| &r.location == key)
                    .map(|r| r.sample.clone())
                    .collect(),
            })
            .collect();
        Ok(Self { sites })
    }

    /// All samples outside the given site, in site order.
    pub fn complement(&self, site: &Site) -> Vec<&str> {
        self.sites
            .iter()
            .filter(|s| s.key != site.key)
            .flat_map(|s| s.samples.iter().map(String::as_str))
            .collect()
    }
}

fn find_column(columns: &[&str], name: &str, path: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| *c == name)
        .ok_or_else(|| AppError::MissingColumn {
            path: path.to_string(),
            column: name.to_string(),
        })
}
