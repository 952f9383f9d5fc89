// Readers for the QOBLIB source formats: .dat matrices, .sol files, DIMACS .gph graphs

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::converter_service::{ConversionError, ConversionResult};

fn malformed(message: impl Into<String>) -> ConversionError {
    ConversionError::Malformed(message.into())
}

fn number(token: &str) -> ConversionResult<f64> {
    token
        .parse::<f64>()
        .map_err(|_| malformed(format!("'{}' is not a number", token)))
}

fn count(token: &str) -> ConversionResult<usize> {
    token
        .parse::<usize>()
        .map_err(|_| malformed(format!("'{}' is not a count", token)))
}

/// Market split data: `m` rows `a_i1 .. a_in` with right-hand side `b_i`
#[derive(Debug, Clone, PartialEq)]
pub struct QoblibMatrix {
    pub rows: usize,
    pub cols: usize,
    pub a: Vec<Vec<f64>>,
    pub b: Vec<f64>,
}

/// Parse a `.dat` file: `#` comments, a header `m n`, then `m * (n + 1)` numbers
pub fn parse_dat(data: &str) -> ConversionResult<QoblibMatrix> {
    let mut lines = data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let header = lines
        .next()
        .ok_or_else(|| malformed("no data lines found"))?;
    let mut fields = header.split_whitespace();
    let (rows, cols) = match (fields.next(), fields.next()) {
        (Some(m), Some(n)) => (count(m)?, count(n)?),
        _ => return Err(malformed(format!("header needs 'm n', got '{}'", header))),
    };

    let values = lines
        .flat_map(str::split_whitespace)
        .map(number)
        .collect::<ConversionResult<Vec<f64>>>()?;

    let expected = cols
        .checked_add(1)
        .and_then(|c| rows.checked_mul(c))
        .ok_or_else(|| malformed(format!("header 'm={}, n={}' is too large", rows, cols)))?;
    if values.len() != expected {
        return Err(malformed(format!(
            "expected {} numbers for m={}, n={}, found {}",
            expected,
            rows,
            cols,
            values.len()
        )));
    }

    let (a, b): (Vec<Vec<f64>>, Vec<f64>) = values
        .chunks(cols + 1)
        .map(|row| (row[..cols].to_vec(), row[cols]))
        .unzip();

    Ok(QoblibMatrix { rows, cols, a, b })
}

/// Content of a `.sol` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionFile {
    /// `# Energy: v`
    pub energy: Option<f64>,
    /// `# Objective value = v`
    pub objective: Option<f64>,
    /// `# Consecutive entries: n`
    pub entries: Option<usize>,
    /// `name#index value` lines, grouped by name; indices as written
    pub named: BTreeMap<String, BTreeMap<usize, f64>>,
    /// `name#i#j.. value` lines with two or more indices
    pub indexed: BTreeMap<String, BTreeMap<Vec<usize>, f64>>,
    /// `name value` lines
    pub scalars: BTreeMap<String, f64>,
    /// Lines holding a single number, in file order
    pub sequence: Vec<f64>,
}

impl SolutionFile {
    pub fn reported_objective(&self) -> Option<f64> {
        self.energy.or(self.objective)
    }

    pub fn values_of(&self, name: &str) -> Option<&BTreeMap<usize, f64>> {
        self.named.get(name)
    }

    pub fn indexed_values_of(&self, name: &str) -> Option<&BTreeMap<Vec<usize>, f64>> {
        self.indexed.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    /// Values of `name#1 ..= name#len` as a dense vector; absent entries are 0
    pub fn dense(&self, name: &str, len: usize) -> ConversionResult<Vec<f64>> {
        let mut values = vec![0.0; len];
        if let Some(entries) = self.values_of(name) {
            for (&index, &value) in entries {
                if index == 0 || index > len {
                    return Err(malformed(format!(
                        "{}#{} is outside 1..={}",
                        name, index, len
                    )));
                }
                values[index - 1] = value;
            }
        }
        Ok(values)
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
            && self.indexed.is_empty()
            && self.scalars.is_empty()
            && self.sequence.is_empty()
    }
}

fn header_value<'a>(line: &'a str, key: &str, separator: char) -> Option<&'a str> {
    let body = line.trim_start_matches('#').trim();
    let (name, value) = body.split_once(separator)?;
    if name.trim().eq_ignore_ascii_case(key) {
        Some(value.trim())
    } else {
        None
    }
}

/// Parse a `.sol` file. Unrecognized lines are skipped.
pub fn parse_sol(data: &str) -> ConversionResult<SolutionFile> {
    let mut solution = SolutionFile::default();

    for line in data.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            if let Some(v) = header_value(line, "energy", ':') {
                solution.energy = Some(number(v)?);
            } else if let Some(v) = header_value(line, "objective value", '=') {
                solution.objective = Some(number(v)?);
            } else if let Some(v) = header_value(line, "consecutive entries", ':') {
                solution.entries = Some(count(v)?);
            }
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [single] => {
                if let Ok(value) = single.parse::<f64>() {
                    solution.sequence.push(value);
                }
            }
            [key, value] => {
                let Ok(value) = value.parse::<f64>() else {
                    continue;
                };
                let Some((name, rest)) = key.split_once('#') else {
                    solution.scalars.insert(key.to_string(), value);
                    continue;
                };
                let Some(indices) = rest
                    .split('#')
                    .map(|i| i.parse::<usize>().ok())
                    .collect::<Option<Vec<usize>>>()
                else {
                    continue;
                };
                match indices.as_slice() {
                    [index] => {
                        solution
                            .named
                            .entry(name.to_string())
                            .or_default()
                            .insert(*index, value);
                    }
                    _ => {
                        solution
                            .indexed
                            .entry(name.to_string())
                            .or_default()
                            .insert(indices, value);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(solution)
}

/// Split a bundle of files concatenated under `==> name <==` headers, the way
/// `head` prints several files. Text before the first header is kept under "".
pub fn split_sections(data: &str) -> BTreeMap<String, String> {
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current = String::new();

    for line in data.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed
            .strip_prefix("==>")
            .and_then(|rest| rest.strip_suffix("<=="))
        {
            current = name.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }
        let section = sections.entry(current.clone()).or_default();
        section.push_str(line);
        section.push('\n');
    }

    sections
}

/// Undirected simple graph with 0-based vertices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub vertices: usize,
    /// Sorted, deduplicated, each edge as (smaller, larger)
    pub edges: Vec<(usize, usize)>,
}

/// Parse a DIMACS `.gph` file: `c` comments, `p edge N M`, `e u v` with 1-based vertices
pub fn parse_gph(data: &str) -> ConversionResult<Graph> {
    let mut vertices = None;
    let mut edges = BTreeSet::new();

    for line in data.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["c", ..] => {}
            ["p", "edge", n, _m, ..] => vertices = Some(count(n)?),
            ["p", ..] => return Err(malformed(format!("invalid problem line '{}'", line))),
            ["e", u, v] => {
                let (u, v) = (count(u)?, count(v)?);
                if u == 0 || v == 0 {
                    return Err(malformed(format!("vertices are 1-based: '{}'", line)));
                }
                if u != v {
                    edges.insert((u.min(v) - 1, u.max(v) - 1));
                }
            }
            [first, ..] if first.starts_with('c') => {}
            _ => return Err(malformed(format!("unrecognized line '{}'", line))),
        }
    }

    let vertices = vertices.ok_or_else(|| malformed("missing 'p edge N M' header"))?;
    if let Some((u, v)) = edges.iter().find(|(_, v)| *v >= vertices) {
        return Err(malformed(format!(
            "edge ({}, {}) exceeds the {} declared vertices",
            u + 1,
            v + 1,
            vertices
        )));
    }

    Ok(Graph {
        vertices,
        edges: edges.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dat_rows_and_rhs() {
        let data = "# market split\n# 2 constraints\n2 3\n1 2 3 4\n5 6 7\n8\n";
        let matrix = parse_dat(data).unwrap();
        assert_eq!((matrix.rows, matrix.cols), (2, 3));
        assert_eq!(matrix.a, vec![vec![1.0, 2.0, 3.0], vec![5.0, 6.0, 7.0]]);
        assert_eq!(matrix.b, vec![4.0, 8.0]);
    }

    #[test]
    fn dat_length_mismatch() {
        assert!(matches!(
            parse_dat("2 2\n1 2 3\n4 5\n"),
            Err(ConversionError::Malformed(_))
        ));
        assert!(parse_dat("# only comments\n").is_err());
        assert!(parse_dat("2\n").is_err());
    }

    #[test]
    fn dat_oversized_header_is_malformed() {
        let data = "18446744073709551615 18446744073709551615\n1\n";
        assert!(matches!(parse_dat(data), Err(ConversionError::Malformed(_))));

        let data = "18446744073709551615 1\n1\n";
        assert!(matches!(parse_dat(data), Err(ConversionError::Malformed(_))));
    }

    #[test]
    fn sol_headers_and_values() {
        let data = "# Energy: 7\n# Consecutive entries: 3\n1\n0\n1\n";
        let sol = parse_sol(data).unwrap();
        assert_eq!(sol.energy, Some(7.0));
        assert_eq!(sol.entries, Some(3));
        assert_eq!(sol.sequence, vec![1.0, 0.0, 1.0]);
        assert_eq!(sol.reported_objective(), Some(7.0));

        let data = "# Objective value = 12\nx#1 1\nx#3 1\ns#2 0.5\n";
        let sol = parse_sol(data).unwrap();
        assert_eq!(sol.objective, Some(12.0));
        let x = sol.values_of("x").unwrap();
        assert_eq!(x.get(&1), Some(&1.0));
        assert_eq!(x.get(&3), Some(&1.0));
        assert_eq!(sol.values_of("s").unwrap().get(&2), Some(&0.5));
        assert!(sol.sequence.is_empty());
    }

    #[test]
    fn sol_multi_index_and_scalar_entries() {
        let data = "z 4\nf#1#2#3 2.5\nx#2#1 1\nx#3 1\nbh#a#1 1\n";
        let sol = parse_sol(data).unwrap();
        assert_eq!(sol.scalar("z"), Some(4.0));
        assert_eq!(sol.indexed_values_of("f").unwrap().get(&vec![1, 2, 3]), Some(&2.5));
        assert_eq!(sol.indexed_values_of("x").unwrap().get(&vec![2, 1]), Some(&1.0));
        assert_eq!(sol.values_of("x").unwrap().get(&3), Some(&1.0));
        assert!(sol.indexed_values_of("bh").is_none());
    }

    #[test]
    fn sol_dense_values() {
        let sol = parse_sol("x#1 1\nx#3 0.5\n").unwrap();
        assert_eq!(sol.dense("x", 3).unwrap(), vec![1.0, 0.0, 0.5]);
        assert_eq!(sol.dense("y", 2).unwrap(), vec![0.0, 0.0]);
        assert!(matches!(sol.dense("x", 2), Err(ConversionError::Malformed(_))));
    }

    #[test]
    fn sections_follow_headers() {
        let data = "preamble\n==> param.dat <==\nnodes 3\n\n==> arcs.dat <==\n1 2 1\n2 3 1\n";
        let sections = split_sections(data);
        assert_eq!(sections[""], "preamble\n");
        assert_eq!(sections["param.dat"], "nodes 3\n\n");
        assert_eq!(sections["arcs.dat"], "1 2 1\n2 3 1\n");
    }

    #[test]
    fn gph_is_normalized() {
        let data = "c sample\np edge 4 5\ne 2 1\ne 1 2\ne 3 3\ne 4 3\ne 1 4\n";
        let graph = parse_gph(data).unwrap();
        assert_eq!(graph.vertices, 4);
        assert_eq!(graph.edges, vec![(0, 1), (0, 3), (2, 3)]);
    }

    #[test]
    fn gph_rejects_bad_input() {
        assert!(parse_gph("e 1 2\n").is_err());
        assert!(parse_gph("p edge 2 1\ne 1 3\n").is_err());
        assert!(parse_gph("p col 2 1\n").is_err());
    }
}
