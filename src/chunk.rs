//!
//! chunk planner
//!
//! Pure functions turning (chromosome length, chunk size, overlap) into an
//! ordered, gap-free sequence of overlapping windows, plus parsing of the
//! chromosome-size table that drives the plan.
//!
use crate::common::{ChromId, Window};
use crate::error::{CgpError, Result};
use std::path::Path;

///
/// Plan the windows for a single chromosome of length `length`.
///
/// Starts at offset 0 and steps by `chunk_size - overlap`; every window but
/// the last has length exactly `chunk_size`, the last one is clipped to the
/// remaining length. The produced intervals union to exactly `[0, length)`.
///
/// `length == 0` yields an empty plan. `chunk_size == 0` or
/// `chunk_size <= overlap` is rejected: the step would not advance and the
/// plan would never terminate.
///
pub fn plan(chrom: &str, length: u64, chunk_size: u64, overlap: u64) -> Result<Vec<Window>> {
    if chunk_size == 0 || chunk_size <= overlap {
        return Err(CgpError::config(format!(
            "chunk size ({}) must be greater than overlap ({})",
            chunk_size, overlap
        )));
    }
    let step = chunk_size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;
    while start < length {
        let len = chunk_size.min(length - start);
        windows.push(Window::new(chrom, start, len));
        start += step;
    }
    Ok(windows)
}

///
/// Plan the windows for every chromosome of a size table, in table order.
///
pub fn plan_all(
    sizes: &[(ChromId, u64)],
    chunk_size: u64,
    overlap: u64,
) -> Result<Vec<Window>> {
    let mut windows = Vec::new();
    for (chrom, length) in sizes {
        windows.extend(plan(chrom, *length, chunk_size, overlap)?);
    }
    Ok(windows)
}

///
/// Parse a chromosome-size table: one `chrom<whitespace>length` pair per
/// line, blank lines ignored.
///
pub fn parse_size_table(text: &str) -> Result<Vec<(ChromId, u64)>> {
    let mut sizes = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let chrom = fields.next();
        let length = fields.next().map(|s| s.parse::<u64>());
        match (chrom, length) {
            (Some(chrom), Some(Ok(length))) => sizes.push((chrom.to_string(), length)),
            _ => {
                return Err(CgpError::config(format!(
                    "malformed chromosome-size line {}: {:?}",
                    i + 1,
                    line
                )))
            }
        }
    }
    Ok(sizes)
}

pub fn read_size_table(path: &Path) -> Result<Vec<(ChromId, u64)>> {
    let text = std::fs::read_to_string(path)?;
    parse_size_table(&text)
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn assert_covers(windows: &[Window], length: u64, chunk_size: u64, overlap: u64) {
        if length == 0 {
            assert!(windows.is_empty());
            return;
        }
        // gap-free union of [0, length)
        assert_eq!(windows[0].start(), 0);
        assert_eq!(windows.last().unwrap().end(), length);
        for pair in windows.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(
                next.start() <= prev.end(),
                "gap between {} and {}",
                prev,
                next
            );
            // every window but the last has full length, so consecutive
            // windows share exactly `overlap` bases
            assert_eq!(prev.end() - next.start(), overlap);
        }
        // every window but the last has length exactly chunk_size
        for w in &windows[..windows.len() - 1] {
            assert_eq!(w.length(), chunk_size);
        }
        assert!(windows.last().unwrap().length() <= chunk_size);
    }

    #[test_case(1000, 300, 50)]
    #[test_case(1000, 300, 0)]
    #[test_case(1, 300, 50)]
    #[test_case(299, 300, 50)]
    #[test_case(300, 300, 50)]
    #[test_case(301, 300, 50)]
    #[test_case(100_000, 7_919, 1_000)]
    #[test_case(0, 300, 50)]
    fn coverage(length: u64, chunk_size: u64, overlap: u64) {
        let windows = plan("chr1", length, chunk_size, overlap).unwrap();
        assert_covers(&windows, length, chunk_size, overlap);
    }

    #[test]
    fn concrete_example() {
        let windows = plan("chr1", 1000, 300, 50).unwrap();
        let starts: Vec<u64> = windows.iter().map(|w| w.start()).collect();
        let lengths: Vec<u64> = windows.iter().map(|w| w.length()).collect();
        assert_eq!(starts, vec![0, 250, 500, 750]);
        assert_eq!(lengths, vec![300, 300, 300, 250]);
    }

    #[test]
    fn deterministic() {
        let a = plan("chr1", 123_456, 500, 77).unwrap();
        let b = plan("chr1", 123_456, 500, 77).unwrap();
        assert_eq!(a, b);
    }

    #[test_case(300, 300)]
    #[test_case(300, 400)]
    #[test_case(0, 0)]
    fn rejects_bad_chunk_overlap(chunk_size: u64, overlap: u64) {
        let res = plan("chr1", 1000, chunk_size, overlap);
        assert!(matches!(res, Err(CgpError::Config { .. })));
    }

    #[test]
    fn zero_length_is_empty_not_error() {
        assert!(plan("chr1", 0, 300, 50).unwrap().is_empty());
    }

    #[test]
    fn plan_all_keeps_table_order() {
        let sizes = vec![("chr2".to_string(), 400), ("chr1".to_string(), 300)];
        let windows = plan_all(&sizes, 300, 50).unwrap();
        let chroms: Vec<&str> = windows.iter().map(|w| w.chrom()).collect();
        assert_eq!(chroms, vec!["chr2", "chr2", "chr1"]);
    }

    #[test]
    fn parses_size_table() {
        let sizes = parse_size_table("chr1\t248956422\nchr2 242193529\n\n").unwrap();
        assert_eq!(
            sizes,
            vec![
                ("chr1".to_string(), 248956422),
                ("chr2".to_string(), 242193529)
            ]
        );
    }

    #[test]
    fn rejects_malformed_size_line() {
        let res = parse_size_table("chr1\tnot_a_number\n");
        assert!(matches!(res, Err(CgpError::Config { .. })));
        let res = parse_size_table("chr1\n");
        assert!(matches!(res, Err(CgpError::Config { .. })));
    }
}
