//!
//! basic coordinate and id types shared by the planner, scheduler and merge stages
//!
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a genome participating in prediction (e.g. `hg38`, `mm10`)
pub type GenomeId = String;

/// Identifier of a reference chromosome or scaffold
pub type ChromId = String;

///
/// Half-open interval `[start, start + length)` on one reference chromosome.
///
/// Immutable once created.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomeCoordinate {
    pub chrom: ChromId,
    pub start: u64,
    pub length: u64,
}

impl GenomeCoordinate {
    pub fn new(chrom: &str, start: u64, length: u64) -> Self {
        GenomeCoordinate {
            chrom: chrom.to_string(),
            start,
            length,
        }
    }
    /// exclusive end offset
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

impl fmt::Display for GenomeCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}+{}", self.chrom, self.start, self.length)
    }
}

///
/// One unit of work: a bounded sub-interval of a chromosome, created by the
/// chunk planner and consumed by exactly one extraction task. Consecutive
/// windows of a plan share an overlap margin so features straddling a
/// boundary are not lost.
///
/// Ordering is start-major (then chromosome, then length) because the merge
/// stage sorts per-genome results by window start, never by completion order.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window(pub GenomeCoordinate);

impl Window {
    pub fn new(chrom: &str, start: u64, length: u64) -> Self {
        Window(GenomeCoordinate::new(chrom, start, length))
    }
    pub fn chrom(&self) -> &str {
        &self.0.chrom
    }
    pub fn start(&self) -> u64 {
        self.0.start
    }
    pub fn length(&self) -> u64 {
        self.0.length
    }
    pub fn end(&self) -> u64 {
        self.0.end()
    }
}

impl Ord for Window {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start()
            .cmp(&other.start())
            .then_with(|| self.chrom().cmp(other.chrom()))
            .then_with(|| self.length().cmp(&other.length()))
    }
}

impl PartialOrd for Window {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_order_is_start_major() {
        let a = Window::new("chr2", 100, 300);
        let b = Window::new("chr1", 200, 300);
        assert!(a < b);

        let c = Window::new("chr1", 100, 300);
        let d = Window::new("chr2", 100, 300);
        assert!(c < d);

        let e = Window::new("chr1", 100, 200);
        let f = Window::new("chr1", 100, 300);
        assert!(e < f);
    }

    #[test]
    fn coordinate_end_and_display() {
        let w = Window::new("chrX", 250, 300);
        assert_eq!(w.end(), 550);
        assert_eq!(w.to_string(), "chrX:250+300");
    }
}
