//!
//! merge planner
//!
//! Regroups the per-window prediction results by target genome and fixes
//! the order handed to the reduce/join stage. Window chains resolve in any
//! order under concurrent execution, so ordering is enforced here by an
//! explicit sort key (window start, then chromosome, then length) and never
//! by arrival order.
//!
use crate::artifact::{Artifact, BlobStore};
use crate::common::{GenomeId, Window};
use crate::error::Result;
use crate::tasks::join::chunk_marker;
use crate::tasks::PredictionOutput;
use std::collections::BTreeMap;

///
/// One genome's window results in merge order.
///
pub type PerGenomeWindowResults = BTreeMap<GenomeId, Vec<(Window, Artifact)>>;

///
/// Group `(window, prediction)` pairs by genome and sort each genome's
/// collection into canonical window order.
///
pub fn group_by_genome(results: &[(Window, PredictionOutput)]) -> PerGenomeWindowResults {
    let mut grouped: PerGenomeWindowResults = BTreeMap::new();
    for (window, prediction) in results {
        for (genome, artifact) in &prediction.chunks {
            grouped
                .entry(genome.clone())
                .or_default()
                .push((window.clone(), artifact.clone()));
        }
    }
    for chunks in grouped.values_mut() {
        chunks.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
    grouped
}

///
/// Concatenate every window's prediction log in window order into the
/// single run-level log, each chunk prefixed with its marker line.
///
pub fn concat_logs(
    store: &dyn BlobStore,
    results: &[(Window, PredictionOutput)],
) -> Result<Artifact> {
    let mut ordered: Vec<&(Window, PredictionOutput)> = results.iter().collect();
    ordered.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut log = Vec::new();
    for (window, prediction) in ordered {
        log.extend_from_slice(chunk_marker(window).as_bytes());
        log.extend_from_slice(&store.get(&prediction.log)?);
    }
    store.put(&log)
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemBlobStore;
    use crate::tasks::GffChunkSet;

    fn prediction(
        store: &MemBlobStore,
        window: &Window,
        genomes: &[&str],
    ) -> (Window, PredictionOutput) {
        let mut chunks: GffChunkSet = BTreeMap::new();
        for genome in genomes {
            let bytes = format!("{} {}\n", genome, window);
            chunks.insert(genome.to_string(), store.put(bytes.as_bytes()).unwrap());
        }
        let log = store.put(format!("log {}\n", window).as_bytes()).unwrap();
        (window.clone(), PredictionOutput { chunks, log })
    }

    #[test]
    fn groups_and_sorts_regardless_of_arrival_order() {
        let store = MemBlobStore::new();
        // completion order deliberately scrambled
        let results = vec![
            prediction(&store, &Window::new("chr1", 500, 300), &["hg38", "mm10"]),
            prediction(&store, &Window::new("chr1", 0, 300), &["hg38", "mm10"]),
            prediction(&store, &Window::new("chr1", 750, 250), &["hg38", "mm10"]),
            prediction(&store, &Window::new("chr1", 250, 300), &["hg38", "mm10"]),
        ];
        let grouped = group_by_genome(&results);
        assert_eq!(grouped.len(), 2);
        for genome in ["hg38", "mm10"].iter() {
            let starts: Vec<u64> = grouped[*genome].iter().map(|(w, _)| w.start()).collect();
            assert_eq!(starts, vec![0, 250, 500, 750]);
        }
    }

    #[test]
    fn every_genome_gets_every_window() {
        let store = MemBlobStore::new();
        let results = vec![
            prediction(&store, &Window::new("chr1", 0, 300), &["hg38"]),
            prediction(&store, &Window::new("chr1", 250, 300), &["hg38"]),
        ];
        let grouped = group_by_genome(&results);
        assert_eq!(grouped["hg38"].len(), 2);
    }

    #[test]
    fn ties_break_by_chrom_then_length() {
        let store = MemBlobStore::new();
        let results = vec![
            prediction(&store, &Window::new("chr2", 0, 300), &["hg38"]),
            prediction(&store, &Window::new("chr1", 0, 200), &["hg38"]),
            prediction(&store, &Window::new("chr1", 0, 300), &["hg38"]),
        ];
        let grouped = group_by_genome(&results);
        let order: Vec<(String, u64)> = grouped["hg38"]
            .iter()
            .map(|(w, _)| (w.chrom().to_string(), w.length()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("chr1".to_string(), 200),
                ("chr1".to_string(), 300),
                ("chr2".to_string(), 300)
            ]
        );
    }

    #[test]
    fn run_log_is_in_window_order_with_markers() {
        let store = MemBlobStore::new();
        let results = vec![
            prediction(&store, &Window::new("chr1", 250, 300), &["hg38"]),
            prediction(&store, &Window::new("chr1", 0, 300), &["hg38"]),
        ];
        let log = concat_logs(&store, &results).unwrap();
        let text = String::from_utf8(store.get(&log).unwrap()).unwrap();
        assert_eq!(
            text,
            "## BEGIN CHUNK chrom: chr1 start: 0 chunksize: 300\n\
             log chr1:0+300\n\
             ## BEGIN CHUNK chrom: chr1 start: 250 chunksize: 300\n\
             log chr1:250+300\n"
        );
    }
}
