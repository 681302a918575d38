//!
//! reduce/join collaborator (`joingenes` + genePred converters)
//!
//! Merges one genome's ordered per-window feature chunks into the final raw,
//! boundary-joined and format-normalized artifacts. The ordering contract is
//! owned by the caller: chunks arrive sorted by window start, and the raw
//! concatenation preserves exactly that order — downstream stitching assumes
//! ascending coordinate order.
//!
use crate::artifact::{Artifact, BlobStore};
use crate::common::{GenomeId, Window};
use crate::error::Result;
use crate::tasks::{proc, MergedResult};
use std::io::Write;
use std::process::Command;

/// marker line separating chunks in the raw concatenation and the run log
pub fn chunk_marker(window: &Window) -> String {
    format!(
        "## BEGIN CHUNK chrom: {} start: {} chunksize: {}\n",
        window.chrom(),
        window.start(),
        window.length()
    )
}

const KEPT_FEATURES: [&str; 6] = ["exon", "CDS", "start_codon", "stop_codon", "tts", "tss"];

///
/// Keep only AUGUSTUS feature lines of the kinds downstream tools consume,
/// renaming the tool's generic `jg` gene ids to `augCGP-`.
///
pub fn filter_feature_lines(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let mut fields = line.split('\t');
        let source = fields.nth(1);
        let feature = fields.next();
        match (source, feature) {
            (Some("AUGUSTUS"), Some(f)) if KEPT_FEATURES.contains(&f) => {
                out.push_str(&line.replace("jg", "augCGP-"));
                out.push('\n');
            }
            _ => {}
        }
    }
    out
}

///
/// Joins one genome's ordered window chunks. Failure is a hard failure for
/// that genome: never retried here, never replaced by a partial result.
///
pub trait GeneJoiner: Send + Sync {
    fn join(
        &self,
        store: &dyn BlobStore,
        genome: &GenomeId,
        chunks: &[(Window, Artifact)],
    ) -> Result<MergedResult>;
}

///
/// `joingenes` backed joiner.
///
/// Eliminates duplicated or fully-contained truncated records in overlap
/// regions and stitches records truncated exactly at a window boundary.
/// The joined set is then passed through `gtfToGenePred`/`genePredToGtf`,
/// which fixes the sort order for downstream gene mapping.
///
pub struct JoinGenes;

impl GeneJoiner for JoinGenes {
    fn join(
        &self,
        store: &dyn BlobStore,
        genome: &GenomeId,
        chunks: &[(Window, Artifact)],
    ) -> Result<MergedResult> {
        log::debug!("joining {} chunks for genome {}", chunks.len(), genome);
        let scratch = tempfile::tempdir()?;
        let dir = scratch.path();

        // materialize chunks in window order; raw concatenation and the
        // fofn handed to joingenes use the same order
        let raw_path = dir.join("raw.gtf");
        let fofn_path = dir.join("chunks.fofn");
        {
            let mut raw = std::fs::File::create(&raw_path)?;
            let mut fofn = std::fs::File::create(&fofn_path)?;
            for (i, (window, chunk)) in chunks.iter().enumerate() {
                let local = dir.join(format!("chunk_{:06}.gff", i));
                store.export(chunk, &local)?;
                writeln!(fofn, "{}", local.display())?;
                raw.write_all(chunk_marker(window).as_bytes())?;
                raw.write_all(&store.get(chunk)?)?;
            }
        }

        let joined_unfiltered = dir.join("joined.unfiltered.gtf");
        let mut cmd = Command::new("joingenes");
        cmd.arg("-f").arg(&fofn_path).arg("-o").arg("/dev/stdout");
        proc::run_with_stdout(cmd, &joined_unfiltered)?;

        let joined_path = dir.join("joined.gtf");
        let filtered = filter_feature_lines(&std::fs::read_to_string(&joined_unfiltered)?);
        std::fs::write(&joined_path, filtered)?;

        let gp_path = dir.join("joined.gp");
        let mut cmd = Command::new("gtfToGenePred");
        cmd.arg("-genePredExt").arg(&joined_path).arg(&gp_path);
        proc::run(cmd)?;

        let mut cmd = Command::new("genePredToGtf");
        cmd.arg("file")
            .arg(&gp_path)
            .arg("-utr")
            .arg("-honorCdsStat")
            .arg("-source=augustusCGP")
            .arg(&joined_path);
        proc::run(cmd)?;

        Ok(MergedResult {
            raw: store.put_file(&raw_path)?,
            joined: store.put_file(&joined_path)?,
            normalized: store.put_file(&gp_path)?,
        })
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_format() {
        let w = Window::new("chr1", 250, 300);
        assert_eq!(
            chunk_marker(&w),
            "## BEGIN CHUNK chrom: chr1 start: 250 chunksize: 300\n"
        );
    }

    #[test]
    fn filter_keeps_feature_lines_and_renames() {
        let text = "\
chr1\tAUGUSTUS\tgene\t1\t9\t.\t+\t.\tjg1\n\
chr1\tAUGUSTUS\tCDS\t1\t9\t.\t+\t0\ttranscript_id \"jg1.t1\";\n\
chr1\tAUGUSTUS\texon\t1\t9\t.\t+\t.\ttranscript_id \"jg1.t1\";\n\
chr1\tsomething\tCDS\t1\t9\t.\t+\t0\tx\n";
        let filtered = filter_feature_lines(text);
        let lines: Vec<&str> = filtered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\tCDS\t"));
        assert!(lines[0].contains("augCGP-1.t1"));
        assert!(!filtered.contains("jg"));
        assert!(!filtered.contains("\tgene\t"));
    }
}
