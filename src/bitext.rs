// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Bitext compilation: three parallel text files in, one index out.
//!
//! Input is the standard aligned-bitext layout: one tokenized sentence per
//! line on each side, plus an alignment file of whitespace-separated `i-j`
//! link pairs per line. Line n of all three files describes sentence n. A
//! small JSON manifest names the three files so build tooling has a single
//! input handle; paths inside it resolve relative to the manifest location.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use tracing::info;

use crate::corpus::SentenceTriple;
use crate::error::SabreError;
use crate::sa::ParallelSuffixArray;

/// Manifest naming the three bitext files.
#[derive(Deserialize, Clone, Debug)]
pub struct BitextManifest {
    pub source: PathBuf,
    pub target: PathBuf,
    pub alignment: PathBuf,
}

impl BitextManifest {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, SabreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut manifest: BitextManifest = serde_json::from_str(&text)
            .map_err(|e| SabreError::config(format!("invalid manifest {}: {}", path.display(), e)))?;
        if let Some(dir) = path.parent() {
            for p in [
                &mut manifest.source,
                &mut manifest.target,
                &mut manifest.alignment,
            ] {
                if p.is_relative() {
                    *p = dir.join(&*p);
                }
            }
        }
        Ok(manifest)
    }
}

/// Parse one Moses-format alignment line: whitespace-separated `i-j` pairs.
pub fn parse_alignment(line: &str) -> Result<Vec<(u32, u32)>, SabreError> {
    line.split_whitespace()
        .map(|tok| {
            let (i, j) = tok
                .split_once('-')
                .ok_or_else(|| SabreError::corrupt(format!("malformed alignment token '{}'", tok)))?;
            let i = i
                .parse::<u32>()
                .map_err(|_| SabreError::corrupt(format!("malformed alignment token '{}'", tok)))?;
            let j = j
                .parse::<u32>()
                .map_err(|_| SabreError::corrupt(format!("malformed alignment token '{}'", tok)))?;
            Ok((i, j))
        })
        .collect()
}

/// Read three parallel files into sentence triples. Sentence counts must
/// match across all three; blank lines are legitimate empty sentences.
pub fn read_bitext<P: AsRef<Path>>(
    source: P,
    target: P,
    alignment: P,
) -> Result<Vec<SentenceTriple>, SabreError> {
    let src_text = fs::read_to_string(source)?;
    let tgt_text = fs::read_to_string(target)?;
    let align_text = fs::read_to_string(alignment)?;

    let src_lines: Vec<&str> = src_text.lines().collect();
    let tgt_lines: Vec<&str> = tgt_text.lines().collect();
    let align_lines: Vec<&str> = align_text.lines().collect();
    if src_lines.len() != tgt_lines.len() || src_lines.len() != align_lines.len() {
        return Err(SabreError::corrupt(format!(
            "bitext line counts differ: {} source, {} target, {} alignment",
            src_lines.len(),
            tgt_lines.len(),
            align_lines.len()
        )));
    }

    (0..src_lines.len())
        .into_par_iter()
        .map(|n| {
            let alignment = parse_alignment(align_lines[n]).map_err(|e| match e {
                SabreError::CorruptIndex(msg) => {
                    SabreError::corrupt(format!("alignment line {}: {}", n + 1, msg))
                }
                other => other,
            })?;
            Ok(SentenceTriple {
                source: src_lines[n].split_whitespace().map(str::to_string).collect(),
                target: tgt_lines[n].split_whitespace().map(str::to_string).collect(),
                alignment,
            })
        })
        .collect()
}

/// Compile the bitext named by a manifest into a ready index.
pub fn compile<P: AsRef<Path>>(manifest_path: P) -> Result<ParallelSuffixArray, SabreError> {
    let manifest = BitextManifest::read(manifest_path)?;
    let triples = read_bitext(&manifest.source, &manifest.target, &manifest.alignment)?;
    info!(sentences = triples.len(), "compiling bitext");
    ParallelSuffixArray::from_triples(&triples)
}
