// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Persisted index format.
//!
//! Layout: fixed header, then eight sections (vocabulary string table,
//! source and target corpus id vectors, sentence prefix sums, f2e and e2f
//! CSR alignments, source and target suffix arrays), then a CRC32 footer.
//! Everything about the index is explicit in the schema; nothing depends on
//! in-memory object layout, and the sampling seed travels with the file so a
//! loaded index samples exactly like the one that was saved.
//!
//! A `.gz` path extension selects transparent gzip compression around the
//! whole payload. The CRC is computed over the uncompressed bytes.

pub mod encoding;
pub mod header;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use crate::corpus::{CorpusSide, CsrAlignment, ParallelCorpus};
use crate::error::SabreError;
use crate::sa::ParallelSuffixArray;
use crate::vocab::Vocabulary;

use encoding::{
    decode_string_table, decode_u32_vec, decode_u32_vec_prefix, encode_string_table,
    encode_u32_vec,
};
use header::{IndexFooter, IndexHeader, VERSION};

/// Serialize the whole index to bytes.
pub fn encode(sa: &ParallelSuffixArray) -> Vec<u8> {
    let corpus = sa.corpus();

    let mut vocab_sec = Vec::new();
    encode_string_table(&sa.vocab().words_snapshot(), &mut vocab_sec);

    let mut src_corpus_sec = Vec::new();
    encode_u32_vec(&corpus.src.tokens, &mut src_corpus_sec);
    let mut tgt_corpus_sec = Vec::new();
    encode_u32_vec(&corpus.tgt.tokens, &mut tgt_corpus_sec);

    let mut sentences_sec = Vec::new();
    encode_u32_vec(&corpus.src.starts, &mut sentences_sec);
    encode_u32_vec(&corpus.tgt.starts, &mut sentences_sec);

    let mut f2e_sec = Vec::new();
    encode_u32_vec(&corpus.f2e.offsets, &mut f2e_sec);
    encode_u32_vec(&corpus.f2e.links, &mut f2e_sec);
    let mut e2f_sec = Vec::new();
    encode_u32_vec(&corpus.e2f.offsets, &mut e2f_sec);
    encode_u32_vec(&corpus.e2f.links, &mut e2f_sec);

    let mut src_sa_sec = Vec::new();
    encode_u32_vec(sa.suffix_positions(true), &mut src_sa_sec);
    let mut tgt_sa_sec = Vec::new();
    encode_u32_vec(sa.suffix_positions(false), &mut tgt_sa_sec);

    let header = IndexHeader {
        version: VERSION,
        flags: 0,
        vocab_len: vocab_sec.len() as u32,
        src_corpus_len: src_corpus_sec.len() as u32,
        tgt_corpus_len: tgt_corpus_sec.len() as u32,
        sentences_len: sentences_sec.len() as u32,
        f2e_len: f2e_sec.len() as u32,
        e2f_len: e2f_sec.len() as u32,
        src_sa_len: src_sa_sec.len() as u32,
        tgt_sa_len: tgt_sa_sec.len() as u32,
        seed: sa.seed(),
    };
    let offsets = header.section_offsets();

    let mut out = Vec::with_capacity(offsets.total_size());
    header.write(&mut out).expect("writing to Vec cannot fail");
    out.extend_from_slice(&vocab_sec);
    out.extend_from_slice(&src_corpus_sec);
    out.extend_from_slice(&tgt_corpus_sec);
    out.extend_from_slice(&sentences_sec);
    out.extend_from_slice(&f2e_sec);
    out.extend_from_slice(&e2f_sec);
    out.extend_from_slice(&src_sa_sec);
    out.extend_from_slice(&tgt_sa_sec);

    let footer = IndexFooter {
        crc32: IndexFooter::compute_crc32(&out),
    };
    footer.write(&mut out).expect("writing to Vec cannot fail");
    out
}

/// Deserialize and revalidate an index.
pub fn decode(bytes: &[u8]) -> Result<ParallelSuffixArray, SabreError> {
    let header = IndexHeader::read(bytes)?;
    let offsets = header.section_offsets();
    if bytes.len() != offsets.total_size() {
        return Err(SabreError::corrupt(format!(
            "file is {} bytes but sections claim {}",
            bytes.len(),
            offsets.total_size()
        )));
    }

    let footer = IndexFooter::read(bytes)?;
    let computed = IndexFooter::compute_crc32(&bytes[..offsets.content_size()]);
    if footer.crc32 != computed {
        return Err(SabreError::corrupt(format!(
            "checksum mismatch: file says {:#010x}, computed {:#010x}",
            footer.crc32, computed
        )));
    }

    let words = decode_string_table(offsets.slice(bytes, offsets.vocabulary)?)?;
    let src_tokens = decode_u32_vec(offsets.slice(bytes, offsets.src_corpus)?)?;
    let tgt_tokens = decode_u32_vec(offsets.slice(bytes, offsets.tgt_corpus)?)?;

    let sentences = offsets.slice(bytes, offsets.sentences)?;
    let (src_starts, used) = decode_u32_vec_prefix(sentences)?;
    let (tgt_starts, rest) = decode_u32_vec_prefix(&sentences[used..])?;
    if used + rest != sentences.len() {
        return Err(SabreError::corrupt("trailing bytes in sentence section"));
    }

    let f2e = decode_csr(offsets.slice(bytes, offsets.f2e)?, "f2e")?;
    let e2f = decode_csr(offsets.slice(bytes, offsets.e2f)?, "e2f")?;
    let src_sa = decode_u32_vec(offsets.slice(bytes, offsets.src_sa)?)?;
    let tgt_sa = decode_u32_vec(offsets.slice(bytes, offsets.tgt_sa)?)?;

    let vocab = Arc::new(Vocabulary::from_words(words));
    let corpus = ParallelCorpus::from_parts(
        CorpusSide {
            tokens: src_tokens,
            starts: src_starts,
        },
        CorpusSide {
            tokens: tgt_tokens,
            starts: tgt_starts,
        },
        f2e,
        e2f,
    )?;
    ParallelSuffixArray::from_parts(vocab, corpus, src_sa, tgt_sa, header.seed)
}

fn decode_csr(bytes: &[u8], name: &str) -> Result<CsrAlignment, SabreError> {
    let (offsets, used) = decode_u32_vec_prefix(bytes)?;
    let (links, rest) = decode_u32_vec_prefix(&bytes[used..])?;
    if used + rest != bytes.len() {
        return Err(SabreError::corrupt(format!(
            "trailing bytes in {} section",
            name
        )));
    }
    Ok(CsrAlignment { offsets, links })
}

fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// Write the index to `path`; a `.gz` extension gzips the payload.
pub fn save<P: AsRef<Path>>(sa: &ParallelSuffixArray, path: P) -> Result<(), SabreError> {
    let path = path.as_ref();
    let bytes = encode(sa);
    let mut file = File::create(path)?;
    if is_gz(path) {
        let mut enc = GzEncoder::new(&mut file, Compression::default());
        enc.write_all(&bytes)?;
        enc.finish()?;
    } else {
        file.write_all(&bytes)?;
    }
    info!(path = %path.display(), bytes = bytes.len(), "saved index");
    Ok(())
}

/// Read an index from `path`, gunzipping if the extension says so.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ParallelSuffixArray, SabreError> {
    let path = path.as_ref();
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;
    let bytes = if is_gz(path) {
        let mut out = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
        out
    } else {
        raw
    };
    let sa = decode(&bytes)?;
    info!(path = %path.display(), sentences = sa.corpus().sentence_count(), "loaded index");
    Ok(sa)
}
