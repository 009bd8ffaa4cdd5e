// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Index file header and footer.
//!
//! The header is 48 bytes of fixed-size fields, parsed in one read before
//! anything else; it records the length of every section so a reader can
//! locate each one without scanning. The footer is 8 bytes: a CRC32 over
//! everything before it plus the header magic reversed. A wrong footer means
//! truncation or corruption, and the file is rejected.
//!
//! `SectionOffsets` is the single source of truth for the file layout; both
//! the encode and decode paths compute section positions through it.

use std::io::{self, Write};

use crc32fast::Hasher as Crc32Hasher;

use crate::error::SabreError;

/// Magic bytes: "SABR" in ASCII (header).
pub const MAGIC: [u8; 4] = *b"SABR";

/// Footer magic: "RBAS" (reversed, marks a complete file).
pub const FOOTER_MAGIC: [u8; 4] = *b"RBAS";

/// Current format version.
pub const VERSION: u8 = 1;

/// Fixed-size index file header.
#[derive(Debug, Clone)]
pub struct IndexHeader {
    pub version: u8,
    pub flags: u8,
    pub vocab_len: u32,
    pub src_corpus_len: u32,
    pub tgt_corpus_len: u32,
    pub sentences_len: u32,
    pub f2e_len: u32,
    pub e2f_len: u32,
    pub src_sa_len: u32,
    pub tgt_sa_len: u32,
    /// Global sampling seed, persisted so a loaded index reproduces the
    /// builder's sampling decisions.
    pub seed: u64,
}

impl IndexHeader {
    // 4 magic + 1 version + 1 flags + 8*4 section lengths + 8 seed + 2 reserved
    pub const SIZE: usize = 48;

    pub fn section_offsets(&self) -> SectionOffsets {
        SectionOffsets::from_header(self)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&[self.version, self.flags])?;
        for len in [
            self.vocab_len,
            self.src_corpus_len,
            self.tgt_corpus_len,
            self.sentences_len,
            self.f2e_len,
            self.e2f_len,
            self.src_sa_len,
            self.tgt_sa_len,
        ] {
            w.write_all(&len.to_le_bytes())?;
        }
        w.write_all(&self.seed.to_le_bytes())?;
        w.write_all(&[0u8; 2])?;
        Ok(())
    }

    pub fn read(bytes: &[u8]) -> Result<Self, SabreError> {
        if bytes.len() < Self::SIZE {
            return Err(SabreError::corrupt("file too short for header"));
        }
        if bytes[0..4] != MAGIC {
            return Err(SabreError::corrupt(format!(
                "bad magic: expected SABR, got {:?}",
                &bytes[0..4]
            )));
        }
        let version = bytes[4];
        if version != VERSION {
            return Err(SabreError::corrupt(format!(
                "unsupported format version {} (expected {})",
                version, VERSION
            )));
        }
        let flags = bytes[5];
        let mut lens = [0u32; 8];
        for (i, len) in lens.iter_mut().enumerate() {
            let at = 6 + i * 4;
            *len = u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        }
        let seed = u64::from_le_bytes([
            bytes[38], bytes[39], bytes[40], bytes[41], bytes[42], bytes[43], bytes[44], bytes[45],
        ]);
        Ok(Self {
            version,
            flags,
            vocab_len: lens[0],
            src_corpus_len: lens[1],
            tgt_corpus_len: lens[2],
            sentences_len: lens[3],
            f2e_len: lens[4],
            e2f_len: lens[5],
            src_sa_len: lens[6],
            tgt_sa_len: lens[7],
            seed,
        })
    }
}

/// Byte offsets of every section, computed once from the header.
#[derive(Debug, Clone, Copy)]
pub struct SectionOffsets {
    pub vocabulary: (usize, usize),
    pub src_corpus: (usize, usize),
    pub tgt_corpus: (usize, usize),
    pub sentences: (usize, usize),
    pub f2e: (usize, usize),
    pub e2f: (usize, usize),
    pub src_sa: (usize, usize),
    pub tgt_sa: (usize, usize),
    pub footer: (usize, usize),
}

impl SectionOffsets {
    pub fn from_header(h: &IndexHeader) -> Self {
        let mut pos = IndexHeader::SIZE;
        let mut next = |len: u32| {
            let start = pos;
            pos += len as usize;
            (start, pos)
        };
        let vocabulary = next(h.vocab_len);
        let src_corpus = next(h.src_corpus_len);
        let tgt_corpus = next(h.tgt_corpus_len);
        let sentences = next(h.sentences_len);
        let f2e = next(h.f2e_len);
        let e2f = next(h.e2f_len);
        let src_sa = next(h.src_sa_len);
        let tgt_sa = next(h.tgt_sa_len);
        let footer = (pos, pos + IndexFooter::SIZE);
        Self {
            vocabulary,
            src_corpus,
            tgt_corpus,
            sentences,
            f2e,
            e2f,
            src_sa,
            tgt_sa,
            footer,
        }
    }

    /// Everything before the footer.
    pub fn content_size(&self) -> usize {
        self.footer.0
    }

    pub fn total_size(&self) -> usize {
        self.footer.1
    }

    pub fn slice<'a>(&self, bytes: &'a [u8], section: (usize, usize)) -> Result<&'a [u8], SabreError> {
        bytes
            .get(section.0..section.1)
            .ok_or_else(|| SabreError::corrupt("section extends past end of file"))
    }
}

/// CRC32 footer.
#[derive(Debug, Clone)]
pub struct IndexFooter {
    pub crc32: u32,
}

impl IndexFooter {
    pub const SIZE: usize = 8;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&FOOTER_MAGIC)?;
        Ok(())
    }

    pub fn read(bytes: &[u8]) -> Result<Self, SabreError> {
        if bytes.len() < Self::SIZE {
            return Err(SabreError::corrupt("file too short for footer"));
        }
        let start = bytes.len() - Self::SIZE;
        if bytes[start + 4..] != FOOTER_MAGIC {
            return Err(SabreError::corrupt("bad footer magic; file truncated?"));
        }
        let crc32 =
            u32::from_le_bytes([bytes[start], bytes[start + 1], bytes[start + 2], bytes[start + 3]]);
        Ok(Self { crc32 })
    }

    pub fn compute_crc32(data: &[u8]) -> u32 {
        let mut hasher = Crc32Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}
