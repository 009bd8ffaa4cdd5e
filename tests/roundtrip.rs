//! Persistence: byte-identical rebuilds, save/load through plain and
//! gzipped files, and rejection of damaged files.

mod common;

use common::{diagonal, index, triple};
use sabre::{binary, DynamicPhraseTable, SabreError, SentenceTriple};

fn corpus() -> Vec<SentenceTriple> {
    vec![
        triple("das haus ist klein", "the house is small", &[(0, 0), (1, 1), (2, 2), (3, 3)]),
        triple("das haus", "the house", &[(0, 0), (1, 1)]),
        diagonal("ein kleines haus", "a small house"),
        triple("haus", "house", &[(0, 0)]),
    ]
}

#[test]
fn rebuild_is_byte_identical() {
    let a = binary::encode(&index(&corpus()).with_seed(5));
    let b = binary::encode(&index(&corpus()).with_seed(5));
    assert_eq!(a, b);
}

#[test]
fn save_load_roundtrip_plain_and_gz() {
    let dir = tempfile::tempdir().unwrap();
    let original = index(&corpus()).with_seed(77);

    for name in ["index.bin", "index.bin.gz"] {
        let path = dir.path().join(name);
        binary::save(&original, &path).unwrap();
        let loaded = binary::load(&path).unwrap();

        assert_eq!(loaded.seed(), 77);
        assert_eq!(loaded.vocab().len(), original.vocab().len());
        assert_eq!(
            loaded.corpus().sentence_count(),
            original.corpus().sentence_count()
        );

        let haus = common::ids(&original, "haus");
        assert_eq!(loaded.count(&haus, true), original.count(&haus, true));
        assert_eq!(
            loaded.sample(&haus, true, 2).samples,
            original.sample(&haus, true, 2).samples,
            "a loaded index must sample exactly like the saved one"
        );
    }
}

#[test]
fn gz_payload_is_gzip_wrapped() {
    let dir = tempfile::tempdir().unwrap();
    let original = index(&corpus());
    let plain = dir.path().join("i.bin");
    let gz = dir.path().join("i.bin.gz");
    binary::save(&original, &plain).unwrap();
    binary::save(&original, &gz).unwrap();

    let plain_bytes = std::fs::read(&plain).unwrap();
    let gz_bytes = std::fs::read(&gz).unwrap();
    // The gz payload must not be the raw format (it starts with the gzip
    // magic, not ours).
    assert_eq!(&gz_bytes[0..2], &[0x1f, 0x8b]);
    assert_eq!(&plain_bytes[0..4], b"SABR");
}

#[test]
fn queries_survive_a_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tm.bin");
    binary::save(&index(&corpus()), &path).unwrap();

    let mut before = DynamicPhraseTable::from_index(index(&corpus()));
    before.set_parallel(false);
    before.init(false, 32).unwrap();

    let mut after = DynamicPhraseTable::load(&path).unwrap();
    after.set_parallel(false);
    after.init(false, 32).unwrap();

    let query = ["das", "haus"];
    let sort = |mut v: Vec<sabre::ConcreteRule>| {
        v.sort_by(|a, b| {
            (a.src_start, a.src_end, &a.rule.key).cmp(&(b.src_start, b.src_end, &b.rule.key))
        });
        v
    };
    assert_eq!(sort(before.get_rules(&query)), sort(after.get_rules(&query)));
}

#[test]
fn damaged_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.bin");
    binary::save(&index(&corpus()), &path).unwrap();
    let good = std::fs::read(&path).unwrap();

    // Flip one byte in the middle.
    let mut bad = good.clone();
    bad[good.len() / 2] ^= 0x01;
    std::fs::write(&path, &bad).unwrap();
    assert!(matches!(
        binary::load(&path),
        Err(SabreError::CorruptIndex(_))
    ));

    // Truncate.
    std::fs::write(&path, &good[..good.len() / 2]).unwrap();
    assert!(matches!(
        binary::load(&path),
        Err(SabreError::CorruptIndex(_))
    ));

    // Not even our file.
    std::fs::write(&path, b"definitely not an index").unwrap();
    assert!(binary::load(&path).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        binary::load("/no/such/dir/index.bin"),
        Err(SabreError::Io(_))
    ));
}

#[test]
fn bitext_files_compile_to_the_same_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("c.src"), "das haus\nein haus\n").unwrap();
    std::fs::write(dir.path().join("c.tgt"), "the house\na house\n").unwrap();
    std::fs::write(dir.path().join("c.align"), "0-0 1-1\n0-0 1-1\n").unwrap();
    std::fs::write(
        dir.path().join("manifest.json"),
        r#"{"source": "c.src", "target": "c.tgt", "alignment": "c.align"}"#,
    )
    .unwrap();

    let compiled = sabre::bitext::compile(dir.path().join("manifest.json")).unwrap();
    let direct = index(&[
        triple("das haus", "the house", &[(0, 0), (1, 1)]),
        triple("ein haus", "a house", &[(0, 0), (1, 1)]),
    ]);
    assert_eq!(binary::encode(&compiled), binary::encode(&direct));
}

#[test]
fn mismatched_bitext_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("c.src"), "a b\nc\n").unwrap();
    std::fs::write(dir.path().join("c.tgt"), "A B\n").unwrap();
    std::fs::write(dir.path().join("c.align"), "0-0\n").unwrap();
    assert!(sabre::bitext::read_bitext(
        dir.path().join("c.src"),
        dir.path().join("c.tgt"),
        dir.path().join("c.align"),
    )
    .is_err());

    // A link pointing past the sentence end fails at indexing.
    let bad = triple("a", "A", &[(0, 3)]);
    assert!(matches!(
        sabre::ParallelSuffixArray::from_triples(&[bad]),
        Err(SabreError::CorruptIndex(_))
    ));
}
