use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use stardict_reader::{
    DictError, Dictionary, DictZip, MatchMode, OffsetBits, OrdinalIndex, WordIndex,
};

const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;

/// Write a `.ifo` header for a fixture dictionary.
fn write_ifo(
    dir: &Path,
    stem: &str,
    word_count: usize,
    offset_bits: u32,
    same_type_sequence: Option<&str>,
) -> PathBuf {
    let path = dir.join(format!("{}.ifo", stem));
    let mut contents = String::from("StarDict's dict ifo file\nversion=3.0.0\n");
    contents.push_str(&format!("bookname={}\n", stem));
    contents.push_str(&format!("wordcount={}\n", word_count));
    contents.push_str(&format!("idxoffsetbits={}\n", offset_bits));
    if let Some(sequence) = same_type_sequence {
        contents.push_str(&format!("sametypesequence={}\n", sequence));
    }
    let mut file = File::create(&path).expect("create ifo");
    file.write_all(contents.as_bytes()).expect("write ifo");
    path
}

/// Write a `.idx` file from `(lemma, data offset, data size)` records. The
/// caller supplies the records already in word-match order, as a dictionary
/// builder would.
fn write_idx(dir: &Path, stem: &str, records: &[(&str, u64, u32)], offset_bits: u32) {
    let path = dir.join(format!("{}.idx", stem));
    let mut out = Vec::new();
    for (lemma, offset, size) in records {
        out.extend_from_slice(lemma.as_bytes());
        out.push(0);
        match offset_bits {
            64 => out.write_u64::<BigEndian>(*offset).expect("offset"),
            _ => out.write_u32::<BigEndian>(*offset as u32).expect("offset"),
        }
        out.write_u32::<BigEndian>(*size).expect("size");
    }
    let mut file = File::create(&path).expect("create idx");
    file.write_all(&out).expect("write idx");
}

/// Write a dictzip `.dict.dz` file holding `plain`, chunked at `chunk_len`.
///
/// The header exercises the parts a reader must cope with: a foreign extra
/// subfield before the `RA` chunk table and a null-terminated file name.
fn write_dictzip(dir: &Path, stem: &str, plain: &[u8], chunk_len: usize) {
    let chunks: Vec<Vec<u8>> = plain
        .chunks(chunk_len.max(1))
        .map(|chunk| {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(chunk).expect("deflate");
            encoder.finish().expect("finish")
        })
        .collect();

    let mut ra = Vec::new();
    ra.extend_from_slice(b"RA");
    ra.write_u16::<byteorder::LittleEndian>(6 + 2 * chunks.len() as u16)
        .expect("len");
    ra.write_u16::<byteorder::LittleEndian>(1).expect("ver");
    ra.write_u16::<byteorder::LittleEndian>(chunk_len as u16)
        .expect("chlen");
    ra.write_u16::<byteorder::LittleEndian>(chunks.len() as u16)
        .expect("chcnt");
    for chunk in &chunks {
        ra.write_u16::<byteorder::LittleEndian>(chunk.len() as u16)
            .expect("chunk size");
    }

    let mut extra = Vec::new();
    extra.extend_from_slice(&[b'X', b'X', 2, 0, 0xaa, 0xbb]); // foreign subfield
    extra.extend_from_slice(&ra);

    let mut out = Vec::new();
    out.extend_from_slice(&[0x1f, 0x8b, 0x08, FEXTRA | FNAME]);
    out.extend_from_slice(&[0, 0, 0, 0]); // mtime
    out.extend_from_slice(&[0, 0xff]); // xfl, os
    out.write_u16::<byteorder::LittleEndian>(extra.len() as u16)
        .expect("xlen");
    out.extend_from_slice(&extra);
    out.extend_from_slice(b"fixture.dict\0");
    for chunk in &chunks {
        out.extend_from_slice(chunk);
    }
    out.extend_from_slice(&[0u8; 8]); // crc32 + isize, unread by the engine

    let mut file = File::create(dir.join(format!("{}.dict.dz", stem))).expect("create dz");
    file.write_all(&out).expect("write dz");
}

/// Assemble a complete dictionary from `(lemma, body)` pairs given in
/// word-match order. Returns the `.ifo` path and the uncompressed data
/// stream for reference comparisons.
fn build_dictionary(
    dir: &Path,
    stem: &str,
    entries: &[(&str, &str)],
    chunk_len: usize,
    same_type_sequence: Option<&str>,
) -> (PathBuf, Vec<u8>) {
    let mut plain = Vec::new();
    let mut records = Vec::new();
    for (lemma, body) in entries {
        let offset = plain.len() as u64;
        plain.extend_from_slice(body.as_bytes());
        records.push((*lemma, offset, body.len() as u32));
    }
    let ifo = write_ifo(dir, stem, entries.len(), 32, same_type_sequence);
    write_idx(dir, stem, &records, 32);
    write_dictzip(dir, stem, &plain, chunk_len);
    (ifo, plain)
}

fn open_and_index(ifo: &Path) -> Dictionary {
    let dictionary = Dictionary::open(ifo).expect("open dictionary");
    dictionary
        .build_ordinal_index(Duration::ZERO, |_, _| {})
        .expect("build ordinal index");
    dictionary
}

/// The representative entry set from a real archive's head and tail: mixed
/// case, a leading apostrophe and a non-ASCII lemma, all in word-match
/// order.
fn representative_records() -> Vec<(&'static str, u64, u32)> {
    vec![
        ("'cause", 0, 22712),
        ("A", 22712, 1867),
        ("a", 24579, 1396),
        ("abacus", 25975, 133),
        ("Abaddon", 26108, 110),
        ("abaft", 26218, 97),
        ("усил.", 8028778, 421),
    ]
}

#[test]
fn find_word_resolves_offsets_and_sizes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "repr", records.len(), 32, None);
    write_idx(dir.path(), "repr", &records, 32);
    let dictionary = open_and_index(&ifo);

    let mut finder = dictionary.finder().expect("finder");
    let entry = finder
        .find_word("Abaddon")
        .expect("search")
        .expect("Abaddon present");
    assert_eq!(entry.lemma(), "Abaddon");
    assert_eq!(entry.data_offset(), 26108);
    assert_eq!(entry.data_size(), 110);

    let entry = finder
        .find_word("abacus")
        .expect("search")
        .expect("abacus present");
    assert_eq!(entry.data_offset(), 25975);

    assert!(finder.find_word("abashed").expect("search").is_none());
    assert!(finder.find_word("zzz").expect("search").is_none());
}

#[test]
fn round_trip_every_lemma() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "trip", records.len(), 32, None);
    write_idx(dir.path(), "trip", &records, 32);
    let dictionary = open_and_index(&ifo);

    let mut finder = dictionary.finder().expect("finder");
    for (lemma, offset, size) in &records {
        let entry = finder
            .find_word(lemma)
            .expect("search")
            .unwrap_or_else(|| panic!("missing {}", lemma));
        assert_eq!(entry.lemma(), *lemma);
        assert_eq!(entry.data_offset(), *offset);
        assert_eq!(entry.data_size(), *size);
    }
}

#[test]
fn index_order_respects_word_comparison() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "order", records.len(), 32, None);
    write_idx(dir.path(), "order", &records, 32);
    let dictionary = open_and_index(&ifo);

    let mut finder = dictionary.finder().expect("finder");
    let mut entries = Vec::new();
    while let Some(entry) = finder.next_entry().expect("walk") {
        entries.push(entry);
    }
    assert_eq!(entries.len(), records.len());
    for pair in entries.windows(2) {
        assert_ne!(
            pair[0].compare_to(pair[1].lemma(), MatchMode::Word),
            std::cmp::Ordering::Greater,
            "{} must not sort after {}",
            pair[0].lemma(),
            pair[1].lemma()
        );
    }
}

#[test]
fn ordinal_index_matches_sequential_scan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "scan", records.len(), 32, None);
    write_idx(dir.path(), "scan", &records, 32);
    let _dictionary = open_and_index(&ifo);

    let word_index = WordIndex::new(dir.path().join("scan.idx"), OffsetBits::Bits32);
    let ordinals = OrdinalIndex::new(
        dir.path().join("scan.sparkidx"),
        WordIndex::new(dir.path().join("scan.idx"), OffsetBits::Bits32),
        records.len() as u64,
    );
    assert_eq!(ordinals.len().expect("len"), records.len() as u64);

    let mut byte_offset = 0u64;
    for ordinal in 0..records.len() as u64 {
        let sequential = word_index
            .record_at(byte_offset)
            .expect("scan")
            .expect("record");
        let via_ordinals = ordinals
            .entry_at(ordinal)
            .expect("entry_at")
            .expect("present");
        assert_eq!(sequential, via_ordinals);
        byte_offset += sequential.record_len() as u64;
    }

    // One past the end is absent, not an error.
    assert!(ordinals
        .entry_at(records.len() as u64)
        .expect("entry_at")
        .is_none());
}

#[test]
fn prefix_run_is_complete_and_case_insensitive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "prefix", records.len(), 32, None);
    write_idx(dir.path(), "prefix", &records, 32);
    let dictionary = open_and_index(&ifo);

    let lower: Vec<String> = dictionary
        .suggestions("aba")
        .expect("suggestions")
        .iter()
        .map(|e| e.lemma().to_string())
        .collect();
    assert_eq!(lower, vec!["abacus", "Abaddon", "abaft"]);

    let upper: Vec<String> = dictionary
        .suggestions("ABA")
        .expect("suggestions")
        .iter()
        .map(|e| e.lemma().to_string())
        .collect();
    assert_eq!(lower, upper);

    // The finder session reports the run member by member and then runs dry.
    let mut finder = dictionary.finder().expect("finder");
    let mut run = Vec::new();
    while let Some(entry) = finder.next_suggestion("aba").expect("suggestion") {
        run.push(entry.lemma().to_string());
    }
    assert_eq!(run, vec!["abacus", "Abaddon", "abaft"]);
    assert!(finder.next_suggestion("aba").expect("suggestion").is_none());
}

#[test]
fn suggestions_are_capped_at_forty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lemmas: Vec<String> = (0..45).map(|i| format!("word{:03}", i)).collect();
    let records: Vec<(&str, u64, u32)> = lemmas
        .iter()
        .enumerate()
        .map(|(i, lemma)| (lemma.as_str(), i as u64 * 10, 10))
        .collect();
    let ifo = write_ifo(dir.path(), "cap", records.len(), 32, None);
    write_idx(dir.path(), "cap", &records, 32);
    let dictionary = open_and_index(&ifo);

    let suggestions = dictionary.suggestions("word").expect("suggestions");
    assert_eq!(suggestions.len(), 40);
    assert_eq!(suggestions[0].lemma(), "word000");
    assert_eq!(suggestions[39].lemma(), "word039");
}

#[test]
fn empty_index_finds_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ifo = write_ifo(dir.path(), "empty", 1, 32, None);
    write_idx(dir.path(), "empty", &[], 32);
    let dictionary = Dictionary::open(&ifo).expect("open");
    let indexed = dictionary
        .build_ordinal_index(Duration::ZERO, |_, _| {})
        .expect("build");
    assert_eq!(indexed, 0);

    let mut finder = dictionary.finder().expect("finder");
    assert!(finder.find_word("anything").expect("search").is_none());
    assert!(finder.next_entry().expect("next").is_none());
    assert!(finder.next_suggestion("any").expect("suggest").is_none());
}

#[test]
fn build_reports_coalesced_progress_with_final_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "progress", records.len(), 32, None);
    write_idx(dir.path(), "progress", &records, 32);
    let dictionary = Dictionary::open(&ifo).expect("open");

    // A zero window notifies for every record, plus the guaranteed final call.
    let mut calls = Vec::new();
    dictionary
        .build_ordinal_index(Duration::ZERO, |done, total| calls.push((done, total)))
        .expect("build");
    let total = records.len() as u64;
    assert_eq!(calls.len() as u64, total + 1);
    assert_eq!(*calls.last().expect("final call"), (total, total));
    for pair in calls.windows(2) {
        assert!(pair[0].0 <= pair[1].0);
    }

    // A very wide window coalesces everything into the final call.
    let mut calls = Vec::new();
    dictionary
        .build_ordinal_index(Duration::from_secs(3600), |done, total| {
            calls.push((done, total))
        })
        .expect("rebuild");
    assert_eq!(calls, vec![(total, total)]);
}

#[test]
fn rebuild_is_atomic_and_correctly_sized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records = representative_records();
    let ifo = write_ifo(dir.path(), "atomic", records.len(), 32, None);
    write_idx(dir.path(), "atomic", &records, 32);
    let dictionary = Dictionary::open(&ifo).expect("open");

    for _ in 0..2 {
        dictionary
            .build_ordinal_index(Duration::ZERO, |_, _| {})
            .expect("build");
        let len = std::fs::metadata(dir.path().join("atomic.sparkidx"))
            .expect("sparkidx metadata")
            .len();
        assert_eq!(len, 4 * records.len() as u64);
        assert!(!dir.path().join("atomic.sparkidx.tmp").exists());
    }
}

#[test]
fn lookup_concatenates_homograph_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    // The duplicated headword opens the index, so the backward walk must
    // reach ordinal zero to find the start of the run.
    let entries: Vec<(&str, &str)> = vec![
        ("bank", "the edge of a river"),
        ("bank", "a house for money"),
        ("oak", "a tree"),
    ];
    let (ifo, _) = build_dictionary(dir.path(), "homograph", &entries, 16, Some("m"));
    let dictionary = open_and_index(&ifo);

    let raw = dictionary
        .lookup("bank")
        .expect("lookup")
        .expect("bank present");
    assert_eq!(raw, b"the edge of a river\na house for money".to_vec());

    let rendered = dictionary
        .definitions("bank")
        .expect("definitions")
        .expect("bank present");
    assert_eq!(rendered, "the edge of a river<br><br>a house for money");

    let raw = dictionary.lookup("oak").expect("lookup").expect("oak");
    assert_eq!(raw, b"a tree".to_vec());
    assert!(dictionary.lookup("elm").expect("lookup").is_none());
}

#[test]
fn dictzip_random_access_equals_whole_stream_slicing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plain: Vec<u8> = (0..400u16).flat_map(|i| i.to_be_bytes()).collect();
    write_dictzip(dir.path(), "slices", &plain, 64);

    let mut store = DictZip::open(dir.path().join("slices.dict.dz")).expect("open");
    assert_eq!(store.chunk_len(), 64);
    assert!(store.chunk_count() > 2);

    // A read spanning two chunk boundaries.
    assert_eq!(store.read(60, 140).expect("read"), plain[60..200].to_vec());
    // Within one chunk, at a boundary, and the whole stream.
    assert_eq!(store.read(5, 20).expect("read"), plain[5..25].to_vec());
    assert_eq!(store.read(64, 64).expect("read"), plain[64..128].to_vec());
    assert_eq!(store.read(0, plain.len()).expect("read"), plain);
    assert_eq!(store.read(10, 0).expect("read"), Vec::<u8>::new());

    // Past the end: an error, never a short read.
    match store.read(plain.len() as u64 - 4, 8) {
        Err(DictError::Io(_)) => {}
        other => panic!("expected Io error, got {:?}", other),
    }
}

#[test]
fn sixty_four_bit_offsets_are_decoded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records: Vec<(&str, u64, u32)> = vec![
        ("alpha", 0, 11),
        ("beta", u64::from(u32::MAX) + 17, 22),
    ];
    let ifo = write_ifo(dir.path(), "wide", records.len(), 64, None);
    write_idx(dir.path(), "wide", &records, 64);
    let dictionary = open_and_index(&ifo);

    let mut finder = dictionary.finder().expect("finder");
    let entry = finder.find_word("beta").expect("search").expect("beta");
    assert_eq!(entry.data_offset(), u64::from(u32::MAX) + 17);
    assert_eq!(entry.data_size(), 22);
}

#[test]
fn missing_data_file_surfaces_as_lookup_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records: Vec<(&str, u64, u32)> = vec![("solo", 0, 4)];
    let ifo = write_ifo(dir.path(), "nodata", records.len(), 32, None);
    write_idx(dir.path(), "nodata", &records, 32);
    let dictionary = open_and_index(&ifo);

    match dictionary.lookup("solo") {
        Err(DictError::Lookup { book, source }) => {
            assert_eq!(book, "nodata");
            assert!(matches!(*source, DictError::NotFound(_)));
        }
        other => panic!("expected Lookup error, got {:?}", other),
    }
}

#[test]
fn missing_ordinal_index_surfaces_as_lookup_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let records: Vec<(&str, u64, u32)> = vec![("solo", 0, 4)];
    let ifo = write_ifo(dir.path(), "noindex", records.len(), 32, None);
    write_idx(dir.path(), "noindex", &records, 32);
    let dictionary = Dictionary::open(&ifo).expect("open");
    assert!(!dictionary.has_ordinal_index());

    match dictionary.finder() {
        Err(DictError::Lookup { book, source }) => {
            assert_eq!(book, "noindex");
            assert!(matches!(*source, DictError::NotFound(_)));
        }
        other => panic!("expected Lookup error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn non_ascii_prefixes_search_case_variants() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Capital IO (U+0401) sorts before small io (U+0451) raw, and the ASCII
    // fold leaves both alone.
    let records: Vec<(&str, u64, u32)> = vec![("Ёж", 0, 10), ("ёж", 10, 12)];
    let ifo = write_ifo(dir.path(), "hedgehog", records.len(), 32, None);
    write_idx(dir.path(), "hedgehog", &records, 32);
    let dictionary = open_and_index(&ifo);

    let lemmas: Vec<String> = dictionary
        .suggestions("ёж")
        .expect("suggestions")
        .iter()
        .map(|e| e.lemma().to_string())
        .collect();
    assert_eq!(lemmas.len(), 2);
    assert!(lemmas.contains(&"ёж".to_string()));
    assert!(lemmas.contains(&"Ёж".to_string()));
}
