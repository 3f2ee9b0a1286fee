use std::{num::NonZeroUsize, path::Path};

use csv::ReaderBuilder;
use tagscan::{
    Registry, Tag,
    avec::{ScanOptions, reader, slice},
};

const PATH: &str = "fixtures/id3v2.csv";

#[test]
fn scan_slice_fixtures() {
    for Case { name, input, expected } in cases(PATH) {
        let (tags, _) = tagscan::avec::scan_slice(&input).unwrap();
        assert_eq!(summarise(&tags), expected, "{name}");
    }
}

#[test]
fn scan_reader_fixtures() {
    for Case { name, input, expected } in cases(PATH) {
        let tags = tagscan::avec::scan_reader(&mut input.as_slice()).unwrap();
        assert_eq!(summarise(&tags), expected, "{name}");
    }
}

#[test]
fn scan_fixtures_single_worker() {
    let options = ScanOptions::default().workers(NonZeroUsize::MIN);

    for Case { name, input, expected } in cases(PATH) {
        let tags = reader::scan_with(&mut input.as_slice(), Registry::global(), &options).unwrap();
        assert_eq!(summarise(&tags), expected, "{name}");
    }
}

#[test]
fn scan_fixtures_many_workers() {
    let options = ScanOptions::default().workers(NonZeroUsize::new(8).unwrap());

    for Case { name, input, expected } in cases(PATH) {
        let (tags, _) = slice::scan_with(&input, Registry::global(), &options).unwrap();
        assert_eq!(summarise(&tags), expected, "{name}");
    }
}

struct Case {
    name: String,
    input: Vec<u8>,
    expected: Vec<String>,
}

/// Each record holds a case name, the input as hex, then one column per
/// expected tag: `format:ID=length ID=length`.
fn cases(path: impl AsRef<Path>) -> Vec<Case> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_path(path)
        .unwrap();

    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            let mut fields = r.iter();
            Case {
                name: fields.next().unwrap().to_string(),
                input: hex(fields.next().unwrap()),
                expected: fields.map(str::to_string).collect(),
            }
        })
        .collect()
}

fn summarise(tags: &[Tag]) -> Vec<String> {
    tags.iter()
        .map(|tag| {
            let fields = tag
                .fields()
                .iter()
                .map(|f| format!("{}={}", String::from_utf8_lossy(f.identifier()), f.byte_length()))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{}:{fields}", tag.format())
        })
        .collect()
}

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}
