mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use amc_reader::{
    decode_slice, AmcError, ByteCursor, CatalogDecoder, DecodeOptions, DecoderState, FieldValue,
    TruncationPolicy,
};
use common::{
    cover_bytes, fixture_path, three_movie_catalog, CatalogBuilder, CustomDef, Extra, Movie,
    Picture,
};

fn decoder(data: &[u8], options: DecodeOptions) -> CatalogDecoder<&[u8]> {
    CatalogDecoder::new(ByteCursor::from_slice(data), options).unwrap()
}

#[test]
fn three_records_end_to_end() {
    let data = three_movie_catalog();
    let catalog = decode_slice(&data, DecodeOptions::default()).unwrap();

    assert_eq!(catalog.header.version, 42);
    assert_eq!(catalog.header.signature, "AMC_4.2 Ant Movie Catalog 4.2.0.0");
    assert_eq!(catalog.header.properties.owner_name, "Ann Owner");
    assert_eq!(catalog.header.properties.owner_site, "https://example.org");
    assert_eq!(catalog.header.field_count(), 0);
    assert!(catalog.truncation.is_none());

    let titles: Vec<_> = catalog.records.iter().map(|r| r.title().unwrap()).collect();
    assert_eq!(titles, ["Metropolis", "Alien", "Brazil"]);
    let indexes: Vec<_> = catalog.records.iter().map(|r| r.index).collect();
    assert_eq!(indexes, [0, 1, 2]);

    let cover = catalog.records[1].fields.blob("picture").unwrap();
    assert_eq!(cover.len(), 50);
    assert_eq!(cover.declared_len(), 50);
    assert_eq!(cover.data(), cover_bytes(50).as_slice());

    // Movies without a cover still carry a present, empty picture.
    for i in [0, 2] {
        let blob = catalog.records[i].fields.blob("picture").unwrap();
        assert!(blob.is_empty(), "record {} should have an empty picture", i);
    }
}

#[test]
fn positions_and_offsets_are_monotonic() {
    let data = three_movie_catalog();
    let mut decoder = decoder(&data, DecodeOptions::default());
    assert_eq!(decoder.state(), DecoderState::HeaderRead);

    let mut last_position = decoder.position();
    let mut last_offset = None;
    let mut expected_index = 0;
    while let Some(record) = decoder.next_record().unwrap() {
        assert_eq!(decoder.state(), DecoderState::Reading);
        assert!(decoder.position() > last_position);
        assert_eq!(record.offset, last_position, "record starts where the previous ended");
        if let Some(offset) = last_offset {
            assert!(record.offset > offset);
        }
        assert_eq!(record.index, expected_index);
        last_position = decoder.position();
        last_offset = Some(record.offset);
        expected_index += 1;
    }

    assert_eq!(expected_index, 3);
    assert_eq!(decoder.state(), DecoderState::Done);
    assert_eq!(decoder.position(), data.len() as u64);
    assert_eq!(decoder.records_read(), 3);
    assert!(decoder.next_record().unwrap().is_none());
}

#[test]
fn indexing_is_stable_across_passes() {
    let data = three_movie_catalog();
    let first = decode_slice(&data, DecodeOptions::default()).unwrap();

    let mut decoder = decoder(&data, DecodeOptions::default());
    let second: Vec<_> = decoder.records().collect::<Result<_, _>>().unwrap();

    assert_eq!(first.records, second);
}

#[test]
fn header_only_catalog_has_no_records() {
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("", "", "", "");
    b.custom_fields(&[]);
    let data = b.finish();

    let mut decoder = decoder(&data, DecodeOptions::default());
    assert!(decoder.next_record().unwrap().is_none());
    assert_eq!(decoder.state(), DecoderState::Done);
    assert_eq!(decoder.records().count(), 0);
}

#[test]
fn version_gated_fields() {
    let versions = [(1, 0), (3, 0), (3, 3), (3, 5), (4, 0), (4, 1), (4, 2)];
    for (major, minor) in versions {
        let v = major * 10 + minor;
        let mut b = CatalogBuilder::new(major, minor);
        b.properties("owner", "mail", "site", "about");
        b.custom_fields(&[CustomDef::new("src", "Source", "ftString")]);
        let movie = Movie {
            media_type: "Blu-ray".to_string(),
            writer: "W".to_string(),
            color_tag: 15,
            custom: vec!["x".to_string()],
            extras: vec![Extra {
                title: "Making of".to_string(),
                ..Extra::default()
            }],
            ..Movie::titled(1, "First")
        };
        b.movie(&movie);
        b.movie(&Movie::titled(2, "Second"));
        let data = b.finish();

        let catalog = decode_slice(&data, DecodeOptions::default())
            .unwrap_or_else(|e| panic!("version {}: {}", v, e));
        let header = &catalog.header;
        assert_eq!(header.version, v);
        assert_eq!(header.properties.owner_site, "site", "version {}", v);
        assert_eq!(header.properties.description, "about", "version {}", v);
        assert_eq!(header.custom_fields.len(), usize::from(v >= 40), "version {}", v);
        assert_eq!(header.column_settings.is_some(), v >= 40, "version {}", v);

        assert_eq!(catalog.records.len(), 2, "version {}", v);
        let fields = &catalog.records[0].fields;
        assert_eq!(fields.text("media_type"), (v >= 33).then_some("Blu-ray"), "version {}", v);
        assert_eq!(fields.text("writer"), (v >= 42).then_some("W"), "version {}", v);
        assert_eq!(fields.integer("color_tag"), (v >= 41).then_some(2), "version {}", v);
        assert_eq!(fields.integer("rating"), Some(if v < 35 { 70 } else { 7 }), "version {}", v);
        assert_eq!(fields.text("custom.src"), (v >= 40).then_some("x"), "version {}", v);
        assert_eq!(
            fields.group("extras").map(|e| e.len()),
            (v >= 42).then_some(1),
            "version {}",
            v
        );
        assert_eq!(catalog.records[1].title(), Some("Second"), "version {}", v);
    }
}

#[test]
fn list_custom_field_definition() {
    let mut b = CatalogBuilder::new(4, 1);
    b.properties("", "", "", "");
    b.custom_fields(&[
        CustomDef {
            list_values: vec!["DVD".to_string(), "VHS".to_string(), "DVD".to_string()],
            ..CustomDef::new("fmt", "Format", "ftList")
        },
        CustomDef::new("loc", "Location", "ftString"),
    ]);
    b.movie(&Movie {
        custom: vec!["VHS".to_string(), "Shelf 2".to_string()],
        ..Movie::titled(1, "Heat")
    });
    let catalog = decode_slice(&b.finish(), DecodeOptions::default()).unwrap();

    let defs = &catalog.header.custom_fields;
    assert_eq!(defs.len(), 2);
    assert_eq!(defs[0].field_type, "ftList");
    assert_eq!(defs[0].list_values, ["DVD", "VHS", "DVD"]);
    assert_eq!(defs[1].tag, "loc");
    assert!(defs[1].list_values.is_empty());

    let fields = &catalog.records[0].fields;
    assert_eq!(fields.text("custom.fmt"), Some("VHS"));
    assert_eq!(fields.text("custom.loc"), Some("Shelf 2"));
}

#[test]
fn list_definition_with_many_values() {
    let values: Vec<String> = (0..1001).map(|i| format!("Shelf {}", i)).collect();
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("", "", "", "");
    b.custom_fields(&[CustomDef {
        list_values: values.clone(),
        ..CustomDef::new("loc", "Location", "ftList")
    }]);
    b.movie(&Movie {
        custom: vec!["Shelf 1000".to_string()],
        ..Movie::titled(1, "Playtime")
    });
    let catalog = decode_slice(&b.finish(), DecodeOptions::default()).unwrap();

    assert_eq!(catalog.header.custom_fields[0].list_values, values);
    assert_eq!(catalog.records.len(), 1);
    assert_eq!(catalog.records[0].title(), Some("Playtime"));
    assert_eq!(catalog.records[0].fields.text("custom.loc"), Some("Shelf 1000"));
}

#[test]
fn extras_with_pictures() {
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("", "", "", "");
    b.custom_fields(&[]);
    b.movie(&Movie {
        extras: vec![
            Extra {
                checked: true,
                tag: "t1".to_string(),
                title: "Poster".to_string(),
                category: "Art".to_string(),
                picture: Some(Picture::new("poster.gif", vec![1, 2, 3])),
            },
            Extra {
                title: "Notes".to_string(),
                ..Extra::default()
            },
        ],
        ..Movie::titled(1, "Solaris")
    });
    let catalog = decode_slice(&b.finish(), DecodeOptions::default()).unwrap();

    let extras = catalog.records[0].fields.group("extras").unwrap();
    assert_eq!(extras.len(), 2);
    assert_eq!(extras[0].boolean("checked"), Some(true));
    assert_eq!(extras[0].text("category"), Some("Art"));
    assert_eq!(extras[0].text("picture_path"), Some("poster.gif"));
    assert_eq!(extras[0].blob("picture").unwrap().data(), &[1, 2, 3]);
    assert_eq!(extras[1].text("title"), Some("Notes"));
    assert!(extras[1].blob("picture").unwrap().is_empty());
}

/// Two complete movies, then a third whose 100-byte cover is cut after 40 bytes.
fn truncated_catalog() -> (Vec<u8>, u64) {
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("", "", "", "");
    b.custom_fields(&[]);
    b.movie(&Movie::titled(1, "Alpha"));
    b.movie(&Movie::titled(2, "Beta"));
    let third_offset = b.len() as u64;
    b.movie(&Movie {
        picture: Some(Picture::new("gamma.jpg", cover_bytes(100))),
        ..Movie::titled(3, "Gamma")
    });
    let mut data = b.finish();
    // Drop the extras count and the last 60 bytes of the cover.
    data.truncate(data.len() - 4 - 60);
    (data, third_offset)
}

#[test]
fn truncation_mid_blob_reports_partial_record() {
    let (data, third_offset) = truncated_catalog();
    let mut decoder = decoder(&data, DecodeOptions::default());

    assert_eq!(decoder.next_record().unwrap().unwrap().title(), Some("Alpha"));
    assert_eq!(decoder.next_record().unwrap().unwrap().title(), Some("Beta"));

    match decoder.next_record() {
        Err(AmcError::TruncatedRecord {
            index,
            offset,
            partial,
            source,
        }) => {
            assert_eq!(index, 2);
            assert_eq!(offset, third_offset);
            assert_eq!(partial.index, 2);
            assert_eq!(partial.title(), Some("Gamma"));
            assert_eq!(partial.fields.text("picture_path"), Some("gamma.jpg"));
            assert!(partial.fields.get("picture").is_none());
            assert!(matches!(
                *source,
                AmcError::InvalidLengthPrefix {
                    length: 100,
                    remaining: 40,
                    ..
                }
            ));
        }
        other => panic!("expected a truncated record, got {:?}", other),
    }

    assert_eq!(decoder.state(), DecoderState::Failed);
    assert!(decoder.next_record().is_err());
    assert_eq!(decoder.records().count(), 0);
}

#[test]
fn truncation_can_drop_the_partial_record() {
    let (data, third_offset) = truncated_catalog();
    let options = DecodeOptions {
        truncation: TruncationPolicy::DropPartial,
        ..DecodeOptions::default()
    };
    let catalog = decode_slice(&data, options).unwrap();

    assert_eq!(catalog.records.len(), 2);
    let truncation = catalog.truncation.unwrap();
    assert_eq!(truncation.index, 2);
    assert_eq!(truncation.offset, third_offset);
}

#[test]
fn stream_ending_inside_fixed_fields_is_truncation() {
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("", "", "", "");
    b.custom_fields(&[]);
    b.int(5).int(0).int(0);
    let data = b.finish();

    match decode_slice(&data, DecodeOptions::default()) {
        Err(AmcError::TruncatedRecord { index, partial, source, .. }) => {
            assert_eq!(index, 0);
            assert_eq!(partial.number(), Some(5));
            assert_eq!(partial.fields.len(), 3);
            assert!(source.is_end_of_stream());
        }
        other => panic!("expected a truncated record, got {:?}", other),
    }
}

#[test]
fn negative_length_prefix_is_corruption_not_truncation() {
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("", "", "", "");
    b.custom_fields(&[]);
    for _ in 0..11 {
        b.int(0);
    }
    b.boolean(false);
    let media_offset = b.len() as u64;
    b.int(-5);
    b.text("padding that is never read");
    let data = b.finish();

    let mut decoder = decoder(&data, DecodeOptions::default());
    match decoder.next_record() {
        Err(AmcError::InvalidLengthPrefix { offset, length, .. }) => {
            assert_eq!(offset, media_offset);
            assert_eq!(length, -5);
        }
        other => panic!("expected an invalid length prefix, got {:?}", other),
    }
    assert_eq!(decoder.state(), DecoderState::Failed);
}

#[test]
fn cancellation_is_checked_between_records() {
    let data = three_movie_catalog();
    let flag = Arc::new(AtomicBool::new(false));
    let options = DecodeOptions {
        cancel: Some(flag.clone()),
        ..DecodeOptions::default()
    };
    let mut decoder = decoder(&data, options);

    assert!(decoder.next_record().unwrap().is_some());
    flag.store(true, Ordering::Relaxed);
    let err = decoder.next_record().unwrap_err();
    assert!(matches!(err, AmcError::Cancelled { records: 1 }));
    assert_eq!(decoder.state(), DecoderState::Failed);
}

#[test]
fn cancellation_before_the_first_record() {
    let data = three_movie_catalog();
    let options = DecodeOptions {
        cancel: Some(Arc::new(AtomicBool::new(true))),
        ..DecodeOptions::default()
    };
    let err = decode_slice(&data, options).unwrap_err();
    assert!(matches!(err, AmcError::Cancelled { records: 0 }));
}

#[test]
fn missing_signature_is_rejected() {
    let mut data = b"PK\x03\x04 definitely not a catalog".to_vec();
    data.resize(200, 0);
    let err = decode_slice(&data, DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, AmcError::InvalidSignature));

    let err = decode_slice(b" AMC_4", DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, AmcError::InvalidSignature));
}

#[test]
fn unreadable_version_falls_back_to_oldest_layout() {
    let mut b = CatalogBuilder::with_signature(" AMC_?.? custom build", 10);
    b.properties("owner", "", "", "");
    b.movie(&Movie::titled(1, "Old"));
    let catalog = decode_slice(&b.finish(), DecodeOptions::default()).unwrap();

    assert_eq!(catalog.header.version, 10);
    assert_eq!(catalog.records.len(), 1);
    assert_eq!(catalog.records[0].title(), Some("Old"));
    assert_eq!(catalog.records[0].fields.integer("rating"), Some(70));
}

#[test]
fn encoding_override() {
    let build = || {
        let mut b = CatalogBuilder::new(4, 2);
        b.raw_text("Zoë".as_bytes()).text("").text("").text("");
        b.custom_fields(&[]);
        b.finish()
    };

    let utf8 = DecodeOptions {
        encoding: Some("utf-8".to_string()),
        ..DecodeOptions::default()
    };
    let catalog = decode_slice(&build(), utf8).unwrap();
    assert_eq!(catalog.header.properties.owner_name, "Zoë");
    assert_eq!(catalog.header.encoding, encoding_rs::UTF_8);

    let catalog = decode_slice(&build(), DecodeOptions::default()).unwrap();
    assert_eq!(catalog.header.properties.owner_name, "ZoÃ«");
}

#[test]
fn golden_fixture() {
    let mut decoder =
        CatalogDecoder::open(fixture_path(&["sample-4.2.amc"]), DecodeOptions::default()).unwrap();

    let header = decoder.header().clone();
    assert_eq!(header.version, 42);
    assert_eq!(header.signature, "AMC_4.2 Ant Movie Catalog 4.2.0.0");
    assert_eq!(header.properties.owner_name, "Golden Owner");
    assert_eq!(header.properties.owner_mail, "owner@example.org");
    assert_eq!(header.properties.description, "Golden fixture catalog");
    assert_eq!(header.column_settings.as_deref(), Some("columns"));
    let tags: Vec<_> = header.custom_fields.iter().map(|d| d.tag.as_str()).collect();
    assert_eq!(tags, ["Src", "Fmt"]);
    assert_eq!(header.custom_fields[1].list_values, ["DVD", "Blu-ray"]);
    assert_eq!(decoder.position(), 310);

    let records: Vec<_> = decoder.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 2);

    let amelie = &records[0];
    assert_eq!(amelie.offset, 310);
    assert_eq!(amelie.number(), Some(17));
    assert_eq!(amelie.title(), Some("Amélie"));
    assert_eq!(
        amelie.fields.text("translated_title"),
        Some("Le Fabuleux Destin d'Amélie Poulain")
    );
    assert_eq!(amelie.fields.text("writer"), Some("Guillaume Laurant"));
    assert_eq!(amelie.fields.integer("rating"), Some(85));
    assert_eq!(amelie.fields.integer("user_rating"), Some(90));
    assert_eq!(amelie.fields.integer("color_tag"), Some(1));
    assert_eq!(amelie.fields.integer("length"), Some(122));
    assert_eq!(amelie.fields.boolean("checked"), Some(true));
    assert_eq!(amelie.fields.text("picture_path"), Some("covers\\amelie.jpg"));
    assert_eq!(amelie.fields.blob("picture").unwrap().len(), 12);
    assert_eq!(amelie.fields.text("custom.Src"), Some("Import"));
    assert_eq!(amelie.fields.text("custom.Fmt"), Some("DVD"));
    let extras = amelie.fields.group("extras").unwrap();
    assert_eq!(extras.len(), 1);
    assert_eq!(extras[0].text("title"), Some("Trailer"));
    assert_eq!(extras[0].get("picture").map(FieldValue::kind_name), Some("blob"));
    assert_eq!(extras[0].blob("picture").unwrap().data(), b"GIF89a\x01\x00");

    let stalker = &records[1];
    assert_eq!(stalker.offset, 701);
    assert_eq!(stalker.title(), Some("Stalker"));
    assert_eq!(stalker.fields.integer("rating"), Some(-1));
    assert_eq!(stalker.fields.integer("color_tag"), Some(0));
    assert_eq!(stalker.fields.boolean("checked"), Some(false));
    assert!(stalker.fields.blob("picture").unwrap().is_empty());
    assert_eq!(stalker.fields.text("custom.Src"), Some(""));
    assert_eq!(stalker.fields.group("extras").map(|e| e.len()), Some(0));

    assert_eq!(decoder.state(), DecoderState::Done);
    let stats = decoder.stats();
    assert_eq!(stats.bytes_read, 907);
    assert_eq!(stats.blobs_read, 3);
}
