use std::sync::Arc;

use mzlibmatch::{
    AveragineModel, Deisotoper, FeatureRow, LibraryField, LibrarySelection, LibrarySpectrum, MatchCriteria, MsLevelFilter,
    MzTolerance, PercentTolerance, QueryScan, RtTolerance, ScanPolarity, SpectralLibrary,
};
use mzlibmatcher::{AllFragmentScans, LibraryMatchError, LibraryMatcher, MostSignalsScan};
use mzpeaks::CentroidPeak;

const FRAGMENTS: [(f64, f32); 5] = [
    (60.0, 20.0),
    (85.0, 100.0),
    (110.0, 45.0),
    (140.0, 30.0),
    (171.0, 10.0),
];

fn to_peaks(data: &[(f64, f32)]) -> Vec<CentroidPeak> {
    data.iter()
        .enumerate()
        .map(|(i, (mz, int))| CentroidPeak::new(*mz, *int, i as u32))
        .collect()
}

fn library_entry(name: &str, precursor_mz: f64, peaks: &[(f64, f32)]) -> LibrarySpectrum {
    LibrarySpectrum::new(to_peaks(peaks))
        .with_field(LibraryField::Name, name)
        .with_field(LibraryField::PrecursorMz, precursor_mz)
}

fn library(entries: Vec<LibrarySpectrum>) -> Vec<SpectralLibrary> {
    vec![SpectralLibrary::new(
        "test-library",
        entries.into_iter().map(Arc::new).collect(),
    )]
}

fn msms_scan(id: &str, peaks: &[(f64, f32)]) -> QueryScan {
    QueryScan::new(id, 2, Some(to_peaks(peaks))).with_polarity(ScanPolarity::Positive)
}

fn precursor_rt_criteria() -> MatchCriteria {
    MatchCriteria {
        precursor_mz_tolerance: MzTolerance::new(0.001, 5.0),
        rt_tolerance: Some(RtTolerance::Absolute(0.05)),
        min_match: 4,
        ..Default::default()
    }
}

fn fragmented_row(id: u32) -> FeatureRow {
    FeatureRow::new(id)
        .with_average_mz(200.1005)
        .with_average_rt(5.01)
        .with_fragment_scan(msms_scan("scan=1", &FRAGMENTS))
}

#[test_log::test]
fn test_precursor_and_rt_match() {
    let libs = library(vec![
        library_entry("target", 200.1, &FRAGMENTS).with_field(LibraryField::RetentionTime, 5.0f32),
        library_entry("wrong-precursor", 230.0, &FRAGMENTS),
        library_entry("wrong-rt", 200.1, &FRAGMENTS).with_field(LibraryField::RetentionTime, 7.0f32),
    ]);
    let matcher =
        LibraryMatcher::new(precursor_rt_criteria(), &libs, &LibrarySelection::All, 2).unwrap();
    let mut rows = vec![fragmented_row(1)];
    let summary = matcher.match_rows(&mut rows, &AllFragmentScans);

    assert!(!summary.cancelled);
    assert_eq!(summary.tally.matches, 1);
    assert_eq!(summary.tally.errors, 0);
    assert_eq!(rows[0].spectral_matches.len(), 1);
    let hit = &rows[0].spectral_matches[0];
    assert_eq!(hit.entry.name(), "target");
    assert_eq!(hit.similarity.overlap, 5);
    assert_eq!(hit.query_mz, Some(200.1005));
    assert_eq!(hit.query_rt, Some(5.01));
    assert_eq!(matcher.progress().fraction(), 1.0);
    assert_eq!(matcher.progress().matches(), 1);
}

#[test_log::test]
fn test_missing_ccs_does_not_exclude() {
    let libs = library(vec![
        library_entry("target", 200.1, &FRAGMENTS).with_field(LibraryField::Ccs, 150.0f32)
    ]);
    let criteria = MatchCriteria {
        ccs_tolerance: Some(PercentTolerance::new(0.05)),
        ..precursor_rt_criteria()
    };
    let matcher = LibraryMatcher::new(criteria, &libs, &LibrarySelection::All, 1).unwrap();
    let mut rows = vec![fragmented_row(1)];
    matcher.match_rows(&mut rows, &AllFragmentScans);
    assert_eq!(rows[0].spectral_matches.len(), 1);
    assert_eq!(rows[0].spectral_matches[0].ccs_relative_error, None);

    let mut rows = vec![fragmented_row(2).with_average_ccs(180.0)];
    matcher.match_rows(&mut rows, &AllFragmentScans);
    assert!(rows[0].spectral_matches.is_empty());
}

#[test_log::test]
fn test_ms1_search_skips_precursor_steps() {
    let ms1_peaks = [
        (148.0, 30.0),
        (149.0, 60.0),
        (150.0, 100.0),
        (151.0, 20.0),
        (152.0, 5.0),
    ];
    let libs = library(vec![
        library_entry("far-precursor", 150.0, &ms1_peaks),
        LibrarySpectrum::new(to_peaks(&ms1_peaks)).with_field(LibraryField::Name, "no-precursor"),
    ]);
    let criteria = MatchCriteria {
        ms_level_filter: MsLevelFilter::Ms1Only,
        remove_precursor: true,
        crop_to_overlap: true,
        ..Default::default()
    };
    let matcher = LibraryMatcher::new(criteria, &libs, &LibrarySelection::All, 1).unwrap();
    assert_eq!(matcher.entries().len(), 2);

    let mut rows = vec![FeatureRow::new(1)
        .with_average_mz(400.0)
        .with_representative_scan(QueryScan::new("ms1=1", 1, Some(to_peaks(&ms1_peaks))))];
    let summary = matcher.match_rows(&mut rows, &AllFragmentScans);
    assert_eq!(summary.tally.matches, 2);
    for hit in rows[0].spectral_matches.iter() {
        assert_eq!(hit.similarity.overlap, 5);
        assert_eq!(hit.scan.id, "ms1=1");
    }
}

#[test_log::test]
fn test_isotope_pattern_requirement() {
    let peaks = [
        (100.0, 100.0),
        (101.0034, 30.0),
        (150.0, 80.0),
        (151.0034, 20.0),
        (180.0, 40.0),
    ];
    let libs = library(vec![library_entry("chlorinated", 300.0, &peaks)]);
    let row = || {
        FeatureRow::new(1)
            .with_average_mz(300.0)
            .with_fragment_scan(msms_scan("scan=1", &peaks))
    };

    let criteria = MatchCriteria {
        min_isotope_signals: Some(3),
        ..Default::default()
    };
    let matcher = LibraryMatcher::new(criteria.clone(), &libs, &LibrarySelection::All, 1).unwrap();
    let mut rows = vec![row()];
    matcher.match_rows(&mut rows, &AllFragmentScans);
    assert!(rows[0].spectral_matches.is_empty());

    let criteria = MatchCriteria {
        min_isotope_signals: Some(2),
        ..criteria
    };
    let matcher = LibraryMatcher::new(criteria, &libs, &LibrarySelection::All, 1).unwrap();
    let mut rows = vec![row()];
    matcher.match_rows(&mut rows, &AllFragmentScans);
    assert_eq!(rows[0].spectral_matches.len(), 1);
}

#[test_log::test]
fn test_runs_are_repeatable() {
    let mut shifted = FRAGMENTS;
    shifted[2].1 = 90.0;
    let libs = library(vec![
        library_entry("a", 200.1, &FRAGMENTS),
        library_entry("b", 200.1004, &shifted),
        library_entry("c", 200.1001, &FRAGMENTS[..4]),
    ]);
    let matcher = LibraryMatcher::new(
        MatchCriteria {
            min_match: 4,
            ..precursor_rt_criteria()
        },
        &libs,
        &LibrarySelection::All,
        4,
    )
    .unwrap();
    let rows: Vec<FeatureRow> = (0..16)
        .map(|i| {
            fragmented_row(i)
                .with_fragment_scan(msms_scan("scan=2", &shifted))
                .with_fragment_scan(msms_scan("scan=3", &FRAGMENTS[1..]))
        })
        .collect();

    let summarize = |rows: &[FeatureRow]| -> Vec<Vec<(String, String, f64)>> {
        rows.iter()
            .map(|row| {
                row.spectral_matches
                    .iter()
                    .map(|m| (m.entry.name(), m.scan.id.clone(), m.score()))
                    .collect()
            })
            .collect()
    };

    let mut first = rows.clone();
    let mut second = rows.clone();
    matcher.match_rows(&mut first, &AllFragmentScans);
    matcher.match_rows(&mut second, &AllFragmentScans);
    let first = summarize(&first);
    assert_eq!(first, summarize(&second));
    assert_eq!(first[0].len(), 3);
    for row in first.iter() {
        for pair in row.windows(2) {
            assert!(pair[0].2 >= pair[1].2);
        }
    }
}

#[test_log::test]
fn test_missing_mass_list_is_counted() {
    let libs = library(vec![library_entry("target", 200.1, &FRAGMENTS)]);
    let matcher =
        LibraryMatcher::new(precursor_rt_criteria(), &libs, &LibrarySelection::All, 2).unwrap();
    let mut rows = vec![
        FeatureRow::new(1)
            .with_average_mz(200.1005)
            .with_fragment_scan(QueryScan::new("scan=9", 2, None)),
        fragmented_row(2),
        FeatureRow::new(3).with_average_mz(200.1),
    ];
    let summary = matcher.match_rows(&mut rows, &AllFragmentScans);
    assert_eq!(summary.tally.errors, 1);
    assert_eq!(summary.tally.rows, 2);
    assert_eq!(summary.tally.matches, 1);
    assert_eq!(matcher.progress().errors(), 1);
    assert!(rows[0].spectral_matches.is_empty());
    assert_eq!(rows[1].spectral_matches.len(), 1);
}

#[test_log::test]
fn test_cancelled_run_starts_no_rows() {
    let libs = library(vec![library_entry("target", 200.1, &FRAGMENTS)]);
    let matcher =
        LibraryMatcher::new(precursor_rt_criteria(), &libs, &LibrarySelection::All, 2).unwrap();
    matcher.cancellation().cancel();
    let mut rows = vec![fragmented_row(1), fragmented_row(2)];
    let summary = matcher.match_rows(&mut rows, &MostSignalsScan);
    assert!(summary.cancelled);
    assert_eq!(summary.tally.rows, 0);
    assert!(rows.iter().all(|r| r.spectral_matches.is_empty()));
    assert_eq!(matcher.progress().finished(), 0);

    matcher.cancellation().reset();
    let summary = matcher.match_rows(&mut rows, &MostSignalsScan);
    assert!(!summary.cancelled);
    assert_eq!(summary.tally.matches, 2);
}

#[test_log::test]
fn test_match_single_scan() {
    let libs = library(vec![
        library_entry("target", 200.1, &FRAGMENTS),
        library_entry("other", 250.0, &FRAGMENTS),
    ]);
    let matcher =
        LibraryMatcher::new(precursor_rt_criteria(), &libs, &LibrarySelection::All, 1).unwrap();
    let scan = Arc::new(msms_scan("scan=5", &FRAGMENTS).with_precursor_mz(250.0));

    let hits = matcher.match_scan(&scan, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry.name(), "other");

    let hits = matcher.match_scan(&scan, Some(200.1005)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry.name(), "target");
    assert_eq!(hits[0].query_mz, Some(200.1005));
    assert_eq!(matcher.progress().fraction(), 1.0);

    let empty = Arc::new(QueryScan::new("scan=6", 2, None));
    assert!(matcher.match_scan(&empty, None).is_err());
}

#[test_log::test]
fn test_averagine_deisotoping_keeps_fragments() {
    let libs = library(vec![
        library_entry("target", 200.1, &FRAGMENTS).with_field(LibraryField::RetentionTime, 5.0f32)
    ]);
    let criteria = MatchCriteria {
        deisotoping: Some(Deisotoper::Averagine {
            model: AveragineModel::Peptide,
            error_tolerance_ppm: 20.0,
            maximum_charge: 1,
            score_threshold: 10.0,
            max_missed_peaks: 1,
        }),
        ..precursor_rt_criteria()
    };
    let matcher = LibraryMatcher::new(criteria, &libs, &LibrarySelection::All, 1).unwrap();
    assert_eq!(matcher.entries()[0].peaks.len(), FRAGMENTS.len());

    let mut rows = vec![fragmented_row(1)];
    let summary = matcher.match_rows(&mut rows, &AllFragmentScans);
    assert_eq!(summary.tally.matches, 1);
    assert_eq!(rows[0].spectral_matches[0].entry.name(), "target");
    assert_eq!(rows[0].spectral_matches[0].similarity.overlap, 5);
}

#[test_log::test]
fn test_cancelled_scan_search() {
    let libs = library(vec![
        library_entry("target", 200.1, &FRAGMENTS),
        library_entry("other", 200.1002, &FRAGMENTS),
    ]);
    let matcher =
        LibraryMatcher::new(precursor_rt_criteria(), &libs, &LibrarySelection::All, 1).unwrap();
    let scan = Arc::new(msms_scan("scan=7", &FRAGMENTS).with_precursor_mz(200.1005));

    matcher.cancellation().cancel();
    let hits = matcher.match_scan(&scan, None).unwrap();
    assert!(hits.is_empty());
    assert_eq!(matcher.progress().matches(), 0);

    matcher.cancellation().reset();
    let hits = matcher.match_scan(&scan, None).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn test_setup_failures() {
    let libs = library(vec![library_entry("target", 200.1, &FRAGMENTS)]);
    let err = LibraryMatcher::new(
        MatchCriteria::default(),
        &libs,
        &LibrarySelection::Named(vec!["missing".into()]),
        1,
    )
    .err()
    .unwrap();
    assert!(matches!(err, LibraryMatchError::LibrarySelection(_)));

    let err = LibraryMatcher::new(
        MatchCriteria {
            min_match: 0,
            ..Default::default()
        },
        &libs,
        &LibrarySelection::All,
        1,
    )
    .err()
    .unwrap();
    assert!(matches!(err, LibraryMatchError::InvalidCriteria(_)));
}
