//! End-to-end pipeline over a mock archive: fetch → batch → CSV → discover → load.

use bhavcopy_core::{
    BhavFetcher, FailureReason, HttpResponse, HttpSource, SchemaResolver, TransportError,
};
use bhavcopy_runner::{
    discover_files, load_files, write_unit, BatchOptions, BatchOrchestrator, BatchSummary,
    DayStatus, SilentProgress,
};
use bhavcopy_store::BhavStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

const LEGACY_HEADER: &str =
    "SYMBOL,SERIES,OPEN,HIGH,LOW,CLOSE,LAST,PREVCLOSE,TOTTRDQTY,TOTTRDVAL,TIMESTAMP,TOTALTRADES,ISIN\n";
const UNIFIED_HEADER: &str = "TradDt,BizDt,Sgmt,Src,FinInstrmTp,FinInstrmId,ISIN,TckrSymb,SctySrs,XpryDt,FininstrmActlXpryDt,StrkPric,OptnTp,FinInstrmNm,OpnPric,HghPric,LwPric,ClsPric,LastPric,PrvsClsgPric,UndrlygPric,SttlmPric,OpnIntrst,ChngInOpnIntrst,TtlTradgVol,TtlTrfVal,TtlNbOfTxsExctd,SsnId,NewBrdLotQty,Rmks,Rsvd1,Rsvd2,Rsvd3,Rsvd4\n";

/// Serves zipped payloads keyed by URL; anything else is a 404.
struct Archive {
    files: HashMap<String, Vec<u8>>,
}

impl HttpSource for Archive {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        Ok(match self.files.get(url) {
            Some(body) => HttpResponse {
                status: 200,
                body: body.clone(),
            },
            None => HttpResponse {
                status: 404,
                body: Vec::new(),
            },
        })
    }
}

fn zip_bytes(contents: &str) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer.start_file("bhav.csv", SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn legacy_day(close_bump: f64) -> String {
    format!(
        "{LEGACY_HEADER}\
         RELIANCE,EQ,2800,2850,2790,{},2830,2810,1000000,2830000000,01-JAN-2024,50000,INE002A01018\n\
         TCS,EQ,3500,3550,3480,3520,3520,3510,500000,1760000000,01-JAN-2024,30000,INE467B01029\n\
         INFY,BE,1500,1530,1490,1520,1520,1510,200000,304000000,01-JAN-2024,15000,INE009A01021\n",
        2830.0 + close_bump
    )
}

fn unified_day() -> String {
    format!(
        "{UNIFIED_HEADER}\
         2024-07-08,2024-07-08,CM,NSE,STK,2885,INE002A01018,RELIANCE,EQ,,,,,RELIANCE INDUSTRIES LTD,3150,3180,3120,3170,3171,3140,,3170,,,4500000,14265000000,210000,F1,1,,,,,\n\
         2024-07-08,2024-07-08,CM,NSE,STK,11536,INE467B01029,TCS,EQ,,,,,TATA CONSULTANCY SERV LT,3990,4010,3970,4000,4001,3980,,4000,,,900000,3600000000,80000,F1,1,,,,,\n"
    )
}

/// Mon 1 Jan .. Fri 5 Jan 2024 with Wednesday missing.
fn legacy_archive(resolver: &SchemaResolver) -> Archive {
    let mut files = HashMap::new();
    for date in ["2024-01-01", "2024-01-02", "2024-01-04", "2024-01-05"] {
        files.insert(resolver.url_for(d(date)), zip_bytes(&legacy_day(0.0)));
    }
    Archive { files }
}

fn week() -> Vec<NaiveDate> {
    bhavcopy_core::weekdays(d("2024-01-01"), d("2024-01-07"))
}

#[test]
fn five_weekdays_with_a_gap_produce_four_units_and_one_soft_failure() {
    let resolver = SchemaResolver::default();
    let fetcher = BhavFetcher::new(legacy_archive(&resolver), resolver);
    let orchestrator = BatchOrchestrator::new(&fetcher, &SilentProgress);

    let result = orchestrator.run(&week(), &BatchOptions::default()).unwrap();

    assert_eq!(result.units.len(), 4);
    assert_eq!(result.soft_failed(), 1);
    assert!(matches!(
        result.days[2].status,
        DayStatus::SoftFailed {
            reason: FailureReason::NotFound,
            ..
        }
    ));
    // Payload says 01-JAN-2024 for every day; each unit carries its requested date.
    for unit in &result.units {
        assert!(unit.records.iter().all(|r| r.trading_date == unit.start));
    }
}

#[test]
fn download_then_load_is_idempotent() {
    let out = tempfile::tempdir().unwrap();
    let resolver = SchemaResolver::default();
    let fetcher = BhavFetcher::new(legacy_archive(&resolver), resolver);
    let orchestrator = BatchOrchestrator::new(&fetcher, &SilentProgress);

    let result = orchestrator.run(&week(), &BatchOptions::default()).unwrap();
    let mut outputs = Vec::new();
    for unit in &result.units {
        outputs.push(write_unit(out.path(), unit).unwrap());
    }
    let summary = BatchSummary::from_result(&result, outputs);
    assert_eq!(summary.total_records, 12);
    assert_eq!(summary.unique_symbols, 3);

    let store = BhavStore::open_in_memory().unwrap();
    let files = discover_files(out.path(), None).unwrap().files;
    assert_eq!(files.len(), 4);

    let first = load_files(&store, &files, &SilentProgress);
    assert_eq!(first.failed(), 0);
    assert_eq!(first.upserted(), 12);
    let count = store.row_count().unwrap();
    let fingerprint = store.fingerprint().unwrap();

    let second = load_files(&store, &files, &SilentProgress);
    assert_eq!(second.failed(), 0);
    assert_eq!(store.row_count().unwrap(), count);
    assert_eq!(store.fingerprint().unwrap(), fingerprint);
}

#[test]
fn merged_eq_download_across_cutover_loads_cleanly() {
    let out = tempfile::tempdir().unwrap();
    let resolver = SchemaResolver::default();
    let mut files = HashMap::new();
    files.insert(resolver.url_for(d("2024-07-05")), zip_bytes(&legacy_day(5.0)));
    files.insert(resolver.url_for(d("2024-07-08")), zip_bytes(&unified_day()));
    let fetcher = BhavFetcher::new(Archive { files }, resolver);
    let orchestrator = BatchOrchestrator::new(&fetcher, &SilentProgress);

    let options = BatchOptions {
        series_filter: Some("eq".into()),
        merge: true,
        ..Default::default()
    };
    let dates = bhavcopy_core::weekdays(d("2024-07-05"), d("2024-07-08"));
    let result = orchestrator.run(&dates, &options).unwrap();

    assert_eq!(result.units.len(), 1);
    let unit = &result.units[0];
    assert_eq!(unit.records.len(), 4);
    let path = write_unit(out.path(), unit).unwrap();
    assert_eq!(path.file_name().unwrap(), "bhav_20240705_to_20240708.csv");

    let store = BhavStore::open_in_memory().unwrap();
    let discovered = discover_files(out.path(), None).unwrap().files;
    let summary = load_files(&store, &discovered, &SilentProgress);
    assert_eq!(summary.failed(), 0);

    let reliance = store.history("RELIANCE", "EQ", None, None).unwrap();
    assert_eq!(reliance.len(), 2);
    assert_eq!(reliance[0].close, Some(2835.0));
    assert_eq!(reliance[1].close, Some(3170.0));
    assert_eq!(reliance[1].volume, Some(4_500_000));
}

#[test]
fn since_skips_older_files_and_reports_spanning_merges() {
    let out = tempfile::tempdir().unwrap();
    let resolver = SchemaResolver::default();
    let fetcher = BhavFetcher::new(legacy_archive(&resolver), resolver);
    let orchestrator = BatchOrchestrator::new(&fetcher, &SilentProgress);

    let result = orchestrator.run(&week(), &BatchOptions::default()).unwrap();
    for unit in &result.units {
        write_unit(out.path(), unit).unwrap();
    }
    let merged = orchestrator
        .run(
            &week(),
            &BatchOptions {
                merge: true,
                ..Default::default()
            },
        )
        .unwrap();
    write_unit(out.path(), &merged.units[0]).unwrap();

    let discovery = discover_files(out.path(), Some(d("2024-01-04"))).unwrap();
    assert_eq!(discovery.files.len(), 2);
    assert_eq!(discovery.spanning.len(), 1);
    assert_eq!(discovery.spanning[0].start, d("2024-01-01"));
}

#[test]
fn holiday_week_still_summarizes_every_skipped_date() {
    let resolver = SchemaResolver::default();
    let fetcher = BhavFetcher::new(
        Archive {
            files: HashMap::new(),
        },
        resolver,
    );
    let orchestrator = BatchOrchestrator::new(&fetcher, &SilentProgress);

    for merge in [false, true] {
        let options = BatchOptions {
            merge,
            ..Default::default()
        };
        let result = orchestrator.run(&week(), &options).unwrap();
        assert!(result.units.is_empty());

        let summary = BatchSummary::from_result(&result, Vec::new());
        assert_eq!(summary.candidate_dates, 5);
        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.skipped.len(), 5);
        assert!(summary
            .skipped
            .iter()
            .all(|s| s.reason == FailureReason::NotFound));
        assert_eq!(summary.skip_reasons().get(&FailureReason::NotFound), Some(&5));

        let text = summary.render_text();
        for date in week() {
            assert!(text.contains(&date.to_string()), "{date} missing from summary");
        }
        assert!(text.contains("not_found"));

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"not_found\""));
        assert!(json.contains("2024-01-03"));
    }
}
