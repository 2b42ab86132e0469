use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use sourmash::encodings::HashFunctions;
use sourmash::signature::SigsTrait;
use sourmash::sketch::minhash::max_hash_for_scaled;

use sra_sketch::app::{AccessionOutcome, App, RunOptions};
use sra_sketch::domain::{
    Accession, DownloadFailurePolicy, DownloadMethod, default_download_methods,
};
use sra_sketch::download::{DownloadResult, Downloader, expected_file_names, probe_downloads};
use sra_sketch::error::SraSketchError;
use sra_sketch::output::JsonOutput;
use sra_sketch::params::build_factories;
use sra_sketch::signature::load_signatures;

/// Writes prepared FASTQ files instead of calling kingfisher.
#[derive(Default)]
struct FixtureDownloader {
    files: HashMap<String, Vec<(String, Vec<String>)>>,
    calls: Mutex<Vec<(String, u32, Vec<DownloadMethod>)>>,
}

impl FixtureDownloader {
    fn with(mut self, accession: &str, file: &str, reads: Vec<String>) -> Self {
        self.files
            .entry(accession.to_string())
            .or_default()
            .push((file.to_string(), reads));
        self
    }
}

impl Downloader for FixtureDownloader {
    fn download(
        &self,
        accession: &Accession,
        destination_dir: &Path,
        threads: u32,
        methods: &[DownloadMethod],
    ) -> Result<DownloadResult, SraSketchError> {
        self.calls
            .lock()
            .unwrap()
            .push((accession.to_string(), threads, methods.to_vec()));
        fs::create_dir_all(destination_dir).unwrap();
        if let Some(files) = self.files.get(accession.as_str()) {
            for (name, reads) in files {
                write_fastq_gz(&destination_dir.join(name), reads);
            }
        }
        probe_downloads(accession, destination_dir)
    }
}

fn write_fastq_gz(path: &Path, reads: &[String]) {
    let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
    for (i, read) in reads.iter().enumerate() {
        let qual = "I".repeat(read.len());
        write!(encoder, "@read{i}\n{read}\n+\n{qual}\n").unwrap();
    }
    encoder.finish().unwrap();
}

/// Deterministic pseudo-random reads.
fn reads(count: usize, len: usize, seed: u64) -> Vec<String> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..count)
        .map(|_| {
            (0..len)
                .map(|_| {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    b"ACGT"[(state >> 33) as usize % 4] as char
                })
                .collect()
        })
        .collect()
}

fn options(dir: &Path) -> RunOptions {
    RunOptions {
        output_dir: Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap(),
        download_only: false,
        delete_fastq: false,
        download_methods: default_download_methods(),
        threads: 1,
        sig_extension: "zip".to_string(),
        check_sequence: false,
        on_download_failure: DownloadFailurePolicy::Skip,
    }
}

fn accessions(values: &[&str]) -> Vec<Accession> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

#[test]
fn single_end_accession_produces_one_sketch() {
    let temp = tempfile::tempdir().unwrap();
    let downloader =
        FixtureDownloader::default().with("ERR1739691", "ERR1739691.fastq.gz", reads(500, 100, 1));
    let app = App::new(
        downloader,
        build_factories::<&str>(&[]).unwrap(),
        options(temp.path()),
    );

    let report = app
        .run(&accessions(&["ERR1739691"]), &JsonOutput)
        .unwrap()
        .unwrap();

    assert_eq!(report.total_sketches, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.accessions, 1);
    let sigs = load_signatures(&temp.path().join("ERR1739691.zip")).unwrap();
    assert_eq!(sigs.len(), 1);
    assert_eq!(sigs[0].name_str(), "ERR1739691");
    assert_eq!(sigs[0].filename(), "ERR1739691.fastq.gz");
    let mh = sigs[0].minhash().unwrap();
    assert_eq!(mh.ksize(), 31);
    assert_eq!(mh.max_hash(), max_hash_for_scaled(1000));
    assert!(!mh.is_empty());
}

#[test]
fn empty_download_is_skipped_and_run_continues() {
    let temp = tempfile::tempdir().unwrap();
    let downloader = FixtureDownloader::default()
        .with("SRR100", "SRR100.fastq.gz", reads(50, 80, 2))
        .with("SRR200", "SRR200.fastq.gz", Vec::new());
    let app = App::new(
        downloader,
        build_factories::<&str>(&[]).unwrap(),
        options(temp.path()),
    );

    let report = app
        .run(&accessions(&["SRR100", "SRR200"]), &JsonOutput)
        .unwrap()
        .unwrap();

    assert_eq!(report.total_sketches, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.accessions, 2);
    assert_eq!(report.items[1].outcome, AccessionOutcome::SketchFailed);
    assert!(temp.path().join("SRR100.zip").exists());
    assert!(!temp.path().join("SRR200.zip").exists());
}

#[test]
fn paired_files_feed_every_configuration_in_file_order() {
    let temp = tempfile::tempdir().unwrap();
    let mate1 = reads(40, 120, 3);
    let mate2 = reads(40, 120, 4);
    let mut concatenated = mate1.clone();
    concatenated.extend(mate2.iter().cloned());

    let downloader = FixtureDownloader::default()
        .with("SRR300", "SRR300_1.fastq.gz", mate1)
        .with("SRR300", "SRR300_2.fastq.gz", mate2)
        .with("SRR301", "SRR301.fastq.gz", concatenated);
    let params = ["dna,k=21,scaled=10", "protein,k=7,scaled=10"];
    let app = App::new(
        downloader,
        build_factories(&params).unwrap(),
        options(temp.path()),
    );

    let report = app
        .run(&accessions(&["SRR300", "SRR301"]), &JsonOutput)
        .unwrap()
        .unwrap();
    assert_eq!(report.total_sketches, 4);
    assert_eq!(report.items[0].files.len(), 2);
    assert!(report.items[0].files[0].ends_with("SRR300_1.fastq.gz"));

    let paired = load_signatures(&temp.path().join("SRR300.zip")).unwrap();
    let single = load_signatures(&temp.path().join("SRR301.zip")).unwrap();
    assert_eq!(paired.len(), params.len());
    assert_eq!(
        paired[0].minhash().unwrap().hash_function(),
        HashFunctions::Murmur64Dna
    );
    assert_eq!(
        paired[1].minhash().unwrap().hash_function(),
        HashFunctions::Murmur64Protein
    );
    assert_eq!(paired[0].filename(), "SRR300_2.fastq.gz");
    for (left, right) in paired.iter().zip(single.iter()) {
        assert_eq!(left.minhash().unwrap().mins(), right.minhash().unwrap().mins());
        assert_eq!(left.md5sum(), right.md5sum());
    }
}

#[test]
fn delete_fastq_cleans_up_regardless_of_outcome() {
    let temp = tempfile::tempdir().unwrap();
    let downloader = FixtureDownloader::default()
        .with("SRR400", "SRR400_1.fastq.gz", reads(20, 60, 5))
        .with("SRR400", "SRR400_2.fastq.gz", reads(20, 60, 6))
        .with("SRR401", "SRR401.fastq.gz", Vec::new());
    let mut opts = options(temp.path());
    opts.delete_fastq = true;
    let app = App::new(downloader, build_factories::<&str>(&[]).unwrap(), opts);

    let report = app
        .run(&accessions(&["SRR400", "SRR401"]), &JsonOutput)
        .unwrap()
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert!(report.items.iter().all(|item| item.cleaned));
    for acc in accessions(&["SRR400", "SRR401"]) {
        for name in expected_file_names(&acc) {
            assert!(!temp.path().join(name).exists());
        }
    }
    assert!(temp.path().join("SRR400.zip").exists());
}

#[test]
fn download_only_writes_no_signature_and_no_report() {
    let temp = tempfile::tempdir().unwrap();
    let downloader =
        FixtureDownloader::default().with("SRR500", "SRR500.fastq.gz", reads(10, 60, 7));
    let mut opts = options(temp.path());
    opts.download_only = true;
    let app = App::new(downloader, build_factories::<&str>(&[]).unwrap(), opts);

    let report = app.run(&accessions(&["SRR500"]), &JsonOutput).unwrap();

    assert!(report.is_none());
    assert!(temp.path().join("SRR500.fastq.gz").exists());
    assert!(!temp.path().join("SRR500.zip").exists());
}

#[test]
fn repeated_runs_write_identical_signatures() {
    let temp = tempfile::tempdir().unwrap();
    let downloader =
        FixtureDownloader::default().with("SRR600", "SRR600.fastq.gz", reads(100, 100, 8));
    let app = App::new(
        downloader,
        build_factories(&["dna,k=21,scaled=100", "dna,k=31,num=50,abund"]).unwrap(),
        options(temp.path()),
    );
    let destination = temp.path().join("SRR600.zip");

    app.run(&accessions(&["SRR600"]), &JsonOutput).unwrap();
    let first = fs::read(&destination).unwrap();
    app.run(&accessions(&["SRR600"]), &JsonOutput).unwrap();
    let second = fs::read(&destination).unwrap();

    assert_eq!(first, second);
}

#[test]
fn methods_and_threads_are_passed_through() {
    let temp = tempfile::tempdir().unwrap();
    let downloader =
        FixtureDownloader::default().with("SRR700", "SRR700.fastq.gz", reads(5, 60, 9));
    let mut opts = options(temp.path());
    opts.threads = 8;
    opts.download_methods = vec![DownloadMethod::AwsCp, DownloadMethod::Prefetch];
    opts.sig_extension = "sig.gz".to_string();
    let app = App::new(downloader, build_factories::<&str>(&[]).unwrap(), opts);

    app.run(&accessions(&["SRR700"]), &JsonOutput).unwrap();

    let calls = app.downloader().calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![(
            "SRR700".to_string(),
            8,
            vec![DownloadMethod::AwsCp, DownloadMethod::Prefetch]
        )]
    );
    assert!(temp.path().join("SRR700.sig.gz").exists());
}

#[test]
fn download_failure_policy_controls_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let make = || FixtureDownloader::default().with("SRR801", "SRR801.fastq.gz", reads(5, 60, 10));

    let app = App::new(
        make(),
        build_factories::<&str>(&[]).unwrap(),
        options(temp.path()),
    );
    let report = app
        .run(&accessions(&["SRR800", "SRR801"]), &JsonOutput)
        .unwrap()
        .unwrap();
    assert_eq!(report.download_failed, 1);
    assert_eq!(report.total_sketches, 1);
    assert_matches!(
        report.items[0].outcome,
        AccessionOutcome::DownloadFailed { .. }
    );

    let mut opts = options(temp.path());
    opts.on_download_failure = DownloadFailurePolicy::Abort;
    let app = App::new(make(), build_factories::<&str>(&[]).unwrap(), opts);
    let err = app
        .run(&accessions(&["SRR800", "SRR801"]), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, SraSketchError::DownloadResultEmpty { accession } if accession == "SRR800");
}
