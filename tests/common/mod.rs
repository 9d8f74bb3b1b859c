//! Realization trees on disk for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

pub const VOLUMES: &str = "share/results/volumes/simulator_volume_fipnum.csv";
pub const NPV: &str = "share/results/tables/npv.txt";

const STATUS: &str = "\
Current host                    : st-rst16-02-03/x86_64  file-server:10.14.10.238
LSF JOBID: 1865412
MAKE_DIRECTORY                  : 15:56:40 .... 15:56:40
COPY_FILE                       : 15:56:41 .... 15:56:42
ECLIPSE100_2014.2               : 16:01:04 .... 16:04:19
";

const JOBS: &str = r#"{
  "jobList": [
    {"name": "MAKE_DIRECTORY", "executable": "/bin/mkdir"},
    {"name": "COPY_FILE", "executable": "/bin/cp"},
    {"name": "ECLIPSE100_2014.2", "executable": "/bin/eclipse"},
    {"name": "RMS_BATCH", "executable": "/bin/rms"}
  ]
}"#;

static TRACING: Once = Once::new();

/// Routes events to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Writes a complete realization below `root`.
///
/// Index `i` gets `FWL = 1700 + 10 i`, three volume rows (two FIPNUMs
/// in the Upper zone) with STOIIP values shifted by `1000 i` and
/// a summary whose FOPT ends at `6000 (i + 1)`. Even indices have an OK
/// marker.
pub fn write_realization(root: &Path, index: usize) {
    fs::create_dir_all(root.join("share/results/volumes")).unwrap();
    fs::create_dir_all(root.join("share/results/tables")).unwrap();
    fs::create_dir_all(root.join("eclipse/model")).unwrap();

    fs::write(root.join("STATUS"), STATUS).unwrap();
    fs::write(root.join("jobs.json"), JOBS).unwrap();
    fs::write(
        root.join("parameters.txt"),
        format!(
            "FWL {}\nRMS_SEED {}\nZONE_NAME Upper\nMULTFLT {}\n",
            1700 + 10 * index,
            422851785 + index,
            0.5 + 0.25 * index as f64
        ),
    )
    .unwrap();
    if index % 2 == 0 {
        fs::write(root.join("OK"), "All jobs complete\n").unwrap();
    }

    fs::write(
        root.join(VOLUMES),
        format!(
            "ZONE,REGION,FIPNUM,STOIIP_OIL\nUpper,1,1,{}\nUpper,1,2,{}\nLower,2,3,{}\n",
            1_000_000 + 1000 * index,
            500_000 + 1000 * index,
            2_000_000 + 1000 * index
        ),
    )
    .unwrap();
    fs::write(root.join(NPV), format!("{}\n", 3000 + 100 * index)).unwrap();

    let scale = (index + 1) as i64;
    let summary = format!(
        "DATE,FOPT,FOPR,WOPR:OP_1\n\
         2000-01-01,0,{r},5\n\
         2000-07-01,{a},{r},5\n\
         2001-01-01,{b},{r},5\n\
         2002-01-01,{c},{r},5\n\
         2003-01-02,{d},{r},5\n",
        r = 10 * scale,
        a = 1000 * scale,
        b = 2000 * scale,
        c = 4000 * scale,
        d = 6000 * scale,
    );
    fs::write(root.join(format!("eclipse/model/MODEL-{}.UNSMRY", index)), summary).unwrap();
}

/// `count` realizations laid out as `<tmp>/realization-<i>/iter-0`.
pub struct EnsembleFixture {
    pub dir: TempDir,
}

impl EnsembleFixture {
    pub fn new(count: usize) -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        for index in 0..count {
            write_realization(&dir.path().join(format!("realization-{}/iter-0", index)), index);
        }
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn realization(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("realization-{}/iter-0", index))
    }

    /// Glob matching every realization of the fixture.
    pub fn pattern(&self) -> String {
        format!("{}/realization-*/iter-0", self.dir.path().display())
    }
}
