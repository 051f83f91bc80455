// In tests/logging_tests.rs

use efficient_ca::{recompute, CaComp, CaError, LabeledMatrix};
use log::{Level, LevelFilter, Log, Metadata, Record};
use ndarray::array;
use std::sync::Mutex;

struct CaptureLogger {
    warnings: Mutex<Vec<String>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if record.level() == Level::Warn {
            if let Ok(mut warnings) = self.warnings.lock() {
                warnings.push(record.args().to_string());
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    warnings: Mutex::new(Vec::new()),
};

#[test]
fn test_short_matrix_warns_once() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Warn);

    let ca = CaComp::new(
        array![0.5],
        LabeledMatrix::with_dim_labels(array![[0.4], [-0.2], [-0.2]], ["r1", "r2", "r3"])
            .unwrap(),
        LabeledMatrix::with_dim_labels(array![[1.0], [-1.0]], ["c1", "c2"]).unwrap(),
        3,
    )
    .unwrap();
    let short = LabeledMatrix::new(array![[4.0, 1.0], [2.0, 3.0]], ["r1", "r2"], ["c1", "c2"])
        .unwrap();

    let err = recompute(&ca, &short).unwrap_err();
    assert!(matches!(err, CaError::Alignment { ref label, .. } if label == "r3"), "got {:?}", err);

    let warnings = LOGGER.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1, "warnings: {:?}", *warnings);
    assert!(warnings[0].contains("top = 3"), "got {}", warnings[0]);
}
