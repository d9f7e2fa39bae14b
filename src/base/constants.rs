/// Defines the directory where the checkpoint files are saved
pub const DEFAULT_OUT_DIR: &str = "/tmp/fenewton/results";

/// Defines an auxiliary directory where the test result files are saved
pub const DEFAULT_TEST_DIR: &str = "/tmp/fenewton/test";

/// Defines the magnitude below which a line search merit is considered zero
pub const LS_ZERO: f64 = 1e-20;
