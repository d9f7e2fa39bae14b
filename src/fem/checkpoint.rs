use super::{LineSearch, QnStrategy};
use crate::base::QnMethod;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the data persisted by a deep checkpoint
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeepCheckpoint {
    /// Number of equations
    pub neq: usize,

    /// Max number of stiffness reformations
    pub max_refs: usize,

    /// Default quasi-Newton method
    pub qn_default: QnMethod,

    /// Strategy with its secant history
    pub strategy: QnStrategy,
}

/// Holds the state of the nonlinear solver between time steps
///
/// A shallow checkpoint holds the line search parameters only.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Checkpoint {
    /// Line search parameters
    pub line_search: LineSearch,

    /// Data of a deep checkpoint
    pub deep: Option<DeepCheckpoint>,
}

impl Checkpoint {
    /// Reads a JSON file with the checkpoint
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let checkpoint = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(checkpoint)
    }

    /// Writes a JSON file with the checkpoint
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
