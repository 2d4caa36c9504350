use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use rand::Rng;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cli::{MergeArgs, SuffixPolicy};
use crate::commands::index::{TaxIdIndex, build_index};
use crate::commands::records::load_records;
use crate::model::{
    MergeCounts, MergeOutcome, MergeRunReport, PersonRecord, RecordOutcome, SkipReason,
};
use crate::naming::{SEQUENCE_LIMIT, merged_file_name};
use crate::pdf::{self, IoPolicy, PageAssembler};
use crate::report::{CollectingReporter, Reporter, TracingReporter};
use crate::util::{digits_only, ensure_directory, now_utc_string, write_json_pretty};

mod locate;
mod output_names;
mod run;

pub use run::run;

use locate::*;
use output_names::*;
