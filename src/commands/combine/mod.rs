use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use tracing::{debug, info, warn};

use crate::cli::CombineArgs;
use crate::model::{BundleManifest, CombineRunReport, SkipReason};
use crate::naming::{MergedName, MergedNameParser, combined_file_name};
use crate::pdf::{self, IoPolicy, PageAssembler};
use crate::report::{CollectingReporter, Reporter, TracingReporter};
use crate::util::{
    ensure_directory, file_name_string, list_files_sorted, now_utc_string, title_case,
    write_json_pretty,
};

mod bundle;
mod run;

pub use run::run;

use bundle::*;
