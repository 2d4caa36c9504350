use super::*;

pub fn run(args: MergeArgs) -> Result<()> {
    if args.jobs == 0 {
        bail!("--jobs must be at least 1");
    }

    let started_at = now_utc_string();
    ensure_directory(&args.output_dir)?;
    let policy = IoPolicy::from_args(&args.io);
    let reporter = CollectingReporter::new(TracingReporter);

    info!(
        company_dir = %args.company_dir.display(),
        output_dir = %args.output_dir.display(),
        suffix_policy = args.suffix_policy.as_str(),
        jobs = args.jobs,
        "starting merge"
    );

    let index = build_index(&args.w2_dir, &policy, &reporter)?;
    if index.is_empty() {
        warn!(w2_dir = %args.w2_dir.display(), "tax ID index is empty; no record can be merged");
    }
    let loaded = load_records(&args.people_dir, &reporter);
    info!(
        files_loaded = loaded.files_loaded,
        files_failed = loaded.files_failed,
        rows_read = loaded.rows_read,
        "read person-record files"
    );
    let input_skips = reporter.skips();

    let namer = OutputNamer::new(&args.output_dir, args.suffix_policy);
    let job = MergeJob {
        sources: SourceLocator::scan(&args.company_dir),
        index: &index,
        namer: &namer,
        policy,
        reporter: &reporter,
    };
    let outcomes = job.merge_all(&loaded.records, args.jobs)?;

    let merged = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, MergeOutcome::Merged { .. }))
        .count();
    let mut skipped_by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for outcome in &outcomes {
        if let MergeOutcome::Skipped { reason } = outcome {
            *skipped_by_kind.entry(reason.kind()).or_default() += 1;
        }
    }
    for (kind, count) in &skipped_by_kind {
        info!(kind, count, "records skipped");
    }
    info!(
        records = loaded.records.len(),
        merged,
        skipped = outcomes.len() - merged,
        written = reporter.outputs().len(),
        "merge completed"
    );

    if let Some(report_path) = &args.report_path {
        let report = MergeRunReport {
            report_version: 1,
            started_at,
            finished_at: now_utc_string(),
            company_dir: args.company_dir.display().to_string(),
            w2_dir: args.w2_dir.display().to_string(),
            people_dir: args.people_dir.display().to_string(),
            output_dir: args.output_dir.display().to_string(),
            suffix_policy: args.suffix_policy.as_str().to_string(),
            jobs: args.jobs,
            counts: MergeCounts {
                index_entries: index.len(),
                index_duplicates_discarded: index.duplicates_discarded,
                records_loaded: loaded.records.len(),
                rows_rejected: loaded.rows_rejected,
                merged,
                skipped: outcomes.len() - merged,
            },
            records: loaded
                .records
                .iter()
                .zip(outcomes)
                .map(|(record, outcome)| RecordOutcome {
                    name: record.display_name(),
                    source_filename: record.source_filename.clone(),
                    outcome,
                })
                .collect(),
            skipped_inputs: input_skips,
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote merge report");
    }

    Ok(())
}

pub(super) struct MergeJob<'a> {
    pub(super) sources: SourceLocator,
    pub(super) index: &'a TaxIdIndex,
    pub(super) namer: &'a OutputNamer,
    pub(super) policy: IoPolicy,
    pub(super) reporter: &'a dyn Reporter,
}

impl MergeJob<'_> {
    pub(super) fn merge_all(
        &self,
        records: &[PersonRecord],
        jobs: usize,
    ) -> Result<Vec<MergeOutcome>> {
        if jobs <= 1 {
            return Ok(records.iter().map(|record| self.merge(record)).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|index| format!("merge-{index}"))
            .build()
            .context("failed to build merge worker pool")?;
        Ok(pool.install(|| records.par_iter().map(|record| self.merge(record)).collect()))
    }

    pub(super) fn merge(&self, record: &PersonRecord) -> MergeOutcome {
        match self.try_merge(record) {
            Ok((path, pages)) => {
                self.reporter.produced(&path, pages);
                MergeOutcome::Merged { path, pages }
            }
            Err(reason) => {
                self.reporter.skipped(&record.display_name(), &reason);
                MergeOutcome::Skipped { reason }
            }
        }
    }

    fn try_merge(&self, record: &PersonRecord) -> Result<(PathBuf, usize), SkipReason> {
        let tax_id = digits_only(&record.tax_id);
        let missing = missing_fields(record, &tax_id);
        if !missing.is_empty() {
            return Err(SkipReason::IncompleteRecord(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let source_path = self.sources.locate(&record.source_filename)?;
        let wage_entry = self.index.get(&tax_id).ok_or_else(|| {
            SkipReason::NoMatchingWageStatement(format!(
                "no wage statement carries tax ID ending {}",
                &tax_id[tax_id.len().saturating_sub(4)..]
            ))
        })?;

        let unreadable = |err: anyhow::Error| SkipReason::UnreadableDocument(format!("{err:#}"));
        let source = pdf::load_document(&self.policy, &source_path).map_err(unreadable)?;
        let wage_statement =
            pdf::load_document(&self.policy, &wage_entry.document).map_err(unreadable)?;

        let kept_pages: Vec<u32> = (2..=pdf::page_count(&source) as u32).collect();
        let wage_page = wage_entry.page_index as u32 + 1;

        let mut assembler = PageAssembler::new();
        assembler
            .append_pages(source, &kept_pages)
            .with_context(|| format!("failed to copy pages of {}", source_path.display()))
            .map_err(unreadable)?;
        assembler
            .append_pages(wage_statement, &[wage_page])
            .with_context(|| format!("failed to copy page of {}", wage_entry.document.display()))
            .map_err(unreadable)?;
        let pages = assembler.page_count();

        let write_failure = |err: anyhow::Error| SkipReason::WriteFailure(format!("{err:#}"));
        let bytes = assembler.into_bytes().map_err(write_failure)?;
        let output_path = self
            .namer
            .next_path(&record.last_name, &record.first_name)
            .map_err(write_failure)?;
        pdf::write_atomic(&self.policy, &output_path, bytes).map_err(write_failure)?;

        Ok((output_path, pages))
    }
}

fn missing_fields(record: &PersonRecord, tax_id: &str) -> Vec<&'static str> {
    [
        ("first_name", record.first_name.as_str()),
        ("last_name", record.last_name.as_str()),
        ("tax_id", tax_id),
        ("source_filename", record.source_filename.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(field, _)| field)
    .collect()
}
