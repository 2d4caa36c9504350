use super::*;

pub fn run(args: CombineArgs) -> Result<()> {
    if args.bundle_size == 0 {
        bail!("--bundle-size must be at least 1");
    }
    if args.bundle_size != DEFAULT_BUNDLE_SIZE {
        info!(bundle_size = args.bundle_size, "using non-default bundle size");
    }

    let started_at = now_utc_string();
    ensure_directory(&args.output_dir)?;
    let reporter = CollectingReporter::new(TracingReporter);

    let (candidates, scanned) = collect_candidates(&args.merged_dir, &reporter)?;
    info!(
        merged_dir = %args.merged_dir.display(),
        scanned,
        candidates = candidates.len(),
        "found merged documents to combine"
    );

    let mut combiner = Combiner {
        output_dir: &args.output_dir,
        bundle_size: args.bundle_size,
        policy: IoPolicy::from_args(&args.io),
        reporter: &reporter,
        clock: BundleClock::default(),
    };
    let bundles = combiner.combine(&candidates)?;

    let combined_documents: usize = bundles.iter().map(|bundle| bundle.names.len()).sum();
    info!(
        bundles = bundles.len(),
        combined_documents,
        skipped = reporter.skips().len(),
        "combine completed"
    );

    if let Some(manifest_path) = &args.manifest_path {
        let report = CombineRunReport {
            report_version: 1,
            started_at,
            finished_at: now_utc_string(),
            merged_dir: args.merged_dir.display().to_string(),
            output_dir: args.output_dir.display().to_string(),
            bundle_size: args.bundle_size,
            candidate_count: candidates.len(),
            bundles,
            skipped: reporter.skips(),
        };
        write_json_pretty(manifest_path, &report)?;
        info!(path = %manifest_path.display(), "wrote combine manifest");
    }

    Ok(())
}
