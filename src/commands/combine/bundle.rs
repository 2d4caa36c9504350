use super::*;

pub const DEFAULT_BUNDLE_SIZE: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct MergedCandidate {
    pub(super) path: PathBuf,
    pub(super) last: String,
    pub(super) first: String,
    pub(super) sequence: u32,
}

pub(super) fn collect_candidates(
    merged_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<(Vec<MergedCandidate>, usize)> {
    let parser = MergedNameParser::new()?;

    let files = match list_files_sorted(merged_dir, &["pdf"]) {
        Ok(files) => files,
        Err(err) => {
            warn!(
                merged_dir = %merged_dir.display(),
                error = %err,
                "merged directory unreadable; nothing to combine"
            );
            return Ok((Vec::new(), 0));
        }
    };
    let scanned = files.len();

    let mut candidates = Vec::with_capacity(files.len());
    for path in files {
        let name = file_name_string(&path);
        match parser.parse(&name) {
            MergedName::Parsed {
                last,
                first,
                sequence,
            } => candidates.push(MergedCandidate {
                path,
                last: title_case(&last),
                first: title_case(&first),
                sequence,
            }),
            MergedName::Unparsed => {
                reporter.skipped(
                    &name,
                    &SkipReason::MalformedFilename(
                        "expected Last_First_NNNNNN.pdf".to_string(),
                    ),
                );
            }
        }
    }

    candidates.sort_by_key(|candidate| candidate.sequence);
    Ok((candidates, scanned))
}

#[derive(Debug, Default)]
pub(super) struct BundleClock {
    last: Option<NaiveDateTime>,
}

impl BundleClock {
    pub(super) fn next(&mut self) -> NaiveDateTime {
        self.next_after(Local::now().naive_local())
    }

    pub(super) fn next_after(&mut self, now: NaiveDateTime) -> NaiveDateTime {
        let mut stamp = now.trunc_subsecs(6);
        if let Some(last) = self.last {
            if stamp <= last {
                stamp = last + Duration::microseconds(1);
            }
        }
        self.last = Some(stamp);
        stamp
    }
}

pub(super) struct Combiner<'a> {
    pub(super) output_dir: &'a Path,
    pub(super) bundle_size: usize,
    pub(super) policy: IoPolicy,
    pub(super) reporter: &'a dyn Reporter,
    pub(super) clock: BundleClock,
}

impl Combiner<'_> {
    pub(super) fn combine(
        &mut self,
        candidates: &[MergedCandidate],
    ) -> Result<Vec<BundleManifest>> {
        if self.bundle_size == 0 {
            bail!("bundle size must be at least 1");
        }

        let mut manifests = Vec::new();
        for (bundle_index, group) in candidates.chunks(self.bundle_size).enumerate() {
            let bundle_number = bundle_index + 1;
            debug!(bundle = bundle_number, documents = group.len(), "starting bundle");
            if let Some(manifest) = self.write_bundle(bundle_number, group) {
                manifests.push(manifest);
            }
        }
        Ok(manifests)
    }

    fn write_bundle(
        &mut self,
        bundle_number: usize,
        group: &[MergedCandidate],
    ) -> Option<BundleManifest> {
        let mut assembler = PageAssembler::new();
        let mut names = Vec::with_capacity(group.len());

        for candidate in group {
            let name = file_name_string(&candidate.path);
            let appended = pdf::load_document(&self.policy, &candidate.path)
                .and_then(|document| assembler.append_all(document));
            match appended {
                Ok(pages) => {
                    debug!(document = %name, pages, bundle = bundle_number, "added to bundle");
                    names.push((candidate.last.clone(), candidate.first.clone()));
                }
                Err(err) => {
                    self.reporter
                        .skipped(&name, &SkipReason::UnreadableDocument(format!("{err:#}")));
                }
            }
        }

        if names.is_empty() || assembler.page_count() == 0 {
            info!(bundle = bundle_number, "no readable documents in bundle; nothing written");
            return None;
        }

        let page_count = assembler.page_count();
        let path = self.output_dir.join(combined_file_name(self.clock.next()));
        let written = assembler
            .into_bytes()
            .and_then(|bytes| pdf::write_atomic(&self.policy, &path, bytes));
        if let Err(err) = written {
            self.reporter.skipped(
                &format!("bundle {bundle_number}"),
                &SkipReason::WriteFailure(format!("{err:#}")),
            );
            return None;
        }

        self.reporter.produced(&path, page_count);
        Some(BundleManifest {
            path,
            page_count,
            names,
        })
    }
}
