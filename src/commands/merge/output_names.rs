use super::*;

const MAX_UNIQUE_ATTEMPTS: usize = 64;

type SuffixSource = Box<dyn Fn() -> u32 + Send + Sync>;

pub(super) struct OutputNamer {
    output_dir: PathBuf,
    policy: SuffixPolicy,
    draw: SuffixSource,
    issued: Mutex<HashSet<String>>,
}

impl OutputNamer {
    pub(super) fn new(output_dir: &Path, policy: SuffixPolicy) -> Self {
        Self::with_source(
            output_dir,
            policy,
            Box::new(|| rand::thread_rng().gen_range(0..SEQUENCE_LIMIT)),
        )
    }

    pub(super) fn with_source(output_dir: &Path, policy: SuffixPolicy, draw: SuffixSource) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            policy,
            draw,
            issued: Mutex::new(HashSet::new()),
        }
    }

    pub(super) fn next_path(&self, last: &str, first: &str) -> Result<PathBuf> {
        match self.policy {
            SuffixPolicy::Random => {
                let name = merged_file_name(last, first, (self.draw)() % SEQUENCE_LIMIT);
                Ok(self.output_dir.join(name))
            }
            SuffixPolicy::Unique => self.next_unique_path(last, first),
        }
    }

    fn next_unique_path(&self, last: &str, first: &str) -> Result<PathBuf> {
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let name = merged_file_name(last, first, (self.draw)() % SEQUENCE_LIMIT);
            let path = self.output_dir.join(&name);
            if issued.contains(&name) || path.exists() {
                continue;
            }
            issued.insert(name);
            return Ok(path);
        }

        bail!("no unused file name for {last} {first} after {MAX_UNIQUE_ATTEMPTS} draws")
    }
}
