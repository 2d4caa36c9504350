use super::*;

#[derive(Debug, Default)]
pub(super) struct SourceLocator {
    subdirectories: Vec<PathBuf>,
}

impl SourceLocator {
    pub(super) fn scan(company_dir: &Path) -> Self {
        match crate::util::list_subdirectories_sorted(company_dir) {
            Ok(subdirectories) => {
                info!(
                    company_dir = %company_dir.display(),
                    subdirectories = subdirectories.len(),
                    "scanned source document folders"
                );
                Self { subdirectories }
            }
            Err(err) => {
                warn!(
                    company_dir = %company_dir.display(),
                    error = %err,
                    "company directory unreadable; no source documents"
                );
                Self::default()
            }
        }
    }

    pub(super) fn locate(&self, file_name: &str) -> Result<PathBuf, SkipReason> {
        if !is_plain_file_name(file_name) {
            return Err(SkipReason::SourceNotFound(format!(
                "{file_name} is not a plain file name"
            )));
        }

        self.subdirectories
            .iter()
            .map(|subdirectory| subdirectory.join(file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                SkipReason::SourceNotFound(format!(
                    "{file_name} is not in any of {} folders",
                    self.subdirectories.len()
                ))
            })
    }
}

fn is_plain_file_name(file_name: &str) -> bool {
    let mut components = Path::new(file_name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
