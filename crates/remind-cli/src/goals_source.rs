use anyhow::Context;
use remind_core::GoalsFile;
use std::path::{Path, PathBuf};

/// File picked up from the working directory when `--goals` is not given.
pub const DEFAULT_GOALS_FILE: &str = "remind-me.yaml";

/// Where the goal list came from.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalsSource {
    File(PathBuf),
    Builtin,
}

impl GoalsSource {
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Builtin => "built-in defaults".to_string(),
        }
    }
}

/// Resolve the goals file.
///
/// Priority:
/// 1. `--goals` flag / `REMIND_ME_GOALS` env var (passed in as `explicit`)
/// 2. `remind-me.yaml` in `cwd`
/// 3. Built-in goal list
pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> GoalsSource {
    if let Some(p) = explicit {
        return GoalsSource::File(p.to_path_buf());
    }
    let local = cwd.join(DEFAULT_GOALS_FILE);
    if local.is_file() {
        return GoalsSource::File(local);
    }
    GoalsSource::Builtin
}

pub fn load(source: &GoalsSource) -> anyhow::Result<GoalsFile> {
    match source {
        GoalsSource::File(path) => GoalsFile::load(path)
            .with_context(|| format!("failed to load goals from {}", path.display())),
        GoalsSource::Builtin => Ok(GoalsFile::builtin()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DEFAULT_GOALS_FILE), "goals: []\n").unwrap();
        let explicit = dir.path().join("other.yaml");
        assert_eq!(
            resolve(Some(&explicit), dir.path()),
            GoalsSource::File(explicit)
        );
    }

    #[test]
    fn finds_local_goals_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DEFAULT_GOALS_FILE), "goals: []\n").unwrap();
        assert_eq!(
            resolve(None, dir.path()),
            GoalsSource::File(dir.path().join(DEFAULT_GOALS_FILE))
        );
    }

    #[test]
    fn falls_back_to_builtin() {
        let dir = TempDir::new().unwrap();
        let source = resolve(None, dir.path());
        assert_eq!(source, GoalsSource::Builtin);
        assert_eq!(load(&source).unwrap().goals.len(), 6);
    }

    #[test]
    fn load_error_names_the_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = load(&GoalsSource::File(missing)).unwrap_err();
        assert!(format!("{err:#}").contains("nope.yaml"));
    }
}
