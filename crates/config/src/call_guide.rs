//! Call guide file loading
//!
//! Guides are authored as YAML (`.yaml`/`.yml`) or JSON (`.json`). Every
//! loaded guide is validated before it is returned.

use std::path::Path;

use interview_agent_core::CallGuide;

use crate::ConfigError;

/// Serialization format of a guide document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideFormat {
    Yaml,
    Json,
}

impl GuideFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Some(GuideFormat::Yaml),
            Some("json") => Some(GuideFormat::Json),
            _ => None,
        }
    }
}

/// Parse and validate a guide document
pub fn parse_call_guide(content: &str, format: GuideFormat) -> Result<CallGuide, ConfigError> {
    let guide: CallGuide = match format {
        GuideFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        }
        GuideFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        }
    };

    guide.validate().map_err(|e| ConfigError::InvalidValue {
        field: "call_guide".to_string(),
        message: e.to_string(),
    })?;

    Ok(guide)
}

/// Load a single guide file
pub fn load_call_guide(path: impl AsRef<Path>) -> Result<CallGuide, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let format = GuideFormat::from_path(path).ok_or_else(|| ConfigError::InvalidValue {
        field: "call_guide".to_string(),
        message: format!("unsupported file extension: {}", path.display()),
    })?;

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    parse_call_guide(&content, format)
}

/// Load every guide in a directory
///
/// Files with other extensions are ignored. A file that fails to parse is
/// logged and skipped so one bad guide does not block the rest.
pub fn load_call_guides_dir(dir: impl AsRef<Path>) -> Result<Vec<CallGuide>, ConfigError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|_| ConfigError::FileNotFound(dir.display().to_string()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && GuideFormat::from_path(path).is_some())
        .collect();
    paths.sort();

    let mut guides = Vec::with_capacity(paths.len());
    for path in paths {
        match load_call_guide(&path) {
            Ok(guide) => {
                tracing::debug!(path = %path.display(), guide_id = %guide.guide_id, "Loaded call guide");
                guides.push(guide);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping invalid call guide");
            }
        }
    }

    Ok(guides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GUIDE_YAML: &str = r#"
guide_id: onboarding-study
name: Onboarding Study
research_objective: Understand how new users get started
estimated_duration_minutes: 20
max_duration_minutes: 30
sections:
  - section_name: Background
    questions:
      - id: q1
        text: How did you first hear about the product?
        type: open
        follow_up_triggers:
          - condition: vague
            action: drill_deeper
            priority: 8
      - id: q2
        text: How often do you use it?
        type: multiple_choice
  - section_name: Experience
    skip_conditions: ["never used"]
    questions:
      - id: q3
        text: What was the hardest part of getting started?
"#;

    #[test]
    fn test_parse_yaml_guide() {
        let guide = parse_call_guide(GUIDE_YAML, GuideFormat::Yaml).unwrap();
        assert_eq!(guide.guide_id, "onboarding-study");
        assert_eq!(guide.total_questions(), 3);
        assert_eq!(guide.time_budget_seconds(), 30 * 60);
        let (_, q1) = guide.find_question("q1").unwrap();
        assert_eq!(q1.follow_up_triggers[0].priority, 8);
        assert_eq!(q1.max_follow_ups, 3);
        assert_eq!(guide.sections[1].skip_conditions, vec!["never used"]);
    }

    #[test]
    fn test_parse_json_guide() {
        let yaml_guide = parse_call_guide(GUIDE_YAML, GuideFormat::Yaml).unwrap();
        let json = serde_json::to_string(&yaml_guide).unwrap();
        let guide = parse_call_guide(&json, GuideFormat::Json).unwrap();
        assert_eq!(guide.name, "Onboarding Study");
        assert_eq!(guide.sections.len(), 2);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_call_guide("sections: [", GuideFormat::Yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_call_guide("/nonexistent/guide.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();

        let mut good = std::fs::File::create(dir.path().join("study.yaml")).unwrap();
        good.write_all(GUIDE_YAML.as_bytes()).unwrap();

        let mut bad = std::fs::File::create(dir.path().join("broken.json")).unwrap();
        bad.write_all(b"{ not json").unwrap();

        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let guides = load_call_guides_dir(dir.path()).unwrap();
        assert_eq!(guides.len(), 1);
        assert_eq!(guides[0].guide_id, "onboarding-study");
    }

    #[test]
    fn test_shipped_guides_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/call_guides");
        let guides = load_call_guides_dir(&dir).unwrap();
        let guide = guides
            .iter()
            .find(|g| g.guide_id == "product-feedback")
            .unwrap();
        assert_eq!(guide.total_questions(), 5);
        assert_eq!(guide.find_question("recommend").unwrap().1.max_follow_ups, 1);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(GuideFormat::from_path(Path::new("a.YML")), Some(GuideFormat::Yaml));
        assert_eq!(GuideFormat::from_path(Path::new("a.json")), Some(GuideFormat::Json));
        assert_eq!(GuideFormat::from_path(Path::new("a.toml")), None);
    }
}
