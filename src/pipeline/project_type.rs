//! Front-end project-type detection (SPEC_FULL.md §4.5.7).

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    /// Modern bundler with a config file (Vite and equivalents).
    BundlerBased,
    /// Static-export framework (Next.js and equivalents).
    FrameworkStatic,
    /// Tooling-managed build (Create React App and equivalents).
    ToolingManaged,
    Unknown,
}

impl ProjectType {
    pub fn output_dir(self) -> &'static str {
        match self {
            ProjectType::BundlerBased => "dist",
            ProjectType::FrameworkStatic => "out",
            ProjectType::ToolingManaged => "build",
            ProjectType::Unknown => "dist",
        }
    }
}

const VITE_CONFIGS: &[&str] = &[
    "vite.config.js",
    "vite.config.ts",
    "vite.config.mts",
    "vite.config.mjs",
];

const NEXT_CONFIGS: &[&str] = &["next.config.js", "next.config.ts", "next.config.mjs"];

/// Detects the project type by config-file presence, falling back to a
/// `react-scripts` dependency scan of `package.json`.
pub fn detect(project_root: &Path) -> ProjectType {
    if VITE_CONFIGS.iter().any(|f| project_root.join(f).exists()) {
        return ProjectType::BundlerBased;
    }
    if NEXT_CONFIGS.iter().any(|f| project_root.join(f).exists()) {
        return ProjectType::FrameworkStatic;
    }
    if has_react_scripts_dependency(project_root) {
        return ProjectType::ToolingManaged;
    }
    ProjectType::Unknown
}

fn has_react_scripts_dependency(project_root: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string(project_root.join("package.json")) else {
        return false;
    };
    let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&contents) else {
        return false;
    };
    ["dependencies", "devDependencies"].iter().any(|section| {
        manifest
            .get(section)
            .and_then(|deps| deps.get("react-scripts"))
            .is_some()
    })
}

/// Finds the extracted archive's project root: the shallowest directory
/// containing `package.json` or `index.html`.
pub fn find_project_root(extracted_root: &Path) -> Option<std::path::PathBuf> {
    if extracted_root.join("package.json").exists() || extracted_root.join("index.html").exists()
    {
        return Some(extracted_root.to_path_buf());
    }
    for entry in walkdir::WalkDir::new(extracted_root)
        .min_depth(1)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir()
            && (entry.path().join("package.json").exists()
                || entry.path().join("index.html").exists())
        {
            return Some(entry.path().to_path_buf());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detects_vite_project() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("vite.config.ts"), "").unwrap();
        assert_eq!(detect(temp.path()), ProjectType::BundlerBased);
        assert_eq!(ProjectType::BundlerBased.output_dir(), "dist");
    }

    #[test]
    fn detects_next_project() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("next.config.js"), "").unwrap();
        assert_eq!(detect(temp.path()), ProjectType::FrameworkStatic);
        assert_eq!(ProjectType::FrameworkStatic.output_dir(), "out");
    }

    #[test]
    fn detects_cra_via_package_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("package.json"),
            r#"{"dependencies": {"react-scripts": "5.0.1"}}"#,
        )
        .unwrap();
        assert_eq!(detect(temp.path()), ProjectType::ToolingManaged);
    }

    #[test]
    fn unknown_falls_back_to_dist() {
        let temp = TempDir::new().unwrap();
        assert_eq!(detect(temp.path()), ProjectType::Unknown);
        assert_eq!(ProjectType::Unknown.output_dir(), "dist");
    }

    #[test]
    fn find_project_root_descends_into_nested_archive_entry() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("my-app");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("package.json"), "{}").unwrap();

        let found = find_project_root(temp.path()).unwrap();
        assert_eq!(found, nested);
    }

    #[test]
    fn find_project_root_none_when_absent() {
        let temp = TempDir::new().unwrap();
        assert!(find_project_root(temp.path()).is_none());
    }
}
