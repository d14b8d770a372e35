//! Front-end project auto-repair for bundler-based projects
//! (SPEC_FULL.md §4.5.8). Runs before install; each change is a no-op if
//! already satisfied, and is logged for status reporting.

use std::path::Path;

use super::error::Result;

const LEGACY_TARGETS: &str = "chrome >= 52, android >= 5";

/// A watch-list of packages known to rely on an undeclared peer dependency.
const IMPLICIT_PEER_DEPENDENCIES: &[(&str, &str, &str)] = &[
    ("recharts", "react-is", "^18.0.0"),
    ("victory", "react-is", "^18.0.0"),
];

/// Packages commonly imported directly by generated source without ever
/// being declared in `package.json`, paired with a recommended version.
const BARE_IMPORT_WATCHLIST: &[(&str, &str)] = &[
    ("react-is", "^18.0.0"),
    ("prop-types", "^15.8.0"),
    ("classnames", "^2.5.0"),
];

const NODE_BUILTINS: &[&str] = &[
    "fs", "path", "os", "http", "https", "url", "crypto", "stream", "util",
    "events", "buffer", "assert", "child_process", "querystring", "zlib",
    "net", "tls", "dns", "readline", "process",
];

#[derive(Debug, Default)]
pub struct RepairReport {
    pub changes: Vec<String>,
}

impl RepairReport {
    fn log(&mut self, change: impl Into<String>) {
        let change = change.into();
        tracing::info!(change = %change, "auto-repair applied");
        self.changes.push(change);
    }
}

/// Runs every repair step over `project_root`'s Vite-family config and
/// entry sources, returning a log of what was changed.
pub fn repair(project_root: &Path, config_path: &Path) -> Result<RepairReport> {
    let mut report = RepairReport::default();
    repair_base_path(config_path, &mut report)?;
    repair_legacy_transpilation(project_root, config_path, &mut report)?;
    repair_entry_css(project_root, &mut report)?;
    repair_tailwind_scaffold(project_root, &mut report)?;
    repair_implicit_peer_dependencies(project_root, &mut report)?;
    repair_bare_imports_missing_from_manifest(project_root, &mut report)?;
    Ok(report)
}

fn repair_base_path(config_path: &Path, report: &mut RepairReport) -> Result<()> {
    let Ok(config) = std::fs::read_to_string(config_path) else {
        return Ok(());
    };
    if config.contains("base:") {
        return Ok(());
    }
    let patched = inject_into_default_export(&config, "base: './',");
    std::fs::write(config_path, patched)?;
    report.log("injected relative base path './' into build config");
    Ok(())
}

fn repair_legacy_transpilation(
    project_root: &Path,
    config_path: &Path,
    report: &mut RepairReport,
) -> Result<()> {
    let Ok(config) = std::fs::read_to_string(config_path) else {
        return Ok(());
    };
    if config.contains("@vitejs/plugin-legacy") {
        return Ok(());
    }
    let plugin_call = format!(
        "legacy({{ targets: ['{LEGACY_TARGETS}'], additionalLegacyPolyfills: ['regenerator-runtime/runtime'] }})"
    );
    let with_import = format!(
        "import legacy from '@vitejs/plugin-legacy'\n{config}"
    );
    let patched = inject_into_plugins_array(&with_import, &plugin_call);
    std::fs::write(config_path, patched)?;
    add_dev_dependency(project_root, "@vitejs/plugin-legacy", "^5.0.0")?;
    add_dev_dependency(project_root, "terser", "^5.0.0")?;
    report.log("added @vitejs/plugin-legacy for older Android webviews");
    Ok(())
}

fn repair_entry_css(project_root: &Path, report: &mut RepairReport) -> Result<()> {
    let index_html = project_root.join("index.html");
    let Ok(html) = std::fs::read_to_string(&index_html) else {
        return Ok(());
    };
    if !html.contains("index.css") {
        return Ok(());
    }
    let css_path = project_root.join("index.css");
    if css_path.exists() {
        return Ok(());
    }

    let uses_tailwind = tailwind_is_in_use(project_root, &html);
    let mut contents = String::new();
    if uses_tailwind {
        contents.push_str("@tailwind base;\n@tailwind components;\n@tailwind utilities;\n");
    }
    contents.push_str(
        "html, body, #root { height: 100%; width: 100%; margin: 0; padding: 0; }\n",
    );
    std::fs::write(&css_path, contents)?;
    report.log("created missing index.css entry stylesheet");
    Ok(())
}

fn repair_tailwind_scaffold(project_root: &Path, report: &mut RepairReport) -> Result<()> {
    let html = std::fs::read_to_string(project_root.join("index.html")).unwrap_or_default();
    if !tailwind_is_in_use(project_root, &html) {
        return Ok(());
    }
    if project_root.join("tailwind.config.js").exists() {
        return Ok(());
    }

    let tailwind_config = r#"module.exports = {
  content: ["./index.html", "./src/**/*.{js,ts,jsx,tsx}"],
  theme: { extend: {} },
  plugins: [],
};
"#;
    std::fs::write(project_root.join("tailwind.config.js"), tailwind_config)?;

    let postcss_config = r#"module.exports = {
  plugins: { tailwindcss: {}, autoprefixer: {} },
};
"#;
    std::fs::write(project_root.join("postcss.config.js"), postcss_config)?;
    report.log("scaffolded minimal Tailwind + PostCSS config");
    Ok(())
}

fn tailwind_is_in_use(project_root: &Path, html: &str) -> bool {
    if project_root.join("tailwind.config.js").exists() {
        return true;
    }
    if html.contains("tailwind") {
        return true;
    }
    walkdir::WalkDir::new(project_root.join("src"))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .any(|entry| {
            std::fs::read_to_string(entry.path())
                .map(|src| src.contains("className=\"") && src.contains("flex"))
                .unwrap_or(false)
        })
}

fn repair_implicit_peer_dependencies(project_root: &Path, report: &mut RepairReport) -> Result<()> {
    let Ok(contents) = std::fs::read_to_string(project_root.join("package.json")) else {
        return Ok(());
    };
    let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&contents) else {
        return Ok(());
    };

    for (package, peer, version) in IMPLICIT_PEER_DEPENDENCIES {
        let installed = manifest
            .get("dependencies")
            .and_then(|d| d.get(*package))
            .is_some();
        let peer_installed = manifest
            .get("dependencies")
            .and_then(|d| d.get(*peer))
            .is_some();
        if installed && !peer_installed {
            add_dependency(project_root, peer, version)?;
            report.log(format!("added implicit peer dependency {peer} required by {package}"));
        }
    }

    Ok(())
}

/// Scans `src/**` for bare import specifiers and adds any watch-listed
/// package that is used but declared nowhere in the manifest.
fn repair_bare_imports_missing_from_manifest(
    project_root: &Path,
    report: &mut RepairReport,
) -> Result<()> {
    let Ok(contents) = std::fs::read_to_string(project_root.join("package.json")) else {
        return Ok(());
    };
    let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&contents) else {
        return Ok(());
    };

    let imported = scan_bare_import_specifiers(&project_root.join("src"));

    for (package, version) in BARE_IMPORT_WATCHLIST {
        if !imported.iter().any(|spec| spec.as_str() == *package) {
            continue;
        }
        if NODE_BUILTINS.contains(package) {
            continue;
        }
        let already_declared = manifest
            .get("dependencies")
            .and_then(|d| d.get(*package))
            .is_some()
            || manifest
                .get("devDependencies")
                .and_then(|d| d.get(*package))
                .is_some();
        if already_declared {
            continue;
        }
        add_dependency(project_root, package, version)?;
        report.log(format!(
            "added {package} found imported in source but missing from the manifest"
        ));
    }

    Ok(())
}

/// Walks `src_dir` and collects the bare package name of every non-relative
/// `import ... from '...'` / `require('...')` specifier found.
fn scan_bare_import_specifiers(src_dir: &Path) -> Vec<String> {
    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(source) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for specifier in extract_import_specifiers(&source) {
            if let Some(package) = bare_package_name(&specifier) {
                found.push(package);
            }
        }
    }
    found
}

/// Extracts the quoted module specifier from `from '...'`/`from "..."` and
/// `require('...')`/`require("...")` occurrences in `source`.
fn extract_import_specifiers(source: &str) -> Vec<String> {
    let mut specifiers = Vec::new();
    for marker in ["from '", "from \"", "require('", "require(\""] {
        let mut rest = source;
        while let Some(start) = rest.find(marker) {
            let after = &rest[start + marker.len()..];
            let quote = marker.chars().last().unwrap();
            if let Some(end) = after.find(quote) {
                specifiers.push(after[..end].to_string());
                rest = &after[end + 1..];
            } else {
                break;
            }
        }
    }
    specifiers
}

/// Returns the importable package name for a bare specifier (e.g.
/// `"react-is/index"` -> `"react-is"`, `"@scope/pkg/sub"` -> `"@scope/pkg"`),
/// or `None` for relative (`./`, `../`) and absolute (`/`) specifiers.
fn bare_package_name(specifier: &str) -> Option<String> {
    if specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }
    let mut segments = specifier.splitn(3, '/');
    let first = segments.next()?;
    if let Some(scope_pkg) = first.strip_prefix('@') {
        let _ = scope_pkg;
        let second = segments.next()?;
        return Some(format!("{first}/{second}"));
    }
    Some(first.to_string())
}

fn inject_into_default_export(config: &str, line: &str) -> String {
    match config.find("defineConfig({") {
        Some(idx) => {
            let insert_at = idx + "defineConfig({".len();
            format!("{}\n  {}{}", &config[..insert_at], line, &config[insert_at..])
        }
        None => format!("{config}\n// auto-repair: {line}\n"),
    }
}

fn inject_into_plugins_array(config: &str, plugin_call: &str) -> String {
    match config.find("plugins: [") {
        Some(idx) => {
            let insert_at = idx + "plugins: [".len();
            format!(
                "{}{}, {}",
                &config[..insert_at],
                plugin_call,
                &config[insert_at..]
            )
        }
        None => format!("{config}\n// auto-repair: add {plugin_call} to plugins[]\n"),
    }
}

fn add_dev_dependency(project_root: &Path, name: &str, version: &str) -> Result<()> {
    add_to_manifest_section(project_root, "devDependencies", name, version)
}

fn add_dependency(project_root: &Path, name: &str, version: &str) -> Result<()> {
    add_to_manifest_section(project_root, "dependencies", name, version)
}

fn add_to_manifest_section(
    project_root: &Path,
    section: &str,
    name: &str,
    version: &str,
) -> Result<()> {
    let manifest_path = project_root.join("package.json");
    let contents = std::fs::read_to_string(&manifest_path)?;
    let mut manifest: serde_json::Value = serde_json::from_str(&contents)?;
    let entry = manifest
        .as_object_mut()
        .unwrap()
        .entry(section)
        .or_insert_with(|| serde_json::json!({}));
    entry
        .as_object_mut()
        .unwrap()
        .insert(name.to_string(), serde_json::json!(version));
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}
