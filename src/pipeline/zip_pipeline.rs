//! Zip pipeline (SPEC_FULL.md §4.5.3): builds a front-end project and wraps
//! its static output in a Capacitor-style native wrapper project.

use std::path::{Path, PathBuf};

use crate::domain::{ProgressSink, Task};

use crate::worker::heartbeat::with_heartbeat;

use super::common::{self, run_command, CommandSpec};
use super::error::{PipelineError, Result};
use super::project_type::{self, ProjectType};
use super::{auto_repair, gradle, icon, toolchain};

const DEFAULT_ICON_SIZE: u32 = 512;
const DEFAULT_ICON_COLOR: [u8; 4] = [0x33, 0x66, 0xcc, 0xff];
const INSTALL_TIMEOUT_SECS: u64 = 120;

pub async fn run(task: &Task, progress: &dyn ProgressSink) -> Result<PathBuf> {
    progress.report("Checking environment", 5);
    let sdk_root = common::resolve_android_sdk_root()?;
    let env = common::sdk_env(&sdk_root);
    let safe_app_name = crate::identifiers::sanitize_dir_name(&task.app_name);
    let workspace = common::prepare_workspace(&task.output_dir, &safe_app_name)?;

    progress.report("Extracting archive", 10);
    let extracted_root = workspace.join("src");
    extract_zip(&task.upload_path, &extracted_root)?;

    progress.report("Locating project root", 15);
    let project_root = project_type::find_project_root(&extracted_root)
        .ok_or(PipelineError::ProjectRootNotFound)?;

    progress.report("Detecting project type", 18);
    let project_type = project_type::detect(&project_root);
    let package_manager = toolchain::detect_package_manager(&project_root);

    if project_type == ProjectType::FrameworkStatic {
        progress.report("Writing static-export configuration", 20);
        write_next_static_export_config(&project_root)?;
    }

    if project_type == ProjectType::BundlerBased {
        progress.report("Auto-repairing project", 22);
        let config_path = find_vite_config(&project_root)?;
        auto_repair::repair(&project_root, &config_path)?;
    }

    progress.report("Installing dependencies", 25);
    with_heartbeat(
        progress,
        "Installing dependencies",
        25,
        38,
        install_dependencies(&project_root, package_manager, &env),
    )
    .await?;

    progress.report("Running project build", 40);
    with_heartbeat(
        progress,
        "Running project build",
        40,
        53,
        run_project_build(&project_root, package_manager),
    )
    .await?;

    progress.report("Verifying build output", 55);
    let output_dir = project_root.join(project_type.output_dir());
    if !output_dir.is_dir() {
        return Err(PipelineError::OutputDirMissing(output_dir.display().to_string()));
    }

    progress.report("Installing native-wrapper tooling", 60);
    let wrapper_dir = workspace.join("wrapper");
    let npx = ensure_wrapper_cli(&project_root, &env).await?;
    init_wrapper_project(&npx, &project_root, &wrapper_dir, task).await?;

    progress.report("Adding Android platform", 65);
    run_command(&CommandSpec::new(
        vec![npx.clone(), "cap".to_string(), "add".to_string(), "android".to_string()],
        project_root.clone(),
    ))
    .await?;

    progress.report("Syncing resources", 70);
    run_command(&CommandSpec::new(
        vec![npx.clone(), "cap".to_string(), "sync".to_string(), "android".to_string()],
        project_root.clone(),
    ))
    .await?;

    progress.report("Injecting icon", 75);
    let android_project_dir = project_root.join("android");
    let android_res_dir = android_project_dir.join("app/src/main/res");
    let icon_source = resolve_icon_source(&workspace, task.icon_path.as_deref())?;
    icon::inject_wrapper_icons(&android_res_dir, &icon_source)?;

    progress.report("Running Gradle debug build", 80);
    gradle::ensure_wrapper(&android_project_dir).await?;
    let built_apk = with_heartbeat(
        progress,
        "Running Gradle debug build",
        80,
        93,
        gradle::assemble_debug(&android_project_dir),
    )
    .await?;

    progress.report("Copying artifact", 95);
    let artifact_path = common::artifact_path(&task.output_dir, &task.app_name, &task.task_id);
    std::fs::copy(&built_apk, &artifact_path)?;
    verify_artifact_size(&built_apk, &artifact_path)?;

    progress.report("Done", 100);
    Ok(artifact_path)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}

fn find_vite_config(project_root: &Path) -> Result<PathBuf> {
    for name in ["vite.config.ts", "vite.config.js", "vite.config.mts", "vite.config.mjs"] {
        let candidate = project_root.join(name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(PipelineError::ProjectRootNotFound)
}

fn write_next_static_export_config(project_root: &Path) -> Result<()> {
    let config_path = project_root.join("next.config.js");
    let existing = std::fs::read_to_string(&config_path).unwrap_or_default();
    if existing.contains("output: 'export'") || existing.contains("output: \"export\"") {
        return Ok(());
    }
    std::fs::write(
        &config_path,
        "/** @type {import('next').NextConfig} */\nmodule.exports = { output: 'export' };\n",
    )?;
    Ok(())
}

async fn install_dependencies(
    project_root: &Path,
    package_manager: &str,
    env: &[(String, String)],
) -> Result<()> {
    let mut argv = vec![package_manager.to_string(), "install".to_string()];
    argv.push(match package_manager {
        "pnpm" => "--prod=false".to_string(),
        "npm" => "--include=dev".to_string(),
        _ => "--production=false".to_string(),
    });
    let mut spec = CommandSpec::new(argv, project_root.to_path_buf())
        .with_timeout(std::time::Duration::from_secs(INSTALL_TIMEOUT_SECS))
        .with_env("NODE_ENV", "development");
    for (key, value) in env {
        spec = spec.with_env(key.clone(), value.clone());
    }
    run_command(&spec).await?;
    Ok(())
}

async fn run_project_build(project_root: &Path, package_manager: &str) -> Result<()> {
    let argv = vec![package_manager.to_string(), "run".to_string(), "build".to_string()];
    run_command(&CommandSpec::new(argv, project_root.to_path_buf())).await?;
    Ok(())
}

async fn ensure_wrapper_cli(project_root: &Path, env: &[(String, String)]) -> Result<String> {
    let npx = toolchain::find("npx")?;
    let mut spec = CommandSpec::new(
        vec![
            npx.clone(),
            "--yes".to_string(),
            "--package".to_string(),
            "@capacitor/cli".to_string(),
            "cap".to_string(),
            "--version".to_string(),
        ],
        project_root.to_path_buf(),
    );
    for (key, value) in env {
        spec = spec.with_env(key.clone(), value.clone());
    }
    run_command(&spec).await?;
    Ok(npx)
}

async fn init_wrapper_project(
    npx: &str,
    project_root: &Path,
    _wrapper_dir: &Path,
    task: &Task,
) -> Result<()> {
    let capacitor_config = project_root.join("capacitor.config.json");
    if capacitor_config.exists() {
        return Ok(());
    }
    run_command(&CommandSpec::new(
        vec![
            npx.to_string(),
            "cap".to_string(),
            "init".to_string(),
            task.app_name.clone(),
            task.app_id.clone(),
            "--web-dir".to_string(),
            "dist".to_string(),
        ],
        project_root.to_path_buf(),
    ))
    .await?;
    Ok(())
}

fn resolve_icon_source(workspace: &Path, uploaded: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = uploaded {
        return Ok(path.to_path_buf());
    }
    let default_path = workspace.join("_default_icon.png");
    let canvas: image::ImageBuffer<image::Rgba<u8>, Vec<u8>> = image::ImageBuffer::from_pixel(
        DEFAULT_ICON_SIZE,
        DEFAULT_ICON_SIZE,
        image::Rgba(DEFAULT_ICON_COLOR),
    );
    canvas.save_with_format(&default_path, image::ImageFormat::Png)?;
    Ok(default_path)
}

fn verify_artifact_size(source: &Path, copied: &Path) -> Result<()> {
    let expected = std::fs::metadata(source)?.len();
    let actual = std::fs::metadata(copied)?.len();
    if expected != actual {
        return Err(PipelineError::ArtifactSizeMismatch { expected, actual });
    }
    Ok(())
}
