//! HTML pipeline (SPEC_FULL.md §4.5.2): wraps a single HTML document in a
//! Cordova shell project and produces a debug APK.

use std::path::{Path, PathBuf};

use crate::domain::{ProgressSink, Task};

use crate::worker::heartbeat::with_heartbeat;

use super::common::{self, run_command, CommandSpec};
use super::error::{PipelineError, Result};
use super::{gradle, html_patch, icon, offlineify, toolchain};

/// Flat-color fallback icon used when the task carries no uploaded icon.
const DEFAULT_ICON_SIZE: u32 = 512;
const DEFAULT_ICON_COLOR: [u8; 4] = [0x33, 0x66, 0xcc, 0xff];

pub async fn run(task: &Task, progress: &dyn ProgressSink) -> Result<PathBuf> {
    progress.report("Checking environment", 5);
    let sdk_root = common::resolve_android_sdk_root()?;
    let env = common::sdk_env(&sdk_root);
    let safe_app_name = crate::identifiers::sanitize_dir_name(&task.app_name);
    let workspace = common::prepare_workspace(&task.output_dir, &safe_app_name)?;

    progress.report("Checking toolchain", 10);
    let cordova = ensure_cordova_present(&workspace, &env).await?;

    let original_html = std::fs::read_to_string(&task.upload_path)?;
    let mut html_source = original_html.clone();
    let mut extra_assets_dir: Option<PathBuf> = None;

    if offlineify::needs_offlineify(&original_html) {
        progress.report("Running offlineify", 15);
        let offlineify_dir = workspace.join("_offlineify");
        let output = offlineify::run(&original_html, &offlineify_dir).await?;
        html_source = output.html;
        extra_assets_dir = Some(output.vendor_dir.parent().unwrap().to_path_buf());
    }

    progress.report("Creating shell project", 25);
    let project_dir = workspace.join("shell");
    run_command(&CommandSpec::new(
        vec![
            cordova.clone(),
            "create".to_string(),
            project_dir.display().to_string(),
            task.app_id.clone(),
            safe_app_name.clone(),
        ],
        workspace.clone(),
    ))
    .await?;

    progress.report("Installing Android platform dependency", 32);
    with_heartbeat(progress, "Installing Android platform dependency", 32, 38, run_command(
        &CommandSpec::new(
            vec![cordova.clone(), "platform".to_string(), "add".to_string(), "android".to_string()],
            project_dir.clone(),
        )
        .with_timeout(std::time::Duration::from_secs(120)),
    ))
    .await?;

    progress.report("Adding Android platform", 38);
    // `platform add` above already performs the add+prepare step; this is a
    // defensive re-sync in case the wrapper's behavior changes across versions.
    let _ = run_command(&CommandSpec::new(
        vec![cordova.clone(), "prepare".to_string(), "android".to_string()],
        project_dir.clone(),
    ))
    .await;

    progress.report("Injecting icon", 42);
    let icon_source = resolve_icon_source(&workspace, task.icon_path.as_deref())?;
    let config_path = project_dir.join("config.xml");
    icon::inject_shell_icons(&project_dir, &icon_source, &config_path)?;

    progress.report("Copying HTML into web root", 45);
    let www_dir = project_dir.join("www");
    copy_into_web_root(&www_dir, &html_source, extra_assets_dir.as_deref())?;

    progress.report("Syncing web resources to Android", 55);
    run_command(&CommandSpec::new(
        vec![
            cordova.clone(),
            "prepare".to_string(),
            "android".to_string(),
        ],
        project_dir.clone(),
    ))
    .await?;

    let android_project_dir = project_dir.join("platforms/android");
    progress.report("Ensuring Gradle wrapper", 60);
    gradle::ensure_wrapper(&android_project_dir).await?;

    progress.report("Running Android debug build", 70);
    let built_apk = with_heartbeat(
        progress,
        "Running Android debug build",
        70,
        95,
        gradle::assemble_debug(&android_project_dir),
    )
    .await?;

    progress.report("Copying artifact", 95);
    let artifact_path = common::artifact_path(&task.output_dir, &task.app_name, &task.task_id);
    std::fs::copy(&built_apk, &artifact_path)?;

    progress.report("Done", 100);
    Ok(artifact_path)
}

async fn ensure_cordova_present(workspace: &Path, env: &[(String, String)]) -> Result<String> {
    if let Ok(path) = toolchain::find("cordova") {
        return Ok(path);
    }
    let npm = toolchain::find("npm")?;
    let mut spec = CommandSpec::new(
        vec![npm, "install".to_string(), "-g".to_string(), "cordova".to_string()],
        workspace.to_path_buf(),
    )
    .with_timeout(std::time::Duration::from_secs(120));
    for (key, value) in env {
        spec = spec.with_env(key.clone(), value.clone());
    }
    run_command(&spec).await?;
    toolchain::find("cordova")
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

fn copy_into_web_root(
    www_dir: &Path,
    html_source: &str,
    extra_assets_dir: Option<&Path>,
) -> Result<()> {
    std::fs::create_dir_all(www_dir)?;
    let patched = html_patch::patch(html_source);
    std::fs::write(www_dir.join("index.html"), patched)?;

    if let Some(assets_dir) = extra_assets_dir {
        for entry in walkdir::WalkDir::new(assets_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(assets_dir)
                .map_err(|_| PipelineError::ProjectRootNotFound)?;
            let dest = www_dir.join(relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest)?;
        }
    }

    Ok(())
}
