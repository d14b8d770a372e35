//! Gradle wrapper provisioning (SPEC_FULL.md §4.5.6).

use std::path::{Path, PathBuf};

use super::common::{run_command, CommandSpec};
use super::error::{PipelineError, Result};
use super::toolchain;

pub const GRADLE_VERSION: &str = "8.7";
const GRADLE_DIST_URL: &str =
    "https://services.gradle.org/distributions/gradle-8.7-bin.zip";

/// JVM heap cap applied to the build invocation, to bound memory use in
/// container environments.
const GRADLE_OPTS: &str = "-Xmx1024m";

/// Ensures `project_dir` has an executable `gradlew`, provisioning one if
/// absent: prefers a system Gradle on `PATH`, else downloads a pinned
/// distribution to a cacheable path under `~/.gradle/gradle-dist/`.
pub async fn ensure_wrapper(project_dir: &Path) -> Result<()> {
    let wrapper = project_dir.join("gradlew");
    if wrapper.exists() {
        make_executable(&wrapper)?;
        return Ok(());
    }

    let gradle_bin = if toolchain::is_present("gradle") {
        "gradle".to_string()
    } else {
        provision_cached_gradle().await?
    };

    run_command(&CommandSpec::new(
        vec![
            gradle_bin,
            "wrapper".to_string(),
            "--gradle-version".to_string(),
            GRADLE_VERSION.to_string(),
        ],
        project_dir.to_path_buf(),
    ))
    .await?;

    make_executable(&wrapper)
}

fn make_executable(wrapper: &Path) -> Result<()> {
    if !wrapper.exists() {
        return Err(PipelineError::ToolNotFound("gradlew".to_string()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(wrapper)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(wrapper, perms)?;
    }
    Ok(())
}

/// Downloads and unzips the pinned Gradle distribution into
/// `~/.gradle/gradle-dist/gradle-<version>/`, reusing the cache if already
/// populated, and returns the path to its `bin/gradle` launcher.
async fn provision_cached_gradle() -> Result<String> {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    let dist_root = PathBuf::from(home).join(".gradle/gradle-dist");
    let install_dir = dist_root.join(format!("gradle-{GRADLE_VERSION}"));
    let launcher = install_dir.join("bin/gradle");

    if launcher.exists() {
        return Ok(launcher.display().to_string());
    }

    std::fs::create_dir_all(&dist_root)?;
    let archive_path = dist_root.join(format!("gradle-{GRADLE_VERSION}-bin.zip"));

    let response = reqwest::get(GRADLE_DIST_URL).await?;
    let bytes = response.bytes().await?;
    std::fs::write(&archive_path, &bytes)?;

    extract_zip(&archive_path, &dist_root)?;
    let _ = std::fs::remove_file(&archive_path);

    if !launcher.exists() {
        return Err(PipelineError::ToolNotFound(
            "gradle launcher missing after extraction".to_string(),
        ));
    }
    make_executable(&launcher)?;
    Ok(launcher.display().to_string())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}

/// Runs `./gradlew assembleDebug --no-daemon` with a capped JVM heap.
pub async fn assemble_debug(project_dir: &Path) -> Result<PathBuf> {
    let wrapper = project_dir.join("gradlew");
    let spec = CommandSpec::new(
        vec![
            wrapper.display().to_string(),
            "assembleDebug".to_string(),
            "--no-daemon".to_string(),
        ],
        project_dir.to_path_buf(),
    )
    .with_env("GRADLE_OPTS", GRADLE_OPTS);

    run_command(&spec).await?;

    let apk = project_dir
        .join("app/build/outputs/apk/debug/app-debug.apk");
    if !apk.exists() {
        return Err(PipelineError::OutputDirMissing(apk.display().to_string()));
    }
    Ok(apk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn ensure_wrapper_is_a_no_op_when_present_and_executable() {
        let temp = TempDir::new().unwrap();
        let wrapper = temp.path().join("gradlew");
        std::fs::write(&wrapper, "#!/bin/sh\necho ok\n").unwrap();

        ensure_wrapper(temp.path()).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&wrapper).unwrap().permissions().mode();
            assert_ne!(mode & 0o111, 0);
        }
    }

    #[test]
    fn assemble_debug_surfaces_missing_apk_as_pipeline_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("gradlew"), "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(temp.path().join("gradlew"))
                .unwrap()
                .permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(temp.path().join("gradlew"), perms).unwrap();
        }

        let result = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(assemble_debug(temp.path()));
        assert!(matches!(result, Err(PipelineError::OutputDirMissing(_))));
    }
}
