//! HTML "offlineify" sub-pipeline (SPEC_FULL.md §4.5.4): rewrites a
//! CDN-dependent single HTML file into a self-contained bundle with a
//! compiled `app.js` and a `vendor/` directory of fetched files.

use std::path::{Path, PathBuf};

use futures::future::join_all;

use super::error::{PipelineError, Result};
use super::toolchain;
use crate::worker::http::{HttpClient, HttpConfig};

const BABEL_OPEN_TAG: &str = "<script type=\"text/babel\">";
const GOOGLE_FONTS_MARKER: &str = "fonts.googleapis.com";
const TAILWIND_CDN_MARKER: &str = "cdn.tailwindcss.com";

/// Known CDN `<script>`/`<link>` tags and the vendor file each rewrites to.
/// `(needle, vendor_filename, fetch_url)`.
const CDN_REWRITES: &[(&str, &str, &str)] = &[
    (
        "https://unpkg.com/react@18/umd/react.production.min.js",
        "react.production.min.js",
        "https://unpkg.com/react@18/umd/react.production.min.js",
    ),
    (
        "https://unpkg.com/react-dom@18/umd/react-dom.production.min.js",
        "react-dom.production.min.js",
        "https://unpkg.com/react-dom@18/umd/react-dom.production.min.js",
    ),
    (
        "https://cdn.tailwindcss.com",
        "",
        "",
    ),
];

/// Returns true if `html` matches any of the declared offlineify signatures.
pub fn needs_offlineify(html: &str) -> bool {
    html.contains(BABEL_OPEN_TAG)
        || html.contains(GOOGLE_FONTS_MARKER)
        || CDN_REWRITES
            .iter()
            .any(|(needle, _, _)| !needle.is_empty() && html.contains(needle))
}

pub struct OfflineifyOutput {
    pub html: String,
    pub app_js: Option<Vec<u8>>,
    pub vendor_dir: PathBuf,
}

/// Runs the full sub-pipeline, writing `app.js` and `vendor/` into
/// `output_dir` and returning the rewritten HTML.
pub async fn run(html: &str, output_dir: &Path) -> Result<OfflineifyOutput> {
    let vendor_dir = output_dir.join("vendor");
    std::fs::create_dir_all(&vendor_dir)?;

    let uses_tailwind_cdn = html.contains(TAILWIND_CDN_MARKER);

    let app_js = match extract_babel_block(html) {
        Some(jsx) => Some(compile_jsx(&jsx, output_dir).await?),
        None => None,
    };

    let mut rewritten = apply_rewrite_table(html);
    rewritten = strip_google_fonts(&rewritten);
    if app_js.is_some() {
        rewritten = replace_babel_tag_with_script_src(&rewritten);
    }

    fetch_vendor_files(&vendor_dir).await?;

    if uses_tailwind_cdn {
        run_tailwind_jit(html, &rewritten, app_js.as_deref(), &vendor_dir).await?;
    }

    Ok(OfflineifyOutput {
        html: rewritten,
        app_js,
        vendor_dir,
    })
}

fn extract_babel_block(html: &str) -> Option<String> {
    let start = html.find(BABEL_OPEN_TAG)? + BABEL_OPEN_TAG.len();
    let end = html[start..].find("</script>")? + start;
    Some(html[start..end].to_string())
}

async fn compile_jsx(jsx: &str, output_dir: &Path) -> Result<Vec<u8>> {
    if jsx.trim().is_empty() {
        return Err(PipelineError::NoBabelScript);
    }
    let source_path = output_dir.join("_inline.jsx");
    std::fs::write(&source_path, jsx)?;
    let output_path = output_dir.join("app.js");

    let babel = toolchain::find("babel").or_else(|_| toolchain::find("npx"))?;
    let argv = if babel.ends_with("npx") {
        vec![
            babel,
            "babel".to_string(),
            source_path.display().to_string(),
            "--presets=@babel/preset-react".to_string(),
            "--no-babelrc".to_string(),
            "-o".to_string(),
            output_path.display().to_string(),
        ]
    } else {
        vec![
            babel,
            source_path.display().to_string(),
            "--presets=@babel/preset-react".to_string(),
            "--no-babelrc".to_string(),
            "-o".to_string(),
            output_path.display().to_string(),
        ]
    };

    super::common::run_command(&super::common::CommandSpec::new(
        argv,
        output_dir.to_path_buf(),
    ))
    .await?;

    Ok(std::fs::read(&output_path)?)
}

fn apply_rewrite_table(html: &str) -> String {
    let mut out = html.to_string();
    for (needle, vendor_filename, _) in CDN_REWRITES {
        if vendor_filename.is_empty() {
            continue;
        }
        out = out.replace(*needle, &format!("./vendor/{vendor_filename}"));
    }
    out
}

fn strip_google_fonts(html: &str) -> String {
    html.lines()
        .filter(|line| !line.contains(GOOGLE_FONTS_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}

fn replace_babel_tag_with_script_src(html: &str) -> String {
    let Some(start) = html.find(BABEL_OPEN_TAG) else {
        return html.to_string();
    };
    let Some(rel_end) = html[start..].find("</script>") else {
        return html.to_string();
    };
    let end = start + rel_end + "</script>".len();
    format!(
        "{}<script src=\"./app.js\"></script>{}",
        &html[..start],
        &html[end..]
    )
}

async fn fetch_vendor_files(vendor_dir: &Path) -> Result<()> {
    let client = HttpClient::new(HttpConfig::default(), None)
        .map_err(|e| PipelineError::VendorFetchFailed("client init".to_string(), e.to_string()))?;

    let fetches = CDN_REWRITES
        .iter()
        .filter(|(_, vendor_filename, url)| !vendor_filename.is_empty() && !url.is_empty())
        .map(|(_, vendor_filename, url)| fetch_one(&client, vendor_dir, vendor_filename, url));

    for result in join_all(fetches).await {
        result?;
    }
    Ok(())
}

async fn fetch_one(client: &HttpClient, vendor_dir: &Path, filename: &str, url: &str) -> Result<()> {
    let bytes = client
        .download(url, Vec::new())
        .await
        .map_err(|e| PipelineError::VendorFetchFailed(url.to_string(), e.to_string()))?;
    std::fs::write(vendor_dir.join(filename), &bytes)?;
    Ok(())
}

async fn run_tailwind_jit(
    original_html: &str,
    rewritten_html: &str,
    app_js: Option<&[u8]>,
    vendor_dir: &Path,
) -> Result<()> {
    let scan_dir = vendor_dir.join("_tailwind_scan");
    std::fs::create_dir_all(&scan_dir)?;
    std::fs::write(scan_dir.join("rewritten.html"), rewritten_html)?;
    std::fs::write(scan_dir.join("original.html"), original_html)?;
    if let Some(js) = app_js {
        std::fs::write(scan_dir.join("app.js"), js)?;
    }

    let tailwind = toolchain::find("tailwindcss").or_else(|_| toolchain::find("npx"))?;
    let output_css = vendor_dir.join("tailwind.min.css");
    let argv = if tailwind.ends_with("npx") {
        vec![
            tailwind,
            "tailwindcss".to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-o".to_string(),
            output_css.display().to_string(),
            "--content".to_string(),
            format!("{}/**/*", scan_dir.display()),
            "--minify".to_string(),
        ]
    } else {
        vec![
            tailwind,
            "-i".to_string(),
            "-".to_string(),
            "-o".to_string(),
            output_css.display().to_string(),
            "--content".to_string(),
            format!("{}/**/*", scan_dir.display()),
            "--minify".to_string(),
        ]
    };

    super::common::run_command(&super::common::CommandSpec::new(
        argv,
        vendor_dir.to_path_buf(),
    ))
    .await?;

    let _ = std::fs::remove_dir_all(&scan_dir);
    Ok(())
}
