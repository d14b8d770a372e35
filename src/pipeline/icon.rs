//! Icon injection across Android density buckets (SPEC_FULL.md §4.5.9).

use std::path::Path;

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{imageops::FilterType, ExtendedColorType, GenericImageView, ImageBuffer, ImageEncoder, Rgba};

use super::error::Result;

/// Writes `canvas` as a PNG with maximum compression (SPEC_FULL.md §4.5.9),
/// in place of `image`'s default-quality encoder.
fn save_png_max_compression(canvas: &ImageBuffer<Rgba<u8>, Vec<u8>>, dest: &Path) -> Result<()> {
    let file = std::fs::File::create(dest)?;
    let encoder = PngEncoder::new_with_quality(file, CompressionType::Best, PngFilterType::Adaptive);
    encoder.write_image(
        canvas.as_raw(),
        canvas.width(),
        canvas.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(())
}

/// Shell-style pipeline (HTML builds): ldpi 36 ... xxxhdpi 192.
pub const SHELL_DENSITIES: &[(&str, u32)] = &[
    ("ldpi", 36),
    ("mdpi", 48),
    ("hdpi", 72),
    ("xhdpi", 96),
    ("xxhdpi", 144),
    ("xxxhdpi", 192),
];

/// Wrapper-style pipeline (zip builds): mdpi 48 ... xxxhdpi 192.
pub const WRAPPER_DENSITIES: &[(&str, u32)] = &[
    ("mdpi", 48),
    ("hdpi", 72),
    ("xhdpi", 96),
    ("xxhdpi", 144),
    ("xxxhdpi", 192),
];

/// Resizes `source` to a `size`x`size` square using a "contain" fit:
/// scale preserving aspect ratio, then pad with transparent pixels.
pub fn resize_contain(source: &Path, size: u32) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>> {
    let img = image::open(source)?;
    let (width, height) = img.dimensions();
    let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
    let scaled_w = ((width as f32) * scale).round().max(1.0) as u32;
    let scaled_h = ((height as f32) * scale).round().max(1.0) as u32;

    let resized = img.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3).to_rgba8();

    let mut canvas: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(size, size, Rgba([0, 0, 0, 0]));
    let x_offset = (size - scaled_w) / 2;
    let y_offset = (size - scaled_h) / 2;
    image::imageops::overlay(&mut canvas, &resized, x_offset as i64, y_offset as i64);

    Ok(canvas)
}

/// Injects a resized icon at each shell-style density into the project's
/// icon asset directory (`res/icon/android/icon-<density>.png`), adding
/// `<icon>` entries to `config_path` if none exist yet.
pub fn inject_shell_icons(project_root: &Path, source: &Path, config_path: &Path) -> Result<()> {
    let icon_dir = project_root.join("res/icon/android");
    std::fs::create_dir_all(&icon_dir)?;

    for (density, size) in SHELL_DENSITIES {
        let canvas = resize_contain(source, *size)?;
        let dest = icon_dir.join(format!("icon-{density}.png"));
        save_png_max_compression(&canvas, &dest)?;
    }

    if let Ok(config) = std::fs::read_to_string(config_path) {
        if !config.contains("<icon") {
            let entries: String = SHELL_DENSITIES
                .iter()
                .map(|(density, _)| {
                    format!(
                        "    <icon density=\"{density}\" src=\"res/icon/android/icon-{density}.png\" />\n"
                    )
                })
                .collect();
            let patched = match config.find("</widget>") {
                Some(idx) => {
                    format!(
                        "{}<platform name=\"android\">\n{}</platform>\n{}",
                        &config[..idx],
                        entries,
                        &config[idx..]
                    )
                }
                None => config,
            };
            std::fs::write(config_path, patched)?;
        }
    }

    Ok(())
}

/// Injects a resized icon at each wrapper-style density into
/// `mipmap-<density>` directories, overwriting both the square and round
/// launcher variants and removing any adaptive-icon override directory
/// (adaptive icons crop ~18% from edges, which clips a "contain"-fit icon).
pub fn inject_wrapper_icons(android_res_dir: &Path, source: &Path) -> Result<()> {
    for (density, size) in WRAPPER_DENSITIES {
        let canvas = resize_contain(source, *size)?;
        let mipmap_dir = android_res_dir.join(format!("mipmap-{density}"));
        std::fs::create_dir_all(&mipmap_dir)?;
        save_png_max_compression(&canvas, &mipmap_dir.join("ic_launcher.png"))?;
        save_png_max_compression(&canvas, &mipmap_dir.join("ic_launcher_round.png"))?;
    }

    let adaptive_dir = android_res_dir.join("mipmap-anydpi-v26");
    if adaptive_dir.exists() {
        std::fs::remove_dir_all(&adaptive_dir)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_test_source(path: &Path, width: u32, height: u32) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([255, 0, 0]));
        img.save_with_format(path, image::ImageFormat::Png).unwrap();
    }

    #[test]
    fn resize_contain_produces_square_output() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("icon.png");
        write_test_source(&source, 200, 100);

        let canvas = resize_contain(&source, 96).unwrap();
        assert_eq!(canvas.width(), 96);
        assert_eq!(canvas.height(), 96);
    }

    #[test]
    fn resize_contain_pads_transparent_for_non_square_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("icon.png");
        write_test_source(&source, 200, 100);

        let canvas = resize_contain(&source, 96).unwrap();
        // Corner pixel should be padding, fully transparent.
        let corner = canvas.get_pixel(0, 0);
        assert_eq!(corner[3], 0);
    }

    #[test]
    fn inject_wrapper_icons_removes_adaptive_override() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("icon.png");
        write_test_source(&source, 64, 64);

        let res_dir = temp.path().join("res");
        std::fs::create_dir_all(res_dir.join("mipmap-anydpi-v26")).unwrap();

        inject_wrapper_icons(&res_dir, &source).unwrap();

        assert!(!res_dir.join("mipmap-anydpi-v26").exists());
        assert!(res_dir.join("mipmap-xxxhdpi/ic_launcher.png").exists());
        assert!(res_dir.join("mipmap-xxxhdpi/ic_launcher_round.png").exists());
    }

    #[test]
    fn injected_icons_are_valid_decodable_png() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("icon.png");
        write_test_source(&source, 64, 64);

        let res_dir = temp.path().join("res");
        inject_wrapper_icons(&res_dir, &source).unwrap();

        let decoded = image::open(res_dir.join("mipmap-xxxhdpi/ic_launcher.png")).unwrap();
        assert_eq!(decoded.dimensions(), (192, 192));
    }
}
