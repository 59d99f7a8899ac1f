#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use zip::ZipWriter;
use zip::write::FileOptions;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A solid-colour PNG whose red channel identifies it.
pub fn png(width: u32, height: u32, tag: u8) -> Vec<u8> {
    encode(&RgbaImage::from_pixel(width, height, Rgba([tag, 0, 0, 255])), ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let rgb = image::RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]));
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

pub fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Write a CBZ with the given members, in the given order. Names ending in
/// `/` become directory entries.
pub fn write_cbz(path: &Path, members: &[(&str, Vec<u8>)]) -> PathBuf {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in members {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
    path.to_path_buf()
}

/// Write loose files (and parent directories) under `dir`.
pub fn write_files(dir: &Path, files: &[(&str, Vec<u8>)]) {
    for (name, data) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }
}

/// Red channel of the centre pixel of a decoded page.
pub fn page_tag(canvas: &comic_pages::tiles::TileCanvas) -> u8 {
    let page = canvas.compose();
    page.get_pixel(page.width() / 2, page.height() / 2)[0]
}
