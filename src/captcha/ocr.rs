use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::cli::config::CaptchaSettings;

const CONTRAST_FACTOR: f32 = 2.0;
const BINARY_THRESHOLD: u8 = 127;
const CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Turns a challenge image into a candidate code
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> Option<String>;
}

/// Solver used when OCR is disabled
pub struct NullSolver;

#[async_trait]
impl CaptchaSolver for NullSolver {
    async fn solve(&self, _image: &[u8]) -> Option<String> {
        None
    }
}

/// Runs the `tesseract` binary on a cleaned-up copy of the challenge
pub struct TesseractSolver {
    binary: String,
    work_dir: PathBuf,
    min_len: usize,
    max_len: usize,
}

impl TesseractSolver {
    pub fn new(settings: &CaptchaSettings) -> Self {
        Self {
            binary: settings.tesseract_path.clone(),
            work_dir: std::env::temp_dir(),
            min_len: settings.min_len,
            max_len: settings.max_len,
        }
    }

    async fn run(&self, image: &[u8]) -> Result<String> {
        let decoded = image::load_from_memory(image).context("Failed to decode captcha image")?;
        let cleaned = preprocess(&decoded);

        let input = self.work_dir.join(format!("ecourts-captcha-{}.png", std::process::id()));
        DynamicImage::ImageLuma8(cleaned)
            .save_with_format(&input, ImageFormat::Png)
            .context(format!("Failed to write {}", input.display()))?;

        let output = self.invoke(&input).await;
        tokio::fs::remove_file(&input).await.ok();
        output
    }

    async fn invoke(&self, input: &Path) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg(input)
            .arg("stdout")
            .arg("--psm")
            .arg("7")
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", CHAR_WHITELIST))
            .output()
            .await
            .context(format!("Failed to run {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tesseract exited with {}: {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CaptchaSolver for TesseractSolver {
    async fn solve(&self, image: &[u8]) -> Option<String> {
        match self.run(image).await {
            Ok(raw) => {
                let candidate = accept_candidate(&raw, self.min_len, self.max_len);
                debug!("OCR read {:?}, candidate {:?}", raw.trim(), candidate);
                candidate
            }
            Err(e) => {
                warn!("OCR failed: {:#}", e);
                None
            }
        }
    }
}

/// Alphanumeric part of an OCR reading, if its length is within bounds
pub fn accept_candidate(raw: &str, min_len: usize, max_len: usize) -> Option<String> {
    let cleaned: String = raw.chars().filter(char::is_ascii_alphanumeric).collect();
    (min_len..=max_len).contains(&cleaned.len()).then_some(cleaned)
}

/// Grayscale, contrast boost, binarize, close then open, median smooth
pub fn preprocess(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let boosted = boost_contrast(&gray, CONTRAST_FACTOR);
    let binary = threshold(&boosted, BINARY_THRESHOLD);
    let closed = erode(&dilate(&binary));
    let opened = dilate(&erode(&closed));
    median3(&opened)
}

/// Stretch every pixel away from the mean brightness by `factor`
fn boost_contrast(image: &GrayImage, factor: f32) -> GrayImage {
    let pixels = image.as_raw();
    if pixels.is_empty() {
        return image.clone();
    }
    let mean = pixels.iter().map(|&p| p as f32).sum::<f32>() / pixels.len() as f32;

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0[0] as f32;
        Luma([(mean + (p - mean) * factor).round().clamp(0.0, 255.0) as u8])
    })
}

fn threshold(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Pixel values of the 2x2 window anchored at (x, y), clipped to the image
fn window2(image: &GrayImage, x: u32, y: u32) -> impl Iterator<Item = u8> + '_ {
    let (w, h) = image.dimensions();
    (y..(y + 2).min(h)).flat_map(move |yy| (x..(x + 2).min(w)).map(move |xx| image.get_pixel(xx, yy).0[0]))
}

fn dilate(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([window2(image, x, y).max().unwrap_or(0)])
    })
}

fn erode(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([window2(image, x, y).min().unwrap_or(0)])
    })
}

fn median3(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut window = Vec::with_capacity(9);
        for yy in y.saturating_sub(1)..(y + 2).min(h) {
            for xx in x.saturating_sub(1)..(x + 2).min(w) {
                window.push(image.get_pixel(xx, yy).0[0]);
            }
        }
        window.sort_unstable();
        Luma([window[window.len() / 2]])
    })
}
