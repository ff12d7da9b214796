use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, debug, error};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScraperConfig {
    pub portal: PortalSettings,
    pub captcha: CaptchaSettings,
    pub output: OutputSettings,
    pub pdf: PdfSettings,
}

/// Connection settings for the court-records portal
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PortalSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
    /// Optional outbound proxy, e.g. `socks5://127.0.0.1:1080`
    pub proxy: Option<String>,
}

/// Captcha acquisition settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CaptchaSettings {
    pub ocr_enabled: bool,
    pub tesseract_path: String,
    /// Where the fetched challenge image is written for a human to look at
    pub image_dir: Option<PathBuf>,
    pub min_len: usize,
    pub max_len: usize,
}

/// Result output settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    /// Keep the last raw cause-list fragment next to the results
    pub save_raw_html: bool,
}

/// PDF rendering settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PdfSettings {
    pub wkhtmltopdf_path: Option<String>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            base_url: "https://services.ecourts.gov.in/ecourtindia_v6".to_string(),
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            proxy: None,
        }
    }
}

impl Default for CaptchaSettings {
    fn default() -> Self {
        Self {
            ocr_enabled: false,
            tesseract_path: "tesseract".to_string(),
            image_dir: Some(PathBuf::from("output")),
            min_len: 4,
            max_len: 8,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            save_raw_html: true,
        }
    }
}

impl ScraperConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        let mut path = if let Some(proj_dirs) = directories::ProjectDirs::from("in", "ecourts-scraper", "ecourts-scraper") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        // Create the profiles directory if it doesn't exist
        path.push("profiles");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        path.pop();
        path
    }

    /// Load a named profile, or the default configuration
    pub fn load(profile: Option<&str>) -> Result<Self> {
        match profile {
            Some(name) => Self::load_profile(name),
            None => Self::load_default(),
        }
    }

    /// Load the default configuration
    pub fn load_default() -> Result<Self> {
        let config_path = Self::config_dir().join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let profile_path = Self::config_dir().join("profiles").join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_path = Self::config_dir().join("default.yaml");
        self.save_to_file(&config_path)
    }

    /// Save the configuration as a profile
    pub fn save_as_profile(&self, profile: &str) -> Result<PathBuf> {
        let profile_path = Self::config_dir().join("profiles").join(format!("{}.yaml", profile));
        self.save_to_file(&profile_path)?;
        Ok(profile_path)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let profiles_dir = Self::config_dir().join("profiles");

        if !profiles_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(profiles_dir)? {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}
