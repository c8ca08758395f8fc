//! Configuration Surface
//!
//! Named parameters come from a layered [`config`] source and are
//! snapshotted into a typed [`FeatureStreamConfig`].

use crate::error::FeatureError;
use file_channel::ByteOrder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Prefix of environment variables read by [`ConfigBuilder::env`]
pub const ENV_PREFIX: &str = "FEATKIT";

/// Parameter names
pub mod keys {
    /// Coefficients per frame
    pub const VECT_SIZE: &str = "vectSize";
    /// RAW, HTK, SPRO3 or SPRO4
    pub const FILE_FORMAT: &str = "loadFeatureFileFormat";
    /// Directory prefix of feature files
    pub const FILES_PATH: &str = "featureFilesPath";
    /// Extension appended to stream names
    pub const FILE_EXTENSION: &str = "loadFeatureFileExtension";
    /// Global byte-order flag
    pub const BIG_ENDIAN: &str = "bigEndian";
    /// Feature-file byte-order flag, wins over `bigEndian`
    pub const LOAD_BIG_ENDIAN: &str = "loadFeatureFileBigEndian";
    /// Buffer byte budget
    pub const LOAD_MEM_ALLOC: &str = "loadFeatureFileMemAlloc";
    /// Fallback buffer byte budget
    pub const SERVER_MEM_ALLOC: &str = "featureServerMemAlloc";
    /// `ALL_FEATURES` or a history size in frames
    pub const BUFFER_SIZE: &str = "featureServerBufferSize";
}

/// Named key/value parameters
#[derive(Debug, Clone, Default)]
pub struct Config {
    inner: config::Config,
}

/// Layered construction of a [`Config`]
pub struct ConfigBuilder {
    inner: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            inner: config::Config::builder(),
        }
    }

    /// Load parameters from a file whose format follows its extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        Self::builder().file(path.as_ref()).build()
    }

    /// Typed lookup; `Ok(None)` when the key is absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FeatureError> {
        match self.inner.get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(err) => Err(FeatureError::InvalidConfig(format!("{}: {}", key, err))),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, FeatureError> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, FeatureError> {
        self.get(key)
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, FeatureError> {
        self.get(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        !matches!(
            self.inner.get::<config::Value>(key),
            Err(config::ConfigError::NotFound(_))
        )
    }
}

impl ConfigBuilder {
    /// Set a parameter, overriding every other source
    pub fn set(self, key: &str, value: impl Into<config::Value>) -> Result<Self, FeatureError> {
        Ok(Self {
            inner: self.inner.set_override(key, value)?,
        })
    }

    /// Add a configuration file
    pub fn file(self, path: &Path) -> Self {
        Self {
            inner: self.inner.add_source(config::File::from(path)),
        }
    }

    /// Add `FEATKIT_*` environment variables
    pub fn env(self) -> Self {
        Self {
            inner: self
                .inner
                .add_source(config::Environment::with_prefix(ENV_PREFIX)),
        }
    }

    pub fn build(self) -> Result<Config, FeatureError> {
        Ok(Config {
            inner: self.inner.build()?,
        })
    }
}

/// Feature file layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    /// Headerless 32-bit floats
    Raw,
    /// HTK parameter file
    Htk,
    /// SPro 3.x feature file
    Spro3,
    /// SPro 4.x feature file with optional text header
    Spro4,
}

impl FromStr for FileFormat {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RAW" => Ok(FileFormat::Raw),
            "HTK" => Ok(FileFormat::Htk),
            "SPRO3" => Ok(FileFormat::Spro3),
            "SPRO4" => Ok(FileFormat::Spro4),
            other => Err(FeatureError::InvalidConfig(format!(
                "unknown feature file format '{}'",
                other
            ))),
        }
    }
}

impl Default for FileFormat {
    fn default() -> Self {
        FileFormat::Raw
    }
}

/// How far back a stream may seek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoricMode {
    /// Any past index is reachable
    Unlimited,
    /// Only indices within `size` of the high-water mark are reachable
    Limited { size: u64 },
}

impl FromStr for HistoricMode {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ALL_FEATURES") {
            return Ok(HistoricMode::Unlimited);
        }
        s.parse::<u64>()
            .map(|size| HistoricMode::Limited { size })
            .map_err(|_| {
                FeatureError::InvalidConfig(format!(
                    "{} must be ALL_FEATURES or a frame count, got '{}'",
                    keys::BUFFER_SIZE,
                    s
                ))
            })
    }
}

impl Default for HistoricMode {
    fn default() -> Self {
        HistoricMode::Unlimited
    }
}

/// Caller-side byte-order override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BigEndianOverride {
    /// Follow the configuration
    Auto,
    /// Force big-endian
    True,
    /// Force little-endian
    False,
}

impl Default for BigEndianOverride {
    fn default() -> Self {
        BigEndianOverride::Auto
    }
}

/// Typed snapshot of the parameters consumed by feature streams
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStreamConfig {
    /// Coefficients per frame, required for RAW files
    pub vect_size: Option<usize>,
    pub format: FileFormat,
    pub files_path: PathBuf,
    pub extension: String,
    pub big_endian: Option<bool>,
    pub load_big_endian: Option<bool>,
    /// Buffer byte budget
    pub mem_alloc: Option<u64>,
    pub historic: HistoricMode,
}

impl FeatureStreamConfig {
    /// RAW layout with `vect_size` coefficients and defaults elsewhere
    pub fn raw(vect_size: usize) -> Self {
        Self {
            vect_size: Some(vect_size),
            ..Self::default()
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FeatureError> {
        let vect_size = match config.get::<i64>(keys::VECT_SIZE)? {
            None => None,
            Some(v) if v >= 1 => Some(v as usize),
            Some(v) => {
                return Err(FeatureError::InvalidConfig(format!(
                    "{} must be >= 1, got {}",
                    keys::VECT_SIZE,
                    v
                )))
            }
        };
        let format = config
            .get_string(keys::FILE_FORMAT)?
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();
        let historic = config
            .get_string(keys::BUFFER_SIZE)?
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();
        let mem_alloc = match config.get_u64(keys::LOAD_MEM_ALLOC)? {
            Some(bytes) => Some(bytes),
            None => config.get_u64(keys::SERVER_MEM_ALLOC)?,
        };

        let parsed = Self {
            vect_size,
            format,
            files_path: config
                .get_string(keys::FILES_PATH)?
                .map(PathBuf::from)
                .unwrap_or_default(),
            extension: config.get_string(keys::FILE_EXTENSION)?.unwrap_or_default(),
            big_endian: config.get_bool(keys::BIG_ENDIAN)?,
            load_big_endian: config.get_bool(keys::LOAD_BIG_ENDIAN)?,
            mem_alloc,
            historic,
        };
        parsed.validate()?;
        debug!("Feature stream config: {:?}", parsed);
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), FeatureError> {
        match (self.vect_size, self.format) {
            (Some(0), _) => Err(FeatureError::InvalidConfig(format!(
                "{} must be >= 1",
                keys::VECT_SIZE
            ))),
            (None, FileFormat::Raw) => Err(FeatureError::InvalidConfig(format!(
                "{} is required for RAW feature files",
                keys::VECT_SIZE
            ))),
            _ => Ok(()),
        }
    }

    /// Resolve the file byte order
    ///
    /// Precedence: explicit override, then `loadFeatureFileBigEndian`, then
    /// `bigEndian`, then little-endian.
    pub fn byte_order(&self, endian: BigEndianOverride) -> ByteOrder {
        let big = match endian {
            BigEndianOverride::True => true,
            BigEndianOverride::False => false,
            BigEndianOverride::Auto => self
                .load_big_endian
                .or(self.big_endian)
                .unwrap_or(false),
        };
        ByteOrder::from_big_endian(big)
    }

    /// Full path of the feature file for stream `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.files_path.join(format!("{}{}", name, self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_config() {
        let config = Config::builder()
            .set(keys::VECT_SIZE, "13").unwrap()
            .set(keys::FILE_FORMAT, "spro4").unwrap()
            .set(keys::FILES_PATH, "/data/prm").unwrap()
            .set(keys::FILE_EXTENSION, ".prm").unwrap()
            .set(keys::LOAD_BIG_ENDIAN, "true").unwrap()
            .set(keys::SERVER_MEM_ALLOC, "4096").unwrap()
            .set(keys::BUFFER_SIZE, "50").unwrap()
            .build()
            .unwrap();

        let parsed = FeatureStreamConfig::from_config(&config).unwrap();
        assert_eq!(parsed.vect_size, Some(13));
        assert_eq!(parsed.format, FileFormat::Spro4);
        assert_eq!(parsed.load_big_endian, Some(true));
        assert_eq!(parsed.big_endian, None);
        assert_eq!(parsed.mem_alloc, Some(4096));
        assert_eq!(parsed.historic, HistoricMode::Limited { size: 50 });
        assert_eq!(parsed.path_for("spk01"), PathBuf::from("/data/prm/spk01.prm"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder().set(keys::VECT_SIZE, 2i64).unwrap().build().unwrap();
        let parsed = FeatureStreamConfig::from_config(&config).unwrap();
        assert_eq!(parsed.format, FileFormat::Raw);
        assert_eq!(parsed.historic, HistoricMode::Unlimited);
        assert_eq!(parsed.mem_alloc, None);
        assert_eq!(parsed.path_for("a"), PathBuf::from("a"));
    }

    #[test]
    fn test_load_mem_alloc_wins() {
        let config = Config::builder()
            .set(keys::VECT_SIZE, "1").unwrap()
            .set(keys::LOAD_MEM_ALLOC, "100").unwrap()
            .set(keys::SERVER_MEM_ALLOC, "200").unwrap()
            .build()
            .unwrap();
        assert_eq!(FeatureStreamConfig::from_config(&config).unwrap().mem_alloc, Some(100));
    }

    #[test]
    fn test_invalid_vect_size() {
        for bad in ["0", "-3", "abc"] {
            let config = Config::builder().set(keys::VECT_SIZE, bad).unwrap().build().unwrap();
            assert!(matches!(
                FeatureStreamConfig::from_config(&config),
                Err(FeatureError::InvalidConfig(_))
            ));
        }
        let missing = Config::builder().build().unwrap();
        assert!(matches!(
            FeatureStreamConfig::from_config(&missing),
            Err(FeatureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_htk_does_not_need_vect_size() {
        let config = Config::builder().set(keys::FILE_FORMAT, "HTK").unwrap().build().unwrap();
        let parsed = FeatureStreamConfig::from_config(&config).unwrap();
        assert_eq!(parsed.vect_size, None);
    }

    #[test]
    fn test_bad_format_and_history() {
        assert!("WAV".parse::<FileFormat>().is_err());
        assert!("lots".parse::<HistoricMode>().is_err());
        assert_eq!("all_features".parse::<HistoricMode>().unwrap(), HistoricMode::Unlimited);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "vectSize = 39").unwrap();
        writeln!(file, "featureServerBufferSize = \"ALL_FEATURES\"").unwrap();
        writeln!(file, "bigEndian = true").unwrap();
        file.flush().unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.exists(keys::VECT_SIZE));
        assert!(!config.exists(keys::LOAD_MEM_ALLOC));
        let parsed = FeatureStreamConfig::from_config(&config).unwrap();
        assert_eq!(parsed.vect_size, Some(39));
        assert_eq!(parsed.big_endian, Some(true));
    }

    #[test]
    fn test_byte_order_precedence() {
        use BigEndianOverride::{Auto, False, True};
        // (override, bigEndian, loadFeatureFileBigEndian, expected big-endian)
        let cases = [
            (Auto, None, None, false),
            (Auto, None, Some(false), false),
            (Auto, None, Some(true), true),
            (Auto, Some(false), None, false),
            (Auto, Some(false), Some(false), false),
            (Auto, Some(false), Some(true), true),
            (Auto, Some(true), None, true),
            (Auto, Some(true), Some(false), false),
            (Auto, Some(true), Some(true), true),
            (True, None, None, true),
            (True, None, Some(false), true),
            (True, None, Some(true), true),
            (True, Some(false), None, true),
            (True, Some(false), Some(false), true),
            (True, Some(false), Some(true), true),
            (True, Some(true), None, true),
            (True, Some(true), Some(false), true),
            (True, Some(true), Some(true), true),
            (False, None, None, false),
            (False, None, Some(false), false),
            (False, None, Some(true), false),
            (False, Some(false), None, false),
            (False, Some(false), Some(false), false),
            (False, Some(false), Some(true), false),
            (False, Some(true), None, false),
            (False, Some(true), Some(false), false),
            (False, Some(true), Some(true), false),
        ];
        for (endian, big_endian, load_big_endian, expected) in cases {
            let config = FeatureStreamConfig {
                big_endian,
                load_big_endian,
                ..FeatureStreamConfig::raw(1)
            };
            let order = config.byte_order(endian);
            assert_eq!(
                order,
                ByteOrder::from_big_endian(expected),
                "{:?} / {:?} / {:?}",
                endian,
                big_endian,
                load_big_endian
            );
            assert_eq!(order.needs_swap(), expected != cfg!(target_endian = "big"));
        }
    }
}
