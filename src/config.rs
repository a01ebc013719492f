//! Batching configuration of a flush cycle.
//!
//! Configuration is explicit: it is handed to [`schedule`](crate::schedule)
//! and [`FlushCycle`](crate::FlushCycle) rather than read from ambient state.

use alloc::format;
use alloc::string::ToString;
use core::num::NonZeroUsize;

use crate::{builders::ActionKind, errors::Error};

/// Default maximum number of statements per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Setting key for the maximum batch size.
pub const BATCH_SIZE: &str = "batch_size";
/// Setting key for the insert reordering toggle.
pub const ORDER_INSERTS: &str = "order_inserts";
/// Setting key for the update reordering toggle.
pub const ORDER_UPDATES: &str = "order_updates";

/// Property file name of [`BATCH_SIZE`].
pub const BATCH_SIZE_PROPERTY: &str = "hibernate.jdbc.batch_size";
/// Property file name of [`ORDER_INSERTS`].
pub const ORDER_INSERTS_PROPERTY: &str = "hibernate.order_inserts";
/// Property file name of [`ORDER_UPDATES`].
pub const ORDER_UPDATES_PROPERTY: &str = "hibernate.order_updates";

/// How pending actions are ordered and grouped into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawBatchConfig", into = "RawBatchConfig")
)]
pub struct BatchConfig {
    max_batch_size: NonZeroUsize,
    order_inserts: bool,
    order_updates: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            order_inserts: true,
            order_updates: true,
        }
    }
}

impl BatchConfig {
    /// Creates a configuration with the given maximum batch size and both
    /// reordering toggles enabled.
    ///
    /// # Errors
    ///
    /// * `Configuration` - If `max_batch_size` is zero.
    pub fn new(max_batch_size: usize) -> Result<Self, Error> {
        let max_batch_size = NonZeroUsize::new(max_batch_size)
            .ok_or_else(|| Error::Configuration("batch size must be positive".to_string()))?;
        Ok(Self {
            max_batch_size,
            ..Self::default()
        })
    }

    /// Parses a configuration from string settings, as found in a
    /// persistence unit's property file.
    ///
    /// Recognized keys are [`BATCH_SIZE`], [`ORDER_INSERTS`] and
    /// [`ORDER_UPDATES`], each also under its qualified property file name
    /// ([`BATCH_SIZE_PROPERTY`] and so on). Missing keys keep their defaults
    /// and unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// * `Configuration` - If a value cannot be parsed or the batch size is not positive.
    ///
    /// # Example
    ///
    /// ```
    /// use dml_batcher::BatchConfig;
    ///
    /// let config = BatchConfig::from_settings([("batch_size", "10"), ("order_inserts", "true")]).unwrap();
    /// assert_eq!(config.max_batch_size(), 10);
    /// assert!(config.order_inserts());
    /// assert!(BatchConfig::from_settings([("batch_size", "0")]).is_err());
    ///
    /// let config = BatchConfig::from_settings([("hibernate.order_updates", "false")]).unwrap();
    /// assert!(!config.order_updates());
    /// ```
    pub fn from_settings<'s>(
        settings: impl IntoIterator<Item = (&'s str, &'s str)>,
    ) -> Result<Self, Error> {
        let mut config = Self::default();
        for (key, value) in settings {
            let value = value.trim();
            let key = key.trim();
            match key {
                BATCH_SIZE | BATCH_SIZE_PROPERTY => {
                    let size: i64 = value.parse().map_err(|_| {
                        Error::Configuration(format!("`{key}` is not an integer: `{value}`"))
                    })?;
                    let size = usize::try_from(size).map_err(|_| {
                        Error::Configuration("batch size must be positive".to_string())
                    })?;
                    config = Self {
                        order_inserts: config.order_inserts,
                        order_updates: config.order_updates,
                        ..Self::new(size)?
                    };
                }
                ORDER_INSERTS | ORDER_INSERTS_PROPERTY => {
                    config.order_inserts = parse_flag(key, value)?;
                }
                ORDER_UPDATES | ORDER_UPDATES_PROPERTY => {
                    config.order_updates = parse_flag(key, value)?;
                }
                _ => {}
            }
        }
        Ok(config)
    }

    /// Enables or disables reordering of inserts.
    #[must_use]
    pub fn with_order_inserts(mut self, enabled: bool) -> Self {
        self.order_inserts = enabled;
        self
    }

    /// Enables or disables reordering of updates.
    #[must_use]
    pub fn with_order_updates(mut self, enabled: bool) -> Self {
        self.order_updates = enabled;
        self
    }

    /// Maximum number of statements per batch.
    #[inline]
    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.get()
    }

    /// Whether inserts may be reordered to coalesce batches.
    #[inline]
    #[must_use]
    pub fn order_inserts(&self) -> bool {
        self.order_inserts
    }

    /// Whether updates may be reordered to coalesce batches.
    #[inline]
    #[must_use]
    pub fn order_updates(&self) -> bool {
        self.order_updates
    }

    /// Whether actions of `kind` may be pulled ahead of program order to
    /// join a batch. Deletes never are.
    #[must_use]
    pub fn reorders(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Insert => self.order_inserts,
            ActionKind::Update => self.order_updates,
            ActionKind::Delete => false,
        }
    }

    /// Whether any dependency-aware reordering is enabled at all.
    #[must_use]
    pub fn is_ordering(&self) -> bool {
        self.order_inserts || self.order_updates
    }

    /// Whether actions of `kind` are written in raw enqueue order.
    ///
    /// Inserts and updates follow their own toggle. Deletes follow the
    /// dependency graph unless all reordering is disabled.
    #[must_use]
    pub fn keeps_program_order(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Insert => !self.order_inserts,
            ActionKind::Update => !self.order_updates,
            ActionKind::Delete => !self.is_ordering(),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::Configuration(format!("`{key}` is not a boolean: `{value}`")))
    }
}

/// Unvalidated form of [`BatchConfig`] used for deserialization.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawBatchConfig {
    #[serde(default = "default_batch_size")]
    max_batch_size: usize,
    #[serde(default = "enabled")]
    order_inserts: bool,
    #[serde(default = "enabled")]
    order_updates: bool,
}

#[cfg(feature = "serde")]
const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[cfg(feature = "serde")]
const fn enabled() -> bool {
    true
}

#[cfg(feature = "serde")]
impl TryFrom<RawBatchConfig> for BatchConfig {
    type Error = Error;

    fn try_from(raw: RawBatchConfig) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.max_batch_size)?
            .with_order_inserts(raw.order_inserts)
            .with_order_updates(raw.order_updates))
    }
}

#[cfg(feature = "serde")]
impl From<BatchConfig> for RawBatchConfig {
    fn from(config: BatchConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size(),
            order_inserts: config.order_inserts,
            order_updates: config.order_updates,
        }
    }
}
