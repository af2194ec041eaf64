//! Processor and asset loader registries for cadenza exports.
//!
//! Components are looked up by a short capability tag and built by a plain
//! factory function. Both registries are filled from a static list when
//! created; there is no global state and no runtime plugin loading.
//!
//! # Features
//!
//! - **Discovery**: list every processor or loader with its metadata
//! - **Factory Pattern**: build components by tag from string parameters
//! - **Category System**: processors grouped by what they change
//!
//! # Example
//!
//! ```rust
//! use cadenza_registry::{Params, ProcessorCategory, ProcessorRegistry};
//!
//! let registry = ProcessorRegistry::new();
//! for processor in registry.all_processors() {
//!     println!("{}: {}", processor.id, processor.description);
//! }
//!
//! let mut params = Params::new();
//! params.insert("factor".into(), "0.5".into());
//! let gain = registry.create("gain", &params).unwrap();
//! assert_eq!(gain.name(), "gain");
//!
//! assert_eq!(registry.in_category(ProcessorCategory::Rate).len(), 1);
//! ```

mod loader;
mod processor;

pub use loader::{AssetLoaderRegistry, LoaderDescriptor, LoaderSetup};
pub use processor::{ProcessorCategory, ProcessorDescriptor, ProcessorRegistry};

use std::collections::BTreeMap;
use std::str::FromStr;

use cadenza_export::ExportError;

/// String parameters for a factory, keyed by parameter name.
pub type Params = BTreeMap<String, String>;

/// Failure to look up or build a component.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No processor with this id.
    #[error("unknown processor: {0}")]
    UnknownProcessor(String),

    /// No asset loader with this tag.
    #[error("unknown asset loader: {0}")]
    UnknownLoader(String),

    /// A required parameter is absent.
    #[error("{component}: missing parameter '{param}'")]
    MissingParam {
        /// Processor id or loader tag.
        component: String,
        /// Parameter name.
        param: &'static str,
    },

    /// A parameter could not be parsed or is out of range.
    #[error("{component}: invalid {param} '{value}': {reason}")]
    InvalidParam {
        /// Processor id or loader tag.
        component: String,
        /// Parameter name.
        param: &'static str,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Opening the asset failed.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Read parameter `name`, failing if absent or unparsable.
pub(crate) fn required<T>(
    component: &str,
    params: &Params,
    name: &'static str,
) -> Result<T, RegistryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = params.get(name).ok_or_else(|| RegistryError::MissingParam {
        component: component.to_owned(),
        param: name,
    })?;
    parse(component, name, raw)
}

/// Read parameter `name`, using `default` if absent.
pub(crate) fn optional<T>(
    component: &str,
    params: &Params,
    name: &'static str,
    default: T,
) -> Result<T, RegistryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    params
        .get(name)
        .map_or(Ok(default), |raw| parse(component, name, raw))
}

fn parse<T>(component: &str, name: &'static str, raw: &str) -> Result<T, RegistryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| invalid(component, name, raw, err))
}

pub(crate) fn invalid(
    component: &str,
    param: &'static str,
    value: &str,
    reason: impl std::fmt::Display,
) -> RegistryError {
    RegistryError::InvalidParam {
        component: component.to_owned(),
        param,
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}
