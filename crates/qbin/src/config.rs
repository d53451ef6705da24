//! Limits applied by unpackers to untrusted input.

/// Static limits for an unpacker.
///
/// Implement this on a marker type to tune an unpacker without threading
/// values through every constructor:
///
/// ```ignore
/// struct Shallow;
///
/// impl Config for Shallow {
///     fn max_depth() -> usize { 4 }
/// }
///
/// let converter = Converter::with_config::<Shallow>(&value);
/// ```
pub trait Config: Send + Sync + 'static {
    /// Maximum number of simultaneously open containers.
    #[must_use]
    fn max_depth() -> usize { 32 }

    /// Maximum element count a stream may declare for one array or map.
    #[must_use]
    fn max_container_len() -> usize { u32::MAX as usize }

    /// Maximum length of a single raw byte string read from a stream.
    #[must_use]
    fn max_raw_len() -> usize { 64 * 1024 * 1024 }
}

/// The default limits: 32 levels of nesting, wire-maximum container
/// lengths and 64 MiB raw strings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
)]
pub struct DefaultConfig;

impl Config for DefaultConfig {}
