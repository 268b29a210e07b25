//! Provider registry infrastructure macros
//!
//! Used by the `registry` module for compile-time provider discovery via
//! `linkme` distributed slices. A provider implementation registers a
//! `{name, description, build}` entry; resolution maps a configuration
//! string to the matching constructor.

/// Implement registry infrastructure for a provider type
#[macro_export]
macro_rules! impl_registry {
    (
        provider_trait: $trait:path,
        config_type: $config:ty,
        entry_type: $entry:ident,
        slice_name: $slice:ident,
        resolve_fn: $resolve:ident,
        list_fn: $list:ident
    ) => {
        /// Registry entry for providers
        pub struct $entry {
            /// Unique provider name
            pub name: &'static str,
            /// Human-readable description
            pub description: &'static str,
            /// Constructor function to create a provider instance
            pub build: fn(&$config) -> std::result::Result<std::sync::Arc<dyn $trait>, String>,
        }

        #[linkme::distributed_slice]
        /// Distributed slice collecting registered providers.
        pub static $slice: [$entry] = [..];

        /// Resolve a provider by the name in `config`.
        ///
        /// # Errors
        ///
        /// Returns a `Configuration` error when the name is unknown
        /// (listing the available providers) or when the provider's
        /// constructor rejects the configuration.
        pub fn $resolve(config: &$config) -> $crate::error::Result<std::sync::Arc<dyn $trait>> {
            let requested = config.provider_name();

            for entry in $slice {
                if entry.name == requested {
                    return (entry.build)(config).map_err($crate::error::Error::configuration);
                }
            }

            let available: Vec<&str> = $slice.iter().map(|e| e.name).collect();
            Err($crate::error::Error::configuration(format!(
                "Unknown provider '{requested}'. Available providers: {available:?}"
            )))
        }

        /// List all registered providers as (name, description) pairs
        pub fn $list() -> Vec<(&'static str, &'static str)> {
            $slice.iter().map(|e| (e.name, e.description)).collect()
        }
    };
}
