/// `config_struct!` defines a config section with embedded defaults
///
/// Each field is declared as `name: Type = default`. The macro generates the
/// struct with public fields, a `Default` impl built from the declared
/// defaults, and serde support with `#[serde(default)]` so partial TOML files
/// fill the gaps.
///
/// ```rust,ignore
/// config_struct! {
///     pub struct SchedulerConfig {
///         interval_secs: u64 = 30,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
