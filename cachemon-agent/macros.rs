//! Declarative macros to reduce boilerplate across the cachemon codebase

/// Define a named enum with automatic `name()`, `all()` and `from_name()`
///
/// # Example
/// ```
/// use cachemon::metric_enum;
///
/// metric_enum! {
///     pub enum Unit {
///         Requests => "requests",
///         Misses => "misses",
///     }
/// }
///
/// let unit = Unit::Misses;
/// assert_eq!(unit.name(), "misses");
/// assert_eq!(Unit::from_name("requests"), Some(Unit::Requests));
/// assert_eq!(Unit::all().len(), 2);
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - A `name(&self) -> &'static str` method
/// - A `from_name(&str) -> Option<Self>` method (exact match on `name()`)
/// - An `all() -> Vec<Self>` method
/// - A `Display` impl printing `name()`
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn from_name(name: &str) -> Option<$name> {
                match name {
                    $($str => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
