//! Convenience macros for declaring the crate's many small, displayable,
//! byte-backed enums: product types, class bytes, command kinds, and the
//! like. Every PO/SAM status-word table and command catalog entry in
//! `catalog` is built from one of these.

/// A non-composite enum value that doesn't assign each `value` to the
/// `variant`'s discriminant, and as such allows for multiple `value`s per
/// `variant`.
///
/// This version supports fallible conversion, so not all patterns must be
/// present.
#[macro_export]
macro_rules! enum_no_repr_fallible {
	(
		$(#[$outer:meta])*
		$visibility:vis enum $name:ident: $typ:ty, $error_type:ty, {$error_fn:expr} {
	        $(
                $(#[doc = $doc:expr])?
	            $variant:ident = $pattern:pat => $string:literal,
	        )*
	    }
	) => {
		$(#[$outer])*
        $visibility enum $name {
            $(
                #[doc = concat!($string, " - ", stringify!($pattern))]
                $(#[doc = $doc])?
                $variant,
            )*
        }

        impl TryFrom<$typ> for $name {
            type Error = $error_type;

			fn try_from(value: $typ) -> Result<Self, $error_type> {
	            #[allow(clippy::redundant_closure_call)]
				match value {
					$($pattern => Ok(Self::$variant),)*
					_ => Err(($error_fn)(value)),
				}
			}
        }

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(match self {
					$(Self::$variant => $string,)*
				})
			}
		}
    };
}

/// A non-composite enum value that assigns each `value` to the `variant`'s
/// discriminant, and as such requires only one `value` per `variant`.
///
/// This version supports fallible conversion, so not all patterns must be
/// present.
#[macro_export]
macro_rules! enum_repr_fallible {
	(
		$(#[$outer:meta])*
		$visibility:vis enum $name:ident: $typ:ty, $error_type:ty, {$error_fn:expr} {
	        $(
                $(#[doc = $doc:expr])?
	            $variant:ident = $value:literal => $string:literal,
	        )*
	    }
	) => {
		#[repr($typ)]
		$(#[$outer])*
        $visibility enum $name {
            $(
                #[doc = concat!($string, " - ", stringify!($value))]
                $(#[doc = $doc])?
                $variant = $value,
            )*
        }

        impl TryFrom<$typ> for $name {
            type Error = $error_type;

			fn try_from(value: $typ) -> Result<Self, $error_type> {
	            #[allow(clippy::redundant_closure_call)]
				match value {
					$($value => Ok(Self::$variant),)*
					_ => Err(($error_fn)(value)),
				}
			}
        }

		impl From<$name> for $typ {
			fn from(value: $name) -> Self {
				value as $typ
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(match self {
					$(Self::$variant => $string,)*
				})
			}
		}
    };
}

/// A non-composite enum value that assigns each `value` to the `variant`'s
/// discriminant, and as such requires only one `value` per `variant`.
///
/// This version supports infallible conversion, so all patterns must be
/// present (used for the small closed sets like [`crate::catalog::ClassByte`]
/// where every input byte has a defined meaning once product type is known).
#[macro_export]
macro_rules! enum_repr_infallible {
	(
		$(#[$outer:meta])*
		$visibility:vis enum $name:ident: $typ:ty {
	        $(
                $(#[doc = $doc:expr])?
	            $variant:ident = $value:literal => $string:literal,
	        )*
	    }
	) => {
		#[repr($typ)]
		$(#[$outer])*
        $visibility enum $name {
            $(
                #[doc = concat!($string, " - ", stringify!($value))]
                $(#[doc = $doc])?
                $variant = $value,
            )*
        }

        impl From<$name> for $typ {
			fn from(value: $name) -> Self {
				value as $typ
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(match self {
					$(Self::$variant => $string,)*
				})
			}
		}
    };
}

/// Declares a command's status-word table: the `SW => (ErrorKind, message)`
/// mappings specific to that command, layered over the baseline table
/// shared by every command (see [`crate::catalog::lookup_status_word`]).
#[macro_export]
macro_rules! status_word_table {
	($vis:vis const $name:ident = { $($sw:literal => ($kind:expr, $msg:literal)),* $(,)? };) => {
		$vis const $name: &[(u16, $crate::error::ErrorKind, &'static str)] = &[
			$(($sw, $kind, $msg)),*
		];
	};
}
