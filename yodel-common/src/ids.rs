//! ULID identifiers. ULIDs sort by creation time, which the stores rely on
//! for stable child ordering.

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(ulid::Ulid);

        impl $name {
            #[must_use]
            pub const fn new(id: ulid::Ulid) -> Self {
                Self(id)
            }

            /// Generate a new unique identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(ulid::Ulid::new())
            }

            #[must_use]
            pub const fn ulid(&self) -> ulid::Ulid {
                self.0
            }

            /// Milliseconds since the Unix epoch encoded in this identifier
            #[must_use]
            pub const fn timestamp_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ulid::Ulid::from_string(s).map(Self)
            }
        }
    };
}

identifier!(
    /// Identifier of a single Yo, parent or child
    YoId
);
identifier!(UserId);
identifier!(
    /// Identifier of a registered push endpoint (device)
    EndpointId
);
identifier!(HeaderId);
