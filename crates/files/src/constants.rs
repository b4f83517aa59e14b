/// Extension of every value file written by the store.
pub const VALUE_FILE_EXTENSION: &str = "json";

/// Extension used for in-progress writes before they are renamed into place.
pub const TEMP_FILE_EXTENSION: &str = "tmp";

/// Upper bound on key length, in bytes.
pub const MAX_KEY_LEN: usize = 512;
