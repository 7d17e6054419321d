//! Engine-wide constants.

/// Recipe file loaded from the root directory, and from any directory passed to `include`.
pub const DEFAULT_RECIPE_FILE: &str = "simba.lua";

/// Build directory used when none is given, relative to the working directory.
pub const DEFAULT_BUILDDIR: &str = "builddir";

/// Name of the builder that runs when none is requested.
pub const DEFAULT_BUILDER: &str = "default";

/// A target with this name becomes its class default unless one is already set.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Fields starting with this prefix are reserved for the engine.
pub const PRIVATE_FIELD_PREFIX: char = '_';

/// File written into the build directory by the ninja builder.
pub const NINJA_FILE: &str = "build.ninja";

pub const NINJA_REQUIRED_VERSION: &str = "1.3";

/// Column at which the ninja writer wraps long statements.
pub const NINJA_LINE_WIDTH: usize = 78;
