//! Tag functions: callables deriving a row's tag from a matched path.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use podprint_core::{FunctionInfo, Tag, described_fn};

described_fn! {
    info = default_tag_function_info;
    /// Tags a file with its stem under `file_name`.
    pub fn default_tag_function(path: &Path) -> Tag {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        Tag::from([("file_name".to_string(), stem)])
    }
}

/// A callable producing tags, paired with the descriptor used to identify it.
#[derive(Clone)]
pub struct TagFunction {
    info: FunctionInfo,
    func: Arc<dyn Fn(&Path) -> Tag + Send + Sync>,
}

impl TagFunction {
    /// `info` must describe `func`; it is all the hashers ever see of it.
    pub fn new(info: FunctionInfo, func: impl Fn(&Path) -> Tag + Send + Sync + 'static) -> Self {
        Self { info, func: Arc::new(func) }
    }

    pub fn info(&self) -> &FunctionInfo {
        &self.info
    }

    pub fn call(&self, path: &Path) -> Tag {
        (self.func)(path)
    }

    /// Whether this is the stem-based default, which yields one tag per file.
    pub fn is_default(&self) -> bool {
        self.info == default_tag_function_info()
    }
}

impl Default for TagFunction {
    fn default() -> Self {
        Self::new(default_tag_function_info(), default_tag_function)
    }
}

impl fmt::Debug for TagFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagFunction").field("info", &self.info).finish_non_exhaustive()
    }
}
