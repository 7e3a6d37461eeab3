//! Function identity extraction.
//!
//! A [`FunctionInfo`] describes a callable: qualified name, parameters, return
//! type and declaration body. [`FunctionInfoExtractor`] reduces it to a stable
//! string under one of three [`HashMode`]s. The mode is folded into every
//! function digest, so extractions under different modes never compare equal
//! by accident.
//!
//! Descriptors are usually produced by [`described_fn!`](crate::described_fn),
//! which defines the function and a companion returning its descriptor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::canonical;
use crate::digest::Digest;

/// How much of a callable contributes to its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// Qualified name only. Cheapest, least discriminating.
    Name,
    /// Qualified name plus parameter list and annotations.
    Signature,
    /// Declaration body, optionally with name, module and declaration line.
    Content,
}

impl HashMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMode::Name => "name",
            HashMode::Signature => "signature",
            HashMode::Content => "content",
        }
    }
}

impl fmt::Display for HashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(HashMode::Name),
            "signature" => Ok(HashMode::Signature),
            "content" => Ok(HashMode::Content),
            other => Err(Error::InvalidArgument(format!(
                "unknown hash mode '{other}', expected name, signature or content"
            ))),
        }
    }
}

/// Toggles for `content` mode. Ignored by the other modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub include_name: bool,
    pub include_module: bool,
    pub include_declaration: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { include_name: true, include_module: true, include_declaration: true }
    }
}

impl ExtractOptions {
    /// Body only: two callables with different names or modules but the same
    /// body compare equal.
    pub fn body_only() -> Self {
        Self { include_name: false, include_module: false, include_declaration: false }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub type_name: Option<String>,
    pub has_default: bool,
}

/// Descriptor of a callable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// `None` for anonymous callables (closures).
    pub name: Option<String>,
    pub module: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Option<String>,
}

impl FunctionInfo {
    pub fn named(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self { name: Some(name.into()), module: module.into(), params: Vec::new(), return_type: None, body: None }
    }

    /// A callable without a stable name. Only `content` mode can identify it,
    /// and only when a body is attached.
    pub fn anonymous(module: impl Into<String>) -> Self {
        Self { name: None, module: module.into(), params: Vec::new(), return_type: None, body: None }
    }

    pub fn param(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.params.push(Param { name: name.into(), type_name: Some(type_name.into()), has_default: false });
        self
    }

    pub fn param_with(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn qualified_name(&self) -> Option<String> {
        self.name.as_ref().map(|name| {
            if self.module.is_empty() { name.clone() } else { format!("{}::{}", self.module, name) }
        })
    }

    fn declaration(&self, qualified: &str) -> String {
        let params = self
            .params
            .iter()
            .map(|p| {
                let mut out = p.name.clone();
                if let Some(ty) = &p.type_name {
                    out.push_str(": ");
                    out.push_str(&normalize_whitespace(ty));
                }
                if p.has_default {
                    out.push_str(" = ..");
                }
                out
            })
            .collect::<Vec<_>>()
            .join(", ");
        match &self.return_type {
            Some(ret) => format!("{qualified}({params}) -> {}", normalize_whitespace(ret)),
            None => format!("{qualified}({params})"),
        }
    }
}

/// Reduces [`FunctionInfo`] descriptors to stable strings and digests.
#[derive(Debug, Clone, Copy)]
pub struct FunctionInfoExtractor {
    default_mode: HashMode,
}

impl Default for FunctionInfoExtractor {
    fn default() -> Self {
        Self::new(HashMode::Signature)
    }
}

impl FunctionInfoExtractor {
    /// `default_mode` applies to embedded functions that do not declare a mode.
    pub fn new(default_mode: HashMode) -> Self {
        Self { default_mode }
    }

    pub fn default_mode(&self) -> HashMode {
        self.default_mode
    }

    /// Stable textual description of `info` under `mode`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCallableKind` for anonymous callables under `name` or
    /// `signature`, and for callables without a body under `content`.
    pub fn extract(&self, info: &FunctionInfo, mode: HashMode, options: &ExtractOptions) -> Result<String, Error> {
        match mode {
            HashMode::Name => require_name(info, mode),
            HashMode::Signature => {
                let qualified = require_name(info, mode)?;
                Ok(info.declaration(&qualified))
            }
            HashMode::Content => {
                let body = info.body.as_deref().ok_or_else(|| {
                    Error::UnsupportedCallableKind(format!(
                        "callable {} has no declaration body for content hashing",
                        info.qualified_name().unwrap_or_else(|| format!("<anonymous in {}>", info.module))
                    ))
                })?;

                let mut lines = Vec::with_capacity(4);
                if options.include_module {
                    lines.push(format!("module:{}", info.module));
                }
                if options.include_name {
                    lines.push(format!("name:{}", info.name.as_deref().unwrap_or("<anonymous>")));
                }
                if options.include_declaration {
                    let decl = match &info.name {
                        Some(name) => info.declaration(name),
                        None => info.declaration("<anonymous>"),
                    };
                    lines.push(format!("decl:{decl}"));
                }
                lines.push(format!("body:{}", normalize_whitespace(body)));
                Ok(lines.join("\n"))
            }
        }
    }

    /// Digest of the extraction under `mode`. The mode name is part of the hashed input.
    pub fn hash(&self, info: &FunctionInfo, mode: HashMode, options: &ExtractOptions) -> Result<Digest, Error> {
        let extracted = self.extract(info, mode, options)?;
        Ok(canonical::digest_strs(&[mode.as_str(), &extracted]))
    }
}

fn require_name(info: &FunctionInfo, mode: HashMode) -> Result<String, Error> {
    info.qualified_name().ok_or_else(|| {
        Error::UnsupportedCallableKind(format!(
            "anonymous callable in {} has no stable name for {mode} hashing; use content mode with a body",
            info.module
        ))
    })
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Define a function together with a companion returning its [`FunctionInfo`].
///
/// ```
/// use podprint_core::described_fn;
///
/// described_fn! {
///     info = double_info;
///     fn double(x: i64) -> i64 { x * 2 }
/// }
///
/// assert_eq!(double(2), 4);
/// assert_eq!(double_info().name.as_deref(), Some("double"));
/// ```
#[macro_export]
macro_rules! described_fn {
    (
        info = $info:ident;
        $(#[$attr:meta])*
        $vis:vis fn $name:ident ( $($arg:ident : $ty:ty),* $(,)? ) $(-> $ret:ty)? $body:block
    ) => {
        $(#[$attr])*
        $vis fn $name($($arg: $ty),*) $(-> $ret)? $body

        #[doc = concat!("Identity descriptor of `", stringify!($name), "`.")]
        $vis fn $info() -> $crate::function::FunctionInfo {
            $crate::function::FunctionInfo::named(stringify!($name), module_path!())
                $(.param(stringify!($arg), stringify!($ty)))*
                $(.returns(stringify!($ret)))?
                .body(stringify!($body))
        }
    };
}
