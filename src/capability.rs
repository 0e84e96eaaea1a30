//! The closed set of capabilities a script may see.
//!
//! Each capability is a bound library handle exposed into the script
//! namespace under a fixed identifier. The registry doubles as the import
//! allow-list: a module may be imported only if its root belongs to one of
//! the registered capabilities. Everything else is absent from the
//! environment, not merely denied.

use std::collections::HashSet;

/// One deliberately exposed library handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Drawing primitives onto the rendering surface (`plt`)
    Charting,
    /// Tabular data manipulation (`pd`)
    Tabular,
    /// Numeric arrays (`np`)
    Numeric,
    /// In-memory buffers (`io`)
    Buffers,
    /// Binary-to-text encoding (`base64`)
    Encoding,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Charting,
        Capability::Tabular,
        Capability::Numeric,
        Capability::Buffers,
        Capability::Encoding,
    ];

    /// Identifier the handle is bound under inside the script namespace.
    pub fn binding(self) -> &'static str {
        match self {
            Capability::Charting => "plt",
            Capability::Tabular => "pd",
            Capability::Numeric => "np",
            Capability::Buffers => "io",
            Capability::Encoding => "base64",
        }
    }

    /// Module path imported to obtain the handle.
    pub fn import_path(self) -> &'static str {
        match self {
            Capability::Charting => "matplotlib.pyplot",
            Capability::Tabular => "pandas",
            Capability::Numeric => "numpy",
            Capability::Buffers => "io",
            Capability::Encoding => "base64",
        }
    }

    /// Top-level module root the capability makes importable.
    pub fn module_root(self) -> &'static str {
        match self {
            Capability::Charting => "matplotlib",
            Capability::Tabular => "pandas",
            Capability::Numeric => "numpy",
            Capability::Buffers => "io",
            Capability::Encoding => "base64",
        }
    }
}

/// The subset of general-purpose builtins exposed to scripts. Anything not
/// listed here does not exist in the script's `__builtins__`. Note the
/// absence of `open`, `eval`, `exec`, `compile`, `getattr` and `__import__`;
/// imports go through a guarded hook instead.
pub const RESTRICTED_BUILTINS: &[&str] = &[
    "print",
    "len",
    "range",
    "enumerate",
    "zip",
    "list",
    "dict",
    "set",
    "tuple",
    "int",
    "float",
    "str",
    "bool",
    "min",
    "max",
    "sum",
    "abs",
    "round",
    "sorted",
    "reversed",
    "isinstance",
];

/// The closed capability allow-list. Built once at process start and
/// immutable afterwards: there is no way to add or remove entries through
/// the public API.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
    allowed_roots: HashSet<&'static str>,
}

impl CapabilityRegistry {
    /// The standard charting registry: plt, pd, np, io, base64.
    pub fn standard() -> Self {
        let capabilities = Capability::ALL.to_vec();
        let allowed_roots = capabilities.iter().map(|c| c.module_root()).collect();
        Self {
            capabilities,
            allowed_roots,
        }
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Whether `module` (possibly dotted, possibly aliased at the use site)
    /// may be imported. Only the root segment matters: allowing `matplotlib`
    /// allows `matplotlib.pyplot` and `matplotlib.figure` alike.
    pub fn allows_module(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.allowed_roots.contains(root)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_are_unique() {
        let mut seen = HashSet::new();
        for cap in Capability::ALL {
            assert!(seen.insert(cap.binding()), "duplicate binding {}", cap.binding());
        }
    }

    #[test]
    fn dotted_submodules_share_the_root_verdict() {
        let registry = CapabilityRegistry::standard();
        assert!(registry.allows_module("matplotlib"));
        assert!(registry.allows_module("matplotlib.pyplot"));
        assert!(registry.allows_module("numpy.linalg"));
        assert!(!registry.allows_module("os"));
        assert!(!registry.allows_module("os.path"));
        assert!(!registry.allows_module("socket"));
    }

    #[test]
    fn the_set_is_closed() {
        let registry = CapabilityRegistry::standard();
        for name in ["subprocess", "shutil", "ctypes", "urllib", "sys", "pathlib"] {
            assert!(!registry.allows_module(name), "{name} must not be importable");
        }
    }

    #[test]
    fn restricted_builtins_omit_escape_hatches() {
        for dangerous in ["open", "eval", "exec", "compile", "__import__", "getattr"] {
            assert!(
                !RESTRICTED_BUILTINS.contains(&dangerous),
                "{dangerous} must not be exposed"
            );
        }
    }
}
