//! Static import check, run before anything executes.
//!
//! The script is parsed into a syntax tree and every import statement, at
//! any nesting depth, is checked against the capability registry. This is an
//! allow-list-on-imports check only: attribute access and call expressions
//! on already-bound handles are not vetted here. The capability-limited
//! namespace and the subprocess resource fences are the layers behind it.

use crate::capability::CapabilityRegistry;
use crate::errors::{Result, SandboxError};
use rustpython_parser::{ast, Parse};

/// Validate that `script` parses and only imports allow-listed modules.
///
/// Safe to call on arbitrary text; nothing is executed.
pub fn validate(script: &str, registry: &CapabilityRegistry) -> Result<()> {
    let program = ast::Suite::parse(script, "<script>")
        .map_err(|err| SandboxError::Syntax(err.to_string()))?;
    check_body(&program, registry)
}

fn check_body(body: &[ast::Stmt], registry: &CapabilityRegistry) -> Result<()> {
    for stmt in body {
        check_stmt(stmt, registry)?;
    }
    Ok(())
}

fn check_stmt(stmt: &ast::Stmt, registry: &CapabilityRegistry) -> Result<()> {
    use ast::Stmt;
    match stmt {
        Stmt::Import(import) => {
            for alias in &import.names {
                if !registry.allows_module(alias.name.as_str()) {
                    return Err(SandboxError::Security(alias.name.to_string()));
                }
            }
        }
        Stmt::ImportFrom(import) => {
            // A relative import has no package to resolve against here.
            let level = import.level.as_ref().map_or(0, |l| l.to_u32());
            let module = import.module.as_ref().map(|m| m.as_str()).unwrap_or("");
            if level > 0 {
                return Err(SandboxError::Security(format!(
                    "{}{}",
                    ".".repeat(level as usize),
                    module
                )));
            }
            if !registry.allows_module(module) {
                return Err(SandboxError::Security(module.to_string()));
            }
        }
        Stmt::FunctionDef(def) => check_body(&def.body, registry)?,
        Stmt::AsyncFunctionDef(def) => check_body(&def.body, registry)?,
        Stmt::ClassDef(def) => check_body(&def.body, registry)?,
        Stmt::For(stmt) => {
            check_body(&stmt.body, registry)?;
            check_body(&stmt.orelse, registry)?;
        }
        Stmt::AsyncFor(stmt) => {
            check_body(&stmt.body, registry)?;
            check_body(&stmt.orelse, registry)?;
        }
        Stmt::While(stmt) => {
            check_body(&stmt.body, registry)?;
            check_body(&stmt.orelse, registry)?;
        }
        Stmt::If(stmt) => {
            check_body(&stmt.body, registry)?;
            check_body(&stmt.orelse, registry)?;
        }
        Stmt::With(stmt) => check_body(&stmt.body, registry)?,
        Stmt::AsyncWith(stmt) => check_body(&stmt.body, registry)?,
        Stmt::Try(stmt) => {
            check_body(&stmt.body, registry)?;
            for handler in &stmt.handlers {
                let ast::ExceptHandler::ExceptHandler(handler) = handler;
                check_body(&handler.body, registry)?;
            }
            check_body(&stmt.orelse, registry)?;
            check_body(&stmt.finalbody, registry)?;
        }
        Stmt::TryStar(stmt) => {
            check_body(&stmt.body, registry)?;
            for handler in &stmt.handlers {
                let ast::ExceptHandler::ExceptHandler(handler) = handler;
                check_body(&handler.body, registry)?;
            }
            check_body(&stmt.orelse, registry)?;
            check_body(&stmt.finalbody, registry)?;
        }
        Stmt::Match(stmt) => {
            for case in &stmt.cases {
                check_body(&case.body, registry)?;
            }
        }
        // Imports are statements; nothing else can introduce one.
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::standard()
    }

    #[test]
    fn allow_listed_imports_pass() {
        let script = "\
import matplotlib.pyplot as plt
import numpy as np
import pandas as pd
import io
import base64
plt.plot(np.arange(3))
";
        assert!(validate(script, &registry()).is_ok());
    }

    #[test]
    fn scripts_without_imports_pass() {
        assert!(validate("plt.bar(['a', 'b'], [1, 2])", &registry()).is_ok());
    }

    #[test]
    fn direct_disallowed_import_is_rejected() {
        let err = validate("import os", &registry()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Security);
        assert!(err.to_string().contains("os"));
    }

    #[test]
    fn from_import_checks_the_module_not_the_names() {
        let err = validate("from subprocess import run", &registry()).unwrap_err();
        assert!(err.to_string().contains("subprocess"));
        // from an allowed module, any name is fine at this layer
        assert!(validate("from io import BytesIO", &registry()).is_ok());
        assert!(validate("from matplotlib import pyplot as plt", &registry()).is_ok());
    }

    #[test]
    fn aliasing_does_not_hide_the_module() {
        let err = validate("import socket as harmless", &registry()).unwrap_err();
        assert!(err.to_string().contains("socket"));
    }

    #[test]
    fn dotted_disallowed_import_is_rejected_by_root() {
        let err = validate("import os.path", &registry()).unwrap_err();
        assert!(err.to_string().contains("os.path"));
    }

    #[test]
    fn nested_imports_are_found() {
        let in_function = "\
def sneak():
    import shutil
    return shutil
";
        assert_eq!(
            validate(in_function, &registry()).unwrap_err().kind(),
            FailureKind::Security
        );

        let in_conditional = "\
if True:
    if True:
        import ctypes
";
        assert_eq!(
            validate(in_conditional, &registry()).unwrap_err().kind(),
            FailureKind::Security
        );

        let in_handler = "\
try:
    pass
except Exception:
    import urllib
";
        assert_eq!(
            validate(in_handler, &registry()).unwrap_err().kind(),
            FailureKind::Security
        );

        let in_loop_else = "\
for i in range(3):
    pass
else:
    import pty
";
        assert_eq!(
            validate(in_loop_else, &registry()).unwrap_err().kind(),
            FailureKind::Security
        );

        let in_class = "\
class Sneaky:
    def method(self):
        import resource
";
        assert_eq!(
            validate(in_class, &registry()).unwrap_err().kind(),
            FailureKind::Security
        );
    }

    #[test]
    fn relative_imports_are_rejected() {
        let err = validate("from . import something", &registry()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Security);
        let err = validate("from ..pkg import thing", &registry()).unwrap_err();
        assert!(err.to_string().contains("..pkg"));
    }

    #[test]
    fn unparseable_text_is_a_syntax_failure() {
        let err = validate("def broken(:\n  pass", &registry()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Syntax);
        // and carries the parser's diagnostic, not a security message
        assert!(!err.to_string().contains("not allowed"));
    }

    #[test]
    fn syntax_and_security_are_distinct_even_when_both_present() {
        // Unparseable text never reaches the import walk.
        let err = validate("import os\ndef broken(:", &registry()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Syntax);
    }

    #[test]
    fn first_violation_is_reported() {
        let err = validate("import socket\nimport os", &registry()).unwrap_err();
        assert!(err.to_string().contains("socket"));
    }
}
