//! Capability environment builder.
//!
//! Builds the trusted bootstrap program that a fresh interpreter process
//! runs for one invocation. The bootstrap binds exactly the registered
//! capability handles, a restricted `__builtins__` dict, a guarded
//! `__import__` hook enforcing the same allow-list the validator checked,
//! and, when supplied, the caller's dataset under the fixed `df` identifier.
//! Process, filesystem and network primitives are never placed in the
//! script's namespace; the script cannot recover them through the builtin
//! surface because they are absent, not hidden.
//!
//! The untrusted script is passed by path, never interpolated into the
//! bootstrap source.

use crate::capability::{Capability, CapabilityRegistry, RESTRICTED_BUILTINS};
use crate::config::RenderPolicy;
use crate::dataset::Table;
use crate::errors::Result;

/// Identifier the dataset is bound under when one is supplied.
pub const DATASET_BINDING: &str = "df";

/// Sentinels delimiting the structured result on the child's stdout.
pub(crate) const PAYLOAD_BEGIN: &str = "PLOTBOX_PAYLOAD_BEGIN";
pub(crate) const PAYLOAD_END: &str = "PLOTBOX_PAYLOAD_END";

/// The per-invocation execution environment: the generated bootstrap source
/// plus the serialized dataset, if any. Ephemeral; owned by one invocation.
#[derive(Debug, Clone)]
pub struct Environment {
    bootstrap: String,
    dataset_json: Option<String>,
}

impl Environment {
    /// Pure function of its inputs; no shared state is created here.
    pub fn build(
        registry: &CapabilityRegistry,
        dataset: Option<&Table>,
        render: &RenderPolicy,
    ) -> Result<Environment> {
        let dataset_json = dataset.map(|table| table.to_json()).transpose()?;
        let bootstrap = render_bootstrap(registry, dataset_json.is_some(), render);
        Ok(Environment {
            bootstrap,
            dataset_json,
        })
    }

    pub fn bootstrap(&self) -> &str {
        &self.bootstrap
    }

    pub fn dataset_json(&self) -> Option<&str> {
        self.dataset_json.as_deref()
    }
}

fn capability_import(cap: Capability) -> String {
    let path = cap.import_path();
    let binding = cap.binding();
    if path == binding {
        format!("import {path}")
    } else {
        format!("import {path} as {binding}")
    }
}

fn python_str_set(items: impl Iterator<Item = &'static str>) -> String {
    let quoted: Vec<String> = items.map(|s| format!("\"{s}\"")).collect();
    if quoted.is_empty() {
        "set()".to_string()
    } else {
        format!("{{{}}}", quoted.join(", "))
    }
}

fn render_bootstrap(registry: &CapabilityRegistry, with_dataset: bool, render: &RenderPolicy) -> String {
    let imports = registry
        .capabilities()
        .iter()
        .map(|&cap| capability_import(cap))
        .collect::<Vec<_>>()
        .join("\n");

    let bindings = registry
        .capabilities()
        .iter()
        .map(|cap| format!("    bound[\"{0}\"] = {0}", cap.binding()))
        .collect::<Vec<_>>()
        .join("\n");

    let allowed_roots = python_str_set(registry.capabilities().iter().map(|c| c.module_root()));
    let exposed_builtins = python_str_set(RESTRICTED_BUILTINS.iter().copied());

    let dataset_block = if with_dataset {
        format!(
            r#"
with open(_sys.argv[2], "r", encoding="utf-8") as _fh:
    _table = _json.load(_fh)
_globals["{DATASET_BINDING}"] = pd.DataFrame(_table["rows"], columns=_table["columns"])
"#
        )
    } else {
        String::new()
    };

    let save_args = if render.tight_bbox {
        format!("format=\"png\", dpi={}, bbox_inches=\"tight\"", render.dpi)
    } else {
        format!("format=\"png\", dpi={}", render.dpi)
    };

    format!(
        r#"# Generated per invocation. This file is trusted; the script at argv[1] is not.
import base64 as _base64
import io as _io
import json as _json
import sys as _sys
import builtins as _builtins

import matplotlib
matplotlib.use("Agg")
{imports}

_ALLOWED_ROOTS = {allowed_roots}
_EXPOSED_BUILTINS = {exposed_builtins}


def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level > 0:
        raise ImportError("relative imports are not available")
    if name.split(".")[0] not in _ALLOWED_ROOTS:
        raise ImportError("import of '" + name + "' is not allowed")
    return _builtins.__import__(name, globals, locals, fromlist, level)


def _build_globals():
    exposed = {{n: getattr(_builtins, n) for n in _EXPOSED_BUILTINS if hasattr(_builtins, n)}}
    exposed["__import__"] = _guarded_import
    bound = {{"__builtins__": exposed}}
{bindings}
    return bound


_globals = _build_globals()
{dataset_block}
with open(_sys.argv[1], "r", encoding="utf-8") as _fh:
    _script = _fh.read()

plt.clf()
_payload = {{"error": None, "image": None, "drew": False, "stdout": None}}
_captured = _io.StringIO()
_real_stdout = _sys.stdout
_sys.stdout = _captured
try:
    try:
        exec(compile(_script, "<script>", "exec"), _globals, {{}})
    except Exception as _exc:
        _payload["error"] = type(_exc).__name__ + ": " + str(_exc)
    else:
        if plt.gcf().get_axes():
            _buffer = _io.BytesIO()
            plt.savefig(_buffer, {save_args})
            _payload["image"] = _base64.b64encode(_buffer.getvalue()).decode("ascii")
            _payload["drew"] = True
finally:
    _sys.stdout = _real_stdout
    plt.close("all")

_payload["stdout"] = _captured.getvalue() or None
print("{PAYLOAD_BEGIN}")
print(_json.dumps(_payload))
print("{PAYLOAD_END}")
if _payload["error"] is not None:
    _sys.exit(1)
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(dataset: Option<&Table>) -> Environment {
        Environment::build(
            &CapabilityRegistry::standard(),
            dataset,
            &RenderPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn headless_backend_is_selected_before_pyplot() {
        let env = build(None);
        let agg = env.bootstrap().find("matplotlib.use(\"Agg\")").unwrap();
        let pyplot = env.bootstrap().find("import matplotlib.pyplot").unwrap();
        assert!(agg < pyplot);
    }

    #[test]
    fn all_capability_handles_are_bound() {
        let env = build(None);
        for binding in ["plt", "pd", "np", "io", "base64"] {
            assert!(
                env.bootstrap().contains(&format!("bound[\"{binding}\"] = {binding}")),
                "missing binding for {binding}"
            );
        }
    }

    #[test]
    fn namespace_never_mentions_host_primitives() {
        let env = build(None);
        // The bootstrap itself uses sys/json under private aliases; the
        // script-visible namespace must not carry os/subprocess/socket.
        for forbidden in ["bound[\"os\"]", "bound[\"sys\"]", "bound[\"subprocess\"]"] {
            assert!(!env.bootstrap().contains(forbidden));
        }
    }

    #[test]
    fn import_hook_enforces_the_same_roots() {
        let env = build(None);
        assert!(env.bootstrap().contains("_guarded_import"));
        assert!(env.bootstrap().contains("\"matplotlib\""));
        assert!(!env.bootstrap().contains("\"subprocess\""));
    }

    #[test]
    fn dataset_binding_is_present_only_when_supplied() {
        let bare = build(None);
        assert!(!bare.bootstrap().contains("_globals[\"df\"]"));
        assert!(bare.dataset_json().is_none());

        let table = Table::new(vec!["x".into()], vec![vec![json!(1)]]).unwrap();
        let with_data = build(Some(&table));
        assert!(with_data.bootstrap().contains("_globals[\"df\"]"));
        assert!(with_data.dataset_json().is_some());
    }

    #[test]
    fn surface_is_cleared_before_and_after() {
        let env = build(None);
        let clear = env.bootstrap().find("plt.clf()").unwrap();
        let exec_site = env.bootstrap().find("exec(compile(").unwrap();
        let close = env.bootstrap().find("plt.close(\"all\")").unwrap();
        assert!(clear < exec_site && exec_site < close);
        // cleanup lives in a finally block so it runs on every exit path
        assert!(env.bootstrap().contains("finally:"));
    }

    #[test]
    fn render_policy_reaches_the_serializer() {
        let mut render = RenderPolicy::default();
        render.dpi = 144;
        render.tight_bbox = false;
        let env = Environment::build(&CapabilityRegistry::standard(), None, &render).unwrap();
        assert!(env.bootstrap().contains("dpi=144"));
        assert!(!env.bootstrap().contains("bbox_inches"));
    }
}
