// src/recipe/template.rs

//! `%(key)s` template substitution
//!
//! Keys are looked up in a flat variable map. The orchestrator fills it with
//! the node's own values (`name`, `version`, `prefix`, `jobs`, variants as
//! `variants.<name>`) and one entry per dependency field (`<dep>.prefix`,
//! `<dep>.version`, and every attribute the dependency's recipe declares).
//! Unknown keys are errors rather than silently left in place.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Variables available to a template
pub type TemplateVars = BTreeMap<String, String>;

/// Render `template`, failing on an unknown or unterminated key
pub fn render(recipe: &str, template: &str, vars: &TemplateVars) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find(")s").ok_or_else(|| {
            Error::malformed(recipe, format!("unterminated template key in '{}'", template))
        })?;
        let key = &after[..end];
        let value = vars.get(key).ok_or_else(|| {
            Error::malformed(recipe, format!("unknown template key '%({})s'", key))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Keys referenced by a template, in order of appearance
pub fn referenced_keys(template: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("%(") {
        let after = &rest[start + 2..];
        match after.find(")s") {
            Some(end) => {
                keys.push(&after[..end]);
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.insert("prefix".to_string(), "/opt/hpctoolkit".to_string());
        vars.insert("binutils.prefix".to_string(), "/opt/binutils".to_string());
        vars.insert("mpi.mpicxx".to_string(), "/opt/openmpi/bin/mpicxx".to_string());
        vars
    }

    #[test]
    fn test_render() {
        assert_eq!(
            render("h", "--with-binutils=%(binutils.prefix)s", &vars()).unwrap(),
            "--with-binutils=/opt/binutils"
        );
        assert_eq!(
            render("h", "MPICXX=%(mpi.mpicxx)s", &vars()).unwrap(),
            "MPICXX=/opt/openmpi/bin/mpicxx"
        );
        assert_eq!(render("h", "--enable-all-static", &vars()).unwrap(), "--enable-all-static");
        assert_eq!(
            render("h", "%(prefix)s/bin:%(prefix)s/lib", &vars()).unwrap(),
            "/opt/hpctoolkit/bin:/opt/hpctoolkit/lib"
        );
    }

    #[test]
    fn test_unknown_key() {
        let err = render("hpctoolkit", "--with-cuda=%(cuda.prefix)s", &vars()).unwrap_err();
        assert!(err.to_string().contains("cuda.prefix"));
    }

    #[test]
    fn test_unterminated() {
        assert!(render("h", "--with=%(prefix", &vars()).is_err());
    }

    #[test]
    fn test_referenced_keys() {
        assert_eq!(
            referenced_keys("--a=%(x.prefix)s --b=%(y.version)s"),
            vec!["x.prefix", "y.version"]
        );
    }
}
