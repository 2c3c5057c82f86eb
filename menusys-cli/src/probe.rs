// `menusys probe`: open the native module and report what the bridge can use.

use std::path::Path;

use anyhow::Context;
use menusys_runtime::ffi::EXPORT_SYMBOLS;
use menusys_runtime::{BridgeConfig, MenuContext, NativeModule};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub library: String,
    pub resolved: Vec<&'static str>,
    pub missing: Vec<&'static str>,
    pub root_available: bool,
    pub interface_version: String,
    pub default_profile: String,
    pub default_profile_found: bool,
}

pub fn run_probe(config: &BridgeConfig, library: &Path) -> anyhow::Result<ProbeReport> {
    let module = NativeModule::open(library)
        .with_context(|| format!("cannot probe {}", library.display()))?;
    let missing = module.exports().missing();
    let resolved = EXPORT_SYMBOLS
        .iter()
        .copied()
        .filter(|s| !missing.contains(s))
        .collect();

    let context = MenuContext::builder().module(module).config(config).build();
    let default_profile = context.default_profile().to_string();
    let default_profile_found = context.profile(&default_profile).is_ok();
    Ok(ProbeReport {
        library: library.display().to_string(),
        resolved,
        missing,
        root_available: context.is_available(),
        interface_version: config.menus.interface_version.clone(),
        default_profile,
        default_profile_found,
    })
}

pub fn render_text(report: &ProbeReport) -> String {
    let mut out = format!("module: {}\n", report.library);
    out.push_str(&format!(
        "exports: {}/{} resolved\n",
        report.resolved.len(),
        report.resolved.len() + report.missing.len()
    ));
    for symbol in &report.missing {
        out.push_str(&format!("  missing: {symbol}\n"));
    }
    out.push_str(&format!(
        "menu system: {}\n",
        if report.root_available { "available" } else { "unavailable" }
    ));
    out.push_str(&format!("interface: {}\n", report.interface_version));
    out.push_str(&format!(
        "profile '{}': {}\n",
        report.default_profile,
        if report.default_profile_found { "found" } else { "not found" }
    ));
    out
}
