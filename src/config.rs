use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;
use tower_lsp::lsp_types::ClientCapabilities;

/// User-facing knobs, read from `~/.config/cairn/settings` and a `.cairn`
/// file at the workspace root. Every key has a default, so a missing file
/// is never an error. A client that does not advertise hover support has
/// `hover` forced off regardless of configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub hover: bool,
    pub broken_link_diagnostics: bool,
    pub heading_completions: bool,
}

impl Settings {
    pub fn new(root_dir: &Path, capabilities: &ClientCapabilities) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/cairn/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.cairn",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("hover", true)?
            .set_default("broken_link_diagnostics", true)?
            .set_default("heading_completions", true)?
            .set_override_option(
                "hover",
                capabilities.text_document.as_ref().and_then(|it| {
                    match it.hover.is_none() {
                        true => Some(false),
                        false => None,
                    }
                }),
            )?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            hover: true,
            broken_link_diagnostics: true,
            heading_completions: true,
        }
    }
}
